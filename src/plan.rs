//! Deterministic partitioning of a sample buffer into video frames and audio chunks.

use crate::foundation::core::{FrameIndex, SampleRange};
use crate::foundation::error::{WaveError, WaveResult};
use crate::foundation::math::ceil_div;

/// Default audio chunk size, one 20 ms Opus frame at 48 kHz.
pub const DEFAULT_AUDIO_CHUNK_FRAMES: usize = 960;

/// One sample range per output video frame.
///
/// Ranges are contiguous and cover `[0, channel_len)` exactly. Every range except the last
/// spans `samples_per_frame` samples; the last one also absorbs the floor-division remainder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FramePlan {
    channel_len: usize,
    total_frames: u64,
    samples_per_frame: usize,
}

impl FramePlan {
    /// Plan `ceil(duration * fps)` frames for a channel of `channel_len` samples.
    ///
    /// Duration is `channel_len / sample_rate`; the frame count is computed in integers so that
    /// e.g. exactly one second at 30 fps yields 30 frames rather than 31.
    pub fn new(channel_len: usize, sample_rate: u32, fps: u32) -> WaveResult<Self> {
        if sample_rate == 0 {
            return Err(WaveError::input("sample rate must be > 0"));
        }
        if fps == 0 {
            return Err(WaveError::config("fps must be > 0"));
        }

        let total_frames = ceil_div(
            (channel_len as u128) * u128::from(fps),
            u128::from(sample_rate),
        ) as u64;
        let samples_per_frame = if total_frames == 0 {
            0
        } else {
            channel_len / (total_frames as usize)
        };

        Ok(Self {
            channel_len,
            total_frames,
            samples_per_frame,
        })
    }

    pub fn len(&self) -> u64 {
        self.total_frames
    }

    pub fn is_empty(&self) -> bool {
        self.total_frames == 0
    }

    pub fn samples_per_frame(&self) -> usize {
        self.samples_per_frame
    }

    /// Sample range of `frame`, or `None` past the end of the plan.
    pub fn range(&self, frame: FrameIndex) -> Option<SampleRange> {
        if frame.0 >= self.total_frames {
            return None;
        }
        let start = (frame.0 as usize) * self.samples_per_frame;
        let end = if frame.0 + 1 == self.total_frames {
            self.channel_len
        } else {
            (start + self.samples_per_frame).min(self.channel_len)
        };
        Some(SampleRange { start, end })
    }

    pub fn iter(&self) -> impl Iterator<Item = (FrameIndex, SampleRange)> + '_ {
        (0..self.total_frames).filter_map(|f| {
            let idx = FrameIndex(f);
            self.range(idx).map(|r| (idx, r))
        })
    }
}

/// Fixed-size chunks over the whole buffer, the last one possibly shorter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioChunkPlan {
    total_samples: usize,
    chunk_size: usize,
}

impl AudioChunkPlan {
    pub fn new(total_samples: usize, chunk_size: usize) -> WaveResult<Self> {
        if chunk_size == 0 {
            return Err(WaveError::config("audio chunk size must be > 0"));
        }
        Ok(Self {
            total_samples,
            chunk_size,
        })
    }

    pub fn len(&self) -> usize {
        self.total_samples.div_ceil(self.chunk_size)
    }

    pub fn is_empty(&self) -> bool {
        self.total_samples == 0
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn range(&self, chunk: usize) -> Option<SampleRange> {
        if chunk >= self.len() {
            return None;
        }
        let start = chunk * self.chunk_size;
        let end = (start + self.chunk_size).min(self.total_samples);
        Some(SampleRange { start, end })
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, SampleRange)> + '_ {
        (0..self.len()).filter_map(|j| self.range(j).map(|r| (j, r)))
    }
}

#[cfg(test)]
#[path = "../tests/unit/plan/schedule.rs"]
mod tests;
