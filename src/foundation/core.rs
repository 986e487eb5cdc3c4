use crate::foundation::error::{WaveError, WaveResult};

/// Microseconds per second, the timestamp unit of every encoded stream.
pub const MICROS_PER_SEC: u64 = 1_000_000;

/// Absolute 0-based video frame index.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

/// Half-open sample range `[start, end)` into a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SampleRange {
    /// Inclusive range start.
    pub start: usize,
    /// Exclusive range end.
    pub end: usize,
}

impl SampleRange {
    /// Create a validated range with `start <= end`.
    pub fn new(start: usize, end: usize) -> WaveResult<Self> {
        if start > end {
            return Err(WaveError::config("SampleRange start must be <= end"));
        }
        Ok(Self { start, end })
    }

    /// Number of samples contained in the range.
    pub fn len(self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Return `true` when the range has no samples.
    pub fn is_empty(self) -> bool {
        self.start == self.end
    }

    /// Return `true` when sample `i` is inside `[start, end)`.
    pub fn contains(self, i: usize) -> bool {
        self.start <= i && i < self.end
    }
}

/// Output canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Canvas {
    /// Validate dimensions against what the raster backend can address.
    pub fn validate(self) -> WaveResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(WaveError::config("canvas width/height must be non-zero"));
        }
        if self.width > u32::from(u16::MAX) || self.height > u32::from(u16::MAX) {
            return Err(WaveError::config(format!(
                "canvas {}x{} exceeds the {}x{} raster limit",
                self.width,
                self.height,
                u16::MAX,
                u16::MAX
            )));
        }
        Ok(())
    }

    /// Byte length of one tightly packed RGBA8 frame.
    pub fn rgba_len(self) -> usize {
        (self.width as usize) * (self.height as usize) * 4
    }
}

/// Presentation timestamp of video frame `frame` at an integer frame rate.
pub fn frame_timestamp_us(frame: FrameIndex, fps: u32) -> u64 {
    frame.0 * MICROS_PER_SEC / u64::from(fps)
}

/// Presentation timestamp of the sample at `sample` for the given sample rate.
pub fn sample_timestamp_us(sample: usize, sample_rate: u32) -> u64 {
    ((sample as u128) * u128::from(MICROS_PER_SEC) / u128::from(sample_rate)) as u64
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
