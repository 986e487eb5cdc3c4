use crate::foundation::core::SampleRange;
use crate::foundation::error::{WaveError, WaveResult};

/// Decoded, immutable multi-channel audio.
///
/// Channels are stored planar (one `Vec<f32>` per channel) and always have equal length.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Build a buffer from planar channel data.
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> WaveResult<Self> {
        if sample_rate == 0 {
            return Err(WaveError::input("audio sample rate must be > 0"));
        }
        let Some(first) = channels.first() else {
            return Err(WaveError::input("audio must have at least one channel"));
        };
        if channels.len() > usize::from(u16::MAX) {
            return Err(WaveError::input(format!(
                "audio has {} channels, at most {} are supported",
                channels.len(),
                u16::MAX
            )));
        }
        let len = first.len();
        if let Some((i, ch)) = channels.iter().enumerate().find(|(_, ch)| ch.len() != len) {
            return Err(WaveError::input(format!(
                "audio channel {i} has {} samples, expected {len}",
                ch.len()
            )));
        }
        Ok(Self {
            sample_rate,
            channels,
        })
    }

    /// Build a buffer from channel-interleaved samples.
    pub fn from_interleaved(
        sample_rate: u32,
        channel_count: u16,
        interleaved: &[f32],
    ) -> WaveResult<Self> {
        if channel_count == 0 {
            return Err(WaveError::input("audio must have at least one channel"));
        }
        if !interleaved.len().is_multiple_of(usize::from(channel_count)) {
            return Err(WaveError::input(format!(
                "interleaved sample count {} is not a multiple of {channel_count} channels",
                interleaved.len()
            )));
        }
        Self::new(sample_rate, deinterleave(interleaved, channel_count))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> u16 {
        self.channels.len() as u16
    }

    /// Samples per channel.
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration_secs(&self) -> f64 {
        (self.len() as f64) / f64::from(self.sample_rate)
    }

    /// Borrow one channel, or `None` when `index` is out of range.
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Slice one channel over `range`, clamped to the channel length.
    pub fn slice(&self, channel: usize, range: SampleRange) -> Option<&[f32]> {
        let ch = self.channel(channel)?;
        let end = range.end.min(ch.len());
        let start = range.start.min(end);
        Some(&ch[start..end])
    }

    /// Slice every channel over `range`.
    pub fn slice_all(&self, range: SampleRange) -> Vec<&[f32]> {
        (0..self.channels.len())
            .filter_map(|c| self.slice(c, range))
            .collect()
    }
}

/// Interleave planar channels sample-major, channel-minor: `out[i * n + c] = channels[c][i]`.
///
/// All channels must have the same length; extra samples in longer channels are ignored.
pub fn interleave_channels(channels: &[&[f32]]) -> Vec<f32> {
    let n = channels.len();
    let frames = channels.iter().map(|c| c.len()).min().unwrap_or(0);
    let mut out = vec![0.0f32; frames * n];
    for (c, ch) in channels.iter().enumerate() {
        for (i, &s) in ch[..frames].iter().enumerate() {
            out[i * n + c] = s;
        }
    }
    out
}

/// Split channel-interleaved samples back into planar channels.
pub fn deinterleave(interleaved: &[f32], channel_count: u16) -> Vec<Vec<f32>> {
    let n = usize::from(channel_count).max(1);
    let frames = interleaved.len() / n;
    let mut out = vec![Vec::with_capacity(frames); n];
    for frame in interleaved.chunks_exact(n) {
        for (c, &s) in frame.iter().enumerate() {
            out[c].push(s);
        }
    }
    out
}
