use std::io::Read;
use std::path::Path;

use crate::audio::buffer::AudioBuffer;
use crate::foundation::error::{WaveError, WaveResult};

/// Decode a WAV file into an [`AudioBuffer`].
pub fn decode_wav(path: &Path) -> WaveResult<AudioBuffer> {
    let reader = hound::WavReader::open(path).map_err(|e| {
        WaveError::input(format!("failed to open wav '{}': {e}", path.display()))
    })?;
    decode_reader(reader)
}

/// Decode WAV bytes from any reader.
pub fn read_wav<R: Read>(r: R) -> WaveResult<AudioBuffer> {
    let reader =
        hound::WavReader::new(r).map_err(|e| WaveError::input(format!("invalid wav: {e}")))?;
    decode_reader(reader)
}

fn decode_reader<R: Read>(reader: hound::WavReader<R>) -> WaveResult<AudioBuffer> {
    let spec = reader.spec();
    tracing::debug!(
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        bits = spec.bits_per_sample,
        format = ?spec.sample_format,
        "decoding wav"
    );

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Float, 32) => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| WaveError::input(format!("failed to read wav samples: {e}")))?,
        (hound::SampleFormat::Int, bits @ (8 | 16 | 24 | 32)) => {
            let scale = 1.0 / (1u64 << (bits - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()
                .map_err(|e| WaveError::input(format!("failed to read wav samples: {e}")))?
        }
        (format, bits) => {
            return Err(WaveError::input(format!(
                "unsupported wav sample format {format:?} at {bits} bits"
            )));
        }
    };

    AudioBuffer::from_interleaved(spec.sample_rate, spec.channels, &interleaved)
}
