use crate::audio::buffer::{AudioBuffer, interleave_channels};
use crate::encode::codec::{AudioData, AudioEncoder, EncoderSlot};
use crate::encode::{Track, as_encode_error, blocking, forward_events};
use crate::foundation::core::sample_timestamp_us;
use crate::foundation::error::WaveResult;
use crate::job::cancel::{CancelToken, checkpoint};
use crate::job::progress::ProgressReporter;
use crate::mux::matroska::Muxer;
use crate::plan::AudioChunkPlan;

/// Interleave and encode every planned chunk, forwarding units to `muxer`; returns the number
/// of chunks submitted. The encoder is flushed and closed on success.
pub(crate) async fn run(
    buffer: &AudioBuffer,
    plan: &AudioChunkPlan,
    yield_every: usize,
    encoder: &mut EncoderSlot<dyn AudioEncoder>,
    muxer: &mut Muxer,
    progress: &mut ProgressReporter,
    cancel: &CancelToken,
) -> WaveResult<usize> {
    let total = plan.len();
    let to_encode_error = as_encode_error(Track::Audio);

    for (j, range) in plan.iter() {
        checkpoint(cancel, j as u64, yield_every as u64).await?;

        let interleaved = interleave_channels(&buffer.slice_all(range));
        let data = AudioData {
            sample_rate: buffer.sample_rate(),
            channels: buffer.channel_count(),
            interleaved: &interleaved,
            timestamp_us: sample_timestamp_us(range.start, buffer.sample_rate()),
        };
        let enc = encoder.get_mut()?;
        enc.encode(&data).map_err(&to_encode_error)?;
        forward_events(enc, Track::Audio, muxer)?;

        progress.audio_chunk(j as u64 + 1, total as u64);
    }

    let enc = encoder.get_mut()?;
    blocking(|| enc.flush()).map_err(&to_encode_error)?;
    forward_events(enc, Track::Audio, muxer)?;
    blocking(|| encoder.close()).map_err(&to_encode_error)?;

    tracing::debug!(chunks = total, units = muxer.audio_units(), "audio pass complete");
    Ok(total)
}
