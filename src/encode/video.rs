use crate::audio::buffer::AudioBuffer;
use crate::encode::codec::{EncoderSlot, VideoEncoder, VideoFrame};
use crate::encode::{Track, as_encode_error, blocking, forward_events};
use crate::foundation::core::{MICROS_PER_SEC, frame_timestamp_us};
use crate::foundation::error::WaveResult;
use crate::job::cancel::{CancelToken, checkpoint};
use crate::job::progress::ProgressReporter;
use crate::mux::matroska::Muxer;
use crate::plan::FramePlan;
use crate::render::waveform::{RenderTarget, WaveStyle, render_waveform};

/// Inputs of the video pass that stay fixed for the whole loop.
pub(crate) struct VideoPass<'a> {
    pub buffer: &'a AudioBuffer,
    pub plan: &'a FramePlan,
    pub style: WaveStyle,
    pub fps: u32,
    pub keyframe_interval: u32,
    pub yield_every: u64,
}

/// Render and encode every planned frame, forwarding units to `muxer`; returns the number of
/// frames submitted. The encoder is flushed and closed on success.
pub(crate) async fn run(
    pass: VideoPass<'_>,
    target: &mut RenderTarget,
    encoder: &mut EncoderSlot<dyn VideoEncoder>,
    muxer: &mut Muxer,
    progress: &mut ProgressReporter,
    cancel: &CancelToken,
) -> WaveResult<u64> {
    let canvas = target.canvas();
    let total = pass.plan.len();
    let duration_us = MICROS_PER_SEC / u64::from(pass.fps);
    let to_encode_error = as_encode_error(Track::Video);

    for (idx, range) in pass.plan.iter() {
        checkpoint(cancel, idx.0, pass.yield_every).await?;

        let samples = pass.buffer.slice(0, range).unwrap_or(&[]);
        let pixels = render_waveform(samples, &pass.style, target);
        let frame = VideoFrame {
            width: canvas.width,
            height: canvas.height,
            data: pixels,
            timestamp_us: frame_timestamp_us(idx, pass.fps),
            duration_us,
        };
        let keyframe = idx.0.is_multiple_of(u64::from(pass.keyframe_interval));
        let enc = encoder.get_mut()?;
        enc.encode(&frame, keyframe).map_err(&to_encode_error)?;
        forward_events(enc, Track::Video, muxer)?;

        progress.video_frame(idx.0 + 1, total);
    }

    let enc = encoder.get_mut()?;
    blocking(|| enc.flush()).map_err(&to_encode_error)?;
    forward_events(enc, Track::Video, muxer)?;
    blocking(|| encoder.close()).map_err(&to_encode_error)?;

    tracing::debug!(frames = total, units = muxer.video_units(), "video pass complete");
    Ok(total)
}
