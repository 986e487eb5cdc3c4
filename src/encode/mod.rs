//! Encoders and the two pipelines that drive them.
//!
//! - [`codec`]: the encoder traits, unit/event types and backend selection
//! - [`raw`]: in-process uncompressed video + float PCM
//! - [`ffmpeg`]: VP9 + Opus through the system `ffmpeg`
//!
//! Encoders report output as [`codec::EncoderEvent`]s. The pipelines poll those after every
//! submission and forward them to the muxer in arrival order.

pub mod codec;
pub mod ffmpeg;
pub(crate) mod ivf;
pub(crate) mod ogg;
pub mod raw;

pub(crate) mod audio;
pub(crate) mod video;

use crate::encode::codec::{Encoder, EncoderEvent};
use crate::foundation::error::{WaveError, WaveResult};
use crate::mux::matroska::Muxer;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Track {
    Video,
    Audio,
}

impl Track {
    fn label(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

/// Forward every event `encoder` has ready to `muxer`; returns the number of units forwarded.
pub(crate) fn forward_events<E: Encoder + ?Sized>(
    encoder: &mut E,
    track: Track,
    muxer: &mut Muxer,
) -> WaveResult<usize> {
    let mut units = 0usize;
    while let Some(event) = encoder.poll_event() {
        match (event, track) {
            (EncoderEvent::Unit(unit), Track::Video) => {
                muxer.add_video_unit(unit)?;
                units += 1;
            }
            (EncoderEvent::Unit(unit), Track::Audio) => {
                muxer.add_audio_unit(unit)?;
                units += 1;
            }
            (EncoderEvent::DecoderConfig(data), Track::Video) => muxer.set_video_codec_private(data),
            (EncoderEvent::DecoderConfig(data), Track::Audio) => muxer.set_audio_codec_private(data),
            (EncoderEvent::Error(msg), _) => {
                return Err(WaveError::encode(format!(
                    "{} encoder failed: {msg}",
                    track.label()
                )));
            }
        }
    }
    Ok(units)
}

/// Run an encoder call that may block on process I/O.
///
/// On a multi-thread runtime the worker hands its other tasks off first, so timers and
/// signal handlers keep running. Elsewhere `f` simply runs on the current thread.
pub(crate) fn blocking<T>(f: impl FnOnce() -> T) -> T {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

/// Any failure reported by an encoder is an encode failure of the job.
pub(crate) fn as_encode_error(track: Track) -> impl Fn(WaveError) -> WaveError {
    move |e| match e {
        WaveError::Encode(_) => e,
        other => WaveError::encode(format!("{} encoder: {other}", track.label())),
    }
}
