//! wavereel turns decoded audio into a waveform video.
//!
//! A job partitions the audio into one sample window per video frame, renders each window on
//! the CPU, drives a video and an audio encoder with exactly timestamped input, and muxes both
//! streams into a single Matroska/WebM file:
//!
//! - Load an [`AudioBuffer`] (directly, or with [`decode_wav`])
//! - Pick an [`EncoderBackend`] with [`create_backend`]
//! - Run [`JobController::generate`] and collect the [`JobOutput`]
#![forbid(unsafe_code)]

mod foundation;

pub mod audio;
pub mod encode;
pub mod job;
pub mod mux;
pub mod plan;
pub mod render;

pub use crate::foundation::core::{
    Canvas, FrameIndex, MICROS_PER_SEC, SampleRange, frame_timestamp_us, sample_timestamp_us,
};
pub use crate::foundation::error::{ErrorCategory, WaveError, WaveResult};

pub use crate::audio::buffer::{AudioBuffer, deinterleave, interleave_channels};
pub use crate::audio::wav::{decode_wav, read_wav};
pub use crate::encode::codec::{
    AudioData, AudioEncoder, AudioEncoderConfig, BackendKind, CodecInfo, EncodedUnit, Encoder,
    EncoderBackend, EncoderEvent, VideoEncoder, VideoEncoderConfig, VideoFrame, create_backend,
};
pub use crate::job::cancel::CancelToken;
pub use crate::job::config::{
    DEFAULT_MAX_RAW_VIDEO_BYTES, EncodeSettings, JobConfig, RenderConfig,
};
pub use crate::job::controller::{JobController, JobOutput};
pub use crate::job::progress::{JobState, JobStatus, ProgressReporter, StatusObserver};
pub use crate::mux::matroska::{AudioTrackConfig, Muxer, MuxerConfig, VideoTrackConfig};
pub use crate::mux::probe::{ProbeReport, ProbedTrack, TrackKind, probe};
pub use crate::plan::{AudioChunkPlan, FramePlan};
pub use crate::render::color::Color;
pub use crate::render::waveform::{FrameRGBA, RenderTarget, WaveStyle, render_waveform};
