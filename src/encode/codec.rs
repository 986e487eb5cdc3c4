use crossbeam_channel::{Receiver, Sender};

use crate::foundation::error::{WaveError, WaveResult};

/// One compressed unit produced by an encoder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedUnit {
    /// Codec payload.
    pub data: Vec<u8>,
    /// Presentation timestamp in microseconds, non-decreasing within a stream.
    pub timestamp_us: u64,
    /// Duration in microseconds when the encoder knows it.
    pub duration_us: Option<u64>,
    /// Whether the unit decodes without reference to earlier units.
    pub keyframe: bool,
}

/// Messages an encoder emits, possibly later than the submission that caused them.
#[derive(Clone, Debug, PartialEq)]
pub enum EncoderEvent {
    /// A finished unit.
    Unit(EncodedUnit),
    /// Out-of-band decoder configuration (e.g. an `OpusHead` record).
    DecoderConfig(Vec<u8>),
    /// Asynchronous failure; the encoder is unusable afterward.
    Error(String),
}

/// How the produced stream must be declared in the container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodecInfo {
    /// Matroska codec id, e.g. `V_VP9` or `A_OPUS`.
    pub codec_id: &'static str,
    /// Pixel layout for uncompressed video.
    pub fourcc: Option<[u8; 4]>,
    /// Sample bit depth for PCM audio.
    pub bit_depth: Option<u8>,
    /// Seek pre-roll in nanoseconds.
    pub seek_pre_roll_ns: Option<u64>,
}

impl CodecInfo {
    pub const fn new(codec_id: &'static str) -> Self {
        Self {
            codec_id,
            fourcc: None,
            bit_depth: None,
            seek_pre_roll_ns: None,
        }
    }
}

/// Video encoder settings fixed when a job starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoEncoderConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub bitrate_bps: u32,
    /// Keyframes are requested on frames where `index % keyframe_interval == 0`.
    pub keyframe_interval: u32,
}

/// Audio encoder settings fixed when a job starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioEncoderConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub bitrate_bps: u32,
}

/// One rendered frame submitted for encoding. Borrows the render target's pixels.
#[derive(Clone, Copy, Debug)]
pub struct VideoFrame<'a> {
    pub width: u32,
    pub height: u32,
    /// Premultiplied RGBA8 pixels.
    pub data: &'a [u8],
    pub timestamp_us: u64,
    pub duration_us: u64,
}

/// One chunk of channel-interleaved `f32` PCM submitted for encoding.
#[derive(Clone, Copy, Debug)]
pub struct AudioData<'a> {
    pub sample_rate: u32,
    pub channels: u16,
    /// `frames * channels` samples, sample-major.
    pub interleaved: &'a [f32],
    pub timestamp_us: u64,
}

impl AudioData<'_> {
    /// Samples per channel.
    pub fn frames(&self) -> usize {
        self.interleaved.len() / usize::from(self.channels.max(1))
    }
}

/// Behavior shared by video and audio encoders.
///
/// Output is pulled with [`Encoder::poll_event`]; it may lag behind submissions. After
/// [`Encoder::flush`] returns, every pending event is pollable.
pub trait Encoder: Send {
    fn codec(&self) -> CodecInfo;

    /// Next available event, without blocking.
    fn poll_event(&mut self) -> Option<EncoderEvent>;

    /// Finish all pending work.
    fn flush(&mut self) -> WaveResult<()>;

    /// Release encoder resources.
    fn close(&mut self) -> WaveResult<()>;
}

pub trait VideoEncoder: Encoder {
    fn encode(&mut self, frame: &VideoFrame<'_>, keyframe: bool) -> WaveResult<()>;
}

pub trait AudioEncoder: Encoder {
    fn encode(&mut self, data: &AudioData<'_>) -> WaveResult<()>;
}

/// Creates encoders for a job. Construction failure means the capability is missing.
pub trait EncoderBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether video units are stored as uncompressed RGBA, so output grows with
    /// `frames * width * height * 4`.
    fn stores_uncompressed_video(&self) -> bool {
        false
    }

    fn video_encoder(&self, cfg: &VideoEncoderConfig) -> WaveResult<Box<dyn VideoEncoder>>;

    fn audio_encoder(&self, cfg: &AudioEncoderConfig) -> WaveResult<Box<dyn AudioEncoder>>;
}

/// Built-in backend kinds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process uncompressed video + float PCM. Always available.
    #[default]
    Raw,
    /// VP9 + Opus through the system `ffmpeg`.
    Ffmpeg,
}

/// Create an encoder backend.
///
/// Availability of `ffmpeg` is checked when encoders are constructed, not here.
pub fn create_backend(kind: BackendKind) -> Box<dyn EncoderBackend> {
    match kind {
        BackendKind::Raw => Box::new(crate::encode::raw::RawBackend),
        BackendKind::Ffmpeg => Box::new(crate::encode::ffmpeg::FfmpegBackend::default()),
    }
}

/// Unbounded event channel between an encoder and its pipeline.
pub(crate) struct EventChannel {
    tx: Sender<EncoderEvent>,
    rx: Receiver<EncoderEvent>,
}

impl EventChannel {
    pub(crate) fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    pub(crate) fn sender(&self) -> Sender<EncoderEvent> {
        self.tx.clone()
    }

    pub(crate) fn emit(&self, event: EncoderEvent) {
        // The receiver lives in `self`, so the channel cannot be disconnected here.
        let _ = self.tx.send(event);
    }

    pub(crate) fn try_next(&self) -> Option<EncoderEvent> {
        self.rx.try_recv().ok()
    }
}

/// Owns an encoder for the duration of a pipeline and closes it exactly once.
///
/// Closing happens through [`EncoderSlot::close`] on the success path and in `Drop` on every
/// other path.
pub(crate) struct EncoderSlot<E: Encoder + ?Sized> {
    inner: Box<E>,
    label: &'static str,
    closed: bool,
}

impl<E: Encoder + ?Sized> EncoderSlot<E> {
    pub(crate) fn new(inner: Box<E>, label: &'static str) -> Self {
        Self {
            inner,
            label,
            closed: false,
        }
    }

    pub(crate) fn get_mut(&mut self) -> WaveResult<&mut E> {
        if self.closed {
            return Err(WaveError::encode(format!("{} encoder is closed", self.label)));
        }
        Ok(self.inner.as_mut())
    }

    pub(crate) fn close(&mut self) -> WaveResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        tracing::debug!(encoder = self.label, "closing encoder");
        self.inner.close()
    }
}

impl<E: Encoder + ?Sized> Drop for EncoderSlot<E> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(encoder = self.label, error = %e, "encoder close failed");
        }
    }
}
