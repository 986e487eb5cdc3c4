use std::sync::Arc;

use crate::audio::buffer::AudioBuffer;
use crate::encode::codec::{AudioEncoderConfig, EncoderBackend, EncoderSlot, VideoEncoderConfig};
use crate::encode::{audio, video};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{WaveError, WaveResult};
use crate::job::cancel::CancelToken;
use crate::job::config::{EncodeSettings, RenderConfig};
use crate::job::progress::{JobState, ProgressReporter, StatusObserver};
use crate::mux::matroska::{AudioTrackConfig, Muxer, MuxerConfig, VideoTrackConfig};
use crate::plan::{AudioChunkPlan, FramePlan};
use crate::render::waveform::{FrameRGBA, RenderTarget, render_waveform};

/// Result of a successful job.
#[derive(Clone, Debug)]
pub struct JobOutput {
    /// The finalized container.
    pub bytes: Vec<u8>,
    pub video_track: VideoTrackConfig,
    pub audio_track: AudioTrackConfig,
    /// Video frames submitted.
    pub frames: u64,
    /// Audio chunks submitted.
    pub chunks: usize,
}

/// Turns a loaded [`AudioBuffer`] into a muxed waveform video.
///
/// One controller can run several jobs in sequence; each [`JobController::generate`] call is
/// one job from `Validating` to `Done` or `Failed`.
pub struct JobController {
    backend: Box<dyn EncoderBackend>,
    settings: EncodeSettings,
    audio: Option<Arc<AudioBuffer>>,
    observer: Option<Arc<dyn StatusObserver>>,
    state: JobState,
}

impl JobController {
    pub fn new(backend: Box<dyn EncoderBackend>) -> Self {
        Self {
            backend,
            settings: EncodeSettings::default(),
            audio: None,
            observer: None,
            state: JobState::Idle,
        }
    }

    pub fn with_settings(mut self, settings: EncodeSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &EncodeSettings {
        &self.settings
    }

    pub fn load_audio(&mut self, buffer: impl Into<Arc<AudioBuffer>>) {
        self.audio = Some(buffer.into());
    }

    pub fn audio(&self) -> Option<&Arc<AudioBuffer>> {
        self.audio.as_ref()
    }

    pub fn set_observer(&mut self, observer: impl StatusObserver + 'static) {
        self.observer = Some(Arc::new(observer));
    }

    /// State the last job ended in (`Idle` before the first job).
    pub fn state(&self) -> JobState {
        self.state
    }

    /// Run one job to completion.
    ///
    /// On failure the observer receives a final `Failed` status carrying the error text, all
    /// encoders have been closed, and no output is produced.
    ///
    /// Encoder submissions run inline and may block while a subprocess applies backpressure.
    /// Flush and close go through `block_in_place` on a multi-thread runtime; on a
    /// current-thread runtime they block every other task until the encoder drains.
    #[tracing::instrument(
        name = "generate",
        skip_all,
        fields(backend = self.backend.name(), width = cfg.width, height = cfg.height, fps = cfg.fps)
    )]
    pub async fn generate(
        &mut self,
        cfg: &RenderConfig,
        cancel: &CancelToken,
    ) -> WaveResult<JobOutput> {
        let mut progress = ProgressReporter::new(self.observer.clone());
        let result = self.run(cfg, cancel, &mut progress).await;
        match &result {
            Ok(out) => {
                tracing::info!(
                    bytes = out.bytes.len(),
                    frames = out.frames,
                    chunks = out.chunks,
                    "job finished"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, category = ?e.category(), "job failed");
                progress.failed(e);
            }
        }
        self.state = progress.status().state;
        result
    }

    async fn run(
        &self,
        cfg: &RenderConfig,
        cancel: &CancelToken,
        progress: &mut ProgressReporter,
    ) -> WaveResult<JobOutput> {
        progress.validating();
        let buffer = self
            .audio
            .clone()
            .ok_or_else(|| WaveError::input("no audio loaded"))?;
        cfg.validate()?;
        self.settings.validate()?;

        let frame_plan = FramePlan::new(buffer.len(), buffer.sample_rate(), cfg.fps)?;
        if frame_plan.is_empty() {
            return Err(WaveError::input("empty input"));
        }
        let chunk_plan = AudioChunkPlan::new(buffer.len(), self.settings.audio_chunk_frames)?;
        if self.backend.stores_uncompressed_video() {
            let raw_bytes =
                u128::from(frame_plan.len()) * cfg.canvas().rgba_len() as u128;
            if raw_bytes > u128::from(self.settings.max_raw_video_bytes) {
                return Err(WaveError::config(format!(
                    "{} frames at {}x{} need {raw_bytes} bytes of uncompressed video, over the \
                     {} byte limit of the '{}' backend; use `--backend ffmpeg`, a smaller \
                     canvas or a lower fps",
                    frame_plan.len(),
                    cfg.width,
                    cfg.height,
                    self.settings.max_raw_video_bytes,
                    self.backend.name()
                )));
            }
        }
        let mut target = RenderTarget::new(cfg.canvas())?;
        cancel.check()?;

        let mut video_enc = EncoderSlot::new(
            self.backend.video_encoder(&VideoEncoderConfig {
                width: cfg.width,
                height: cfg.height,
                fps: cfg.fps,
                bitrate_bps: self.settings.video_bitrate_bps,
                keyframe_interval: self.settings.keyframe_interval,
            })?,
            "video",
        );
        let mut audio_enc = EncoderSlot::new(
            self.backend.audio_encoder(&AudioEncoderConfig {
                sample_rate: buffer.sample_rate(),
                channels: buffer.channel_count(),
                bitrate_bps: self.settings.audio_bitrate_bps,
            })?,
            "audio",
        );

        let video_track = VideoTrackConfig {
            codec: video_enc.get_mut()?.codec(),
            width: cfg.width,
            height: cfg.height,
            fps: cfg.fps,
        };
        let audio_track = AudioTrackConfig {
            codec: audio_enc.get_mut()?.codec(),
            channels: buffer.channel_count(),
            sample_rate: buffer.sample_rate(),
        };
        let mut muxer = Muxer::new(MuxerConfig {
            video: video_track,
            audio: audio_track,
        })?;
        progress.setup_done();
        tracing::debug!(
            frames = frame_plan.len(),
            samples_per_frame = frame_plan.samples_per_frame(),
            chunks = chunk_plan.len(),
            "plans ready"
        );

        let frames = video::run(
            video::VideoPass {
                buffer: &buffer,
                plan: &frame_plan,
                style: cfg.style(),
                fps: cfg.fps,
                keyframe_interval: self.settings.keyframe_interval,
                yield_every: self.settings.video_yield_every,
            },
            &mut target,
            &mut video_enc,
            &mut muxer,
            progress,
            cancel,
        )
        .await?;

        let chunks = audio::run(
            &buffer,
            &chunk_plan,
            self.settings.audio_yield_every,
            &mut audio_enc,
            &mut muxer,
            progress,
            cancel,
        )
        .await?;

        cancel.check()?;
        progress.finalizing();
        let bytes = muxer.finalize()?;
        progress.finalized();
        progress.done(bytes.len());

        Ok(JobOutput {
            bytes,
            video_track,
            audio_track,
            frames,
            chunks,
        })
    }

    /// Render a single frame of the plan without encoding anything.
    pub fn preview_frame(&self, cfg: &RenderConfig, frame: FrameIndex) -> WaveResult<FrameRGBA> {
        let buffer = self
            .audio
            .as_ref()
            .ok_or_else(|| WaveError::input("no audio loaded"))?;
        cfg.validate()?;
        let plan = FramePlan::new(buffer.len(), buffer.sample_rate(), cfg.fps)?;
        let range = plan.range(frame).ok_or_else(|| {
            WaveError::input(format!(
                "frame {} is outside the plan ({} frames)",
                frame.0,
                plan.len()
            ))
        })?;
        let mut target = RenderTarget::new(cfg.canvas())?;
        render_waveform(
            buffer.slice(0, range).unwrap_or(&[]),
            &cfg.style(),
            &mut target,
        );
        Ok(target.snapshot())
    }
}
