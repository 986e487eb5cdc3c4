use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::encode::codec::BackendKind;
use crate::foundation::core::Canvas;
use crate::foundation::error::{WaveError, WaveResult};
use crate::plan::DEFAULT_AUDIO_CHUNK_FRAMES;

/// Default ceiling on the uncompressed video a job may buffer (2 GiB, about 19 s at 720p30).
pub const DEFAULT_MAX_RAW_VIDEO_BYTES: u64 = 2 << 30;
use crate::render::color::Color;
use crate::render::waveform::WaveStyle;

/// What the output video looks like.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    /// Integer frames per second.
    pub fps: u32,
    pub wave_color: Color,
    pub bg_color: Color,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 30,
            wave_color: Color::rgba(0.0, 1.0, 136.0 / 255.0, 1.0),
            bg_color: Color::rgba(26.0 / 255.0, 26.0 / 255.0, 46.0 / 255.0, 1.0),
        }
    }
}

impl RenderConfig {
    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }

    pub fn style(&self) -> WaveStyle {
        WaveStyle::new(self.wave_color, self.bg_color)
    }

    pub fn validate(&self) -> WaveResult<()> {
        self.canvas().validate()?;
        if self.fps == 0 {
            return Err(WaveError::config("fps must be > 0"));
        }
        Ok(())
    }
}

/// Encoder knobs. The defaults are what a job uses unless told otherwise.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodeSettings {
    pub video_bitrate_bps: u32,
    pub audio_bitrate_bps: u32,
    /// Samples per channel in one audio chunk.
    pub audio_chunk_frames: usize,
    /// A keyframe is requested on every frame index divisible by this.
    pub keyframe_interval: u32,
    /// Cooperative yield every N video frames.
    pub video_yield_every: u64,
    /// Cooperative yield every N audio chunks.
    pub audio_yield_every: usize,
    /// Largest `frames * width * height * 4` a backend storing uncompressed video may produce.
    pub max_raw_video_bytes: u64,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            video_bitrate_bps: 5_000_000,
            audio_bitrate_bps: 128_000,
            audio_chunk_frames: DEFAULT_AUDIO_CHUNK_FRAMES,
            keyframe_interval: 150,
            video_yield_every: 10,
            audio_yield_every: 100,
            max_raw_video_bytes: DEFAULT_MAX_RAW_VIDEO_BYTES,
        }
    }
}

impl EncodeSettings {
    pub fn validate(&self) -> WaveResult<()> {
        if self.audio_chunk_frames == 0 {
            return Err(WaveError::config("audio_chunk_frames must be > 0"));
        }
        if self.keyframe_interval == 0 {
            return Err(WaveError::config("keyframe_interval must be > 0"));
        }
        if self.video_yield_every == 0 || self.audio_yield_every == 0 {
            return Err(WaveError::config("yield intervals must be > 0"));
        }
        Ok(())
    }
}

/// Everything a job file may configure.
///
/// ```json
/// {
///   "render": { "width": 320, "height": 180, "fps": 30, "wave_color": "#00ff88" },
///   "encode": { "keyframe_interval": 60 },
///   "backend": "raw"
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobConfig {
    pub render: RenderConfig,
    pub encode: EncodeSettings,
    pub backend: BackendKind,
}

impl JobConfig {
    pub fn from_json_str(s: &str) -> WaveResult<Self> {
        serde_json::from_str(s).map_err(|e| WaveError::config(format!("invalid job config: {e}")))
    }

    pub fn load(path: &Path) -> WaveResult<Self> {
        use anyhow::Context as _;
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read job config '{}'", path.display()))?;
        Self::from_json_str(&s)
    }

    pub fn validate(&self) -> WaveResult<()> {
        self.render.validate()?;
        self.encode.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let e = EncodeSettings::default();
        assert_eq!(e.video_bitrate_bps, 5_000_000);
        assert_eq!(e.audio_bitrate_bps, 128_000);
        assert_eq!(e.audio_chunk_frames, 960);
        assert_eq!(e.keyframe_interval, 150);
        assert_eq!(e.video_yield_every, 10);
        assert_eq!(e.audio_yield_every, 100);
        assert_eq!(e.max_raw_video_bytes, 2_147_483_648);

        let r = RenderConfig::default();
        assert_eq!(r.wave_color.to_hex(), "#00ff88ff");
        assert_eq!(r.bg_color.to_hex(), "#1a1a2eff");
        r.validate().unwrap();
    }

    #[test]
    fn job_file_fills_missing_fields_with_defaults() {
        let cfg = JobConfig::from_json_str(
            r##"{
                "render": { "width": 320, "height": 180, "wave_color": "#ff0000" },
                "encode": { "keyframe_interval": 60 },
                "backend": "ffmpeg"
            }"##,
        )
        .unwrap();
        assert_eq!(cfg.render.width, 320);
        assert_eq!(cfg.render.fps, 30);
        assert_eq!(cfg.render.wave_color.to_rgba8(), [255, 0, 0, 255]);
        assert_eq!(cfg.encode.keyframe_interval, 60);
        assert_eq!(cfg.encode.audio_chunk_frames, 960);
        assert_eq!(cfg.backend, BackendKind::Ffmpeg);
        cfg.validate().unwrap();
    }

    #[test]
    fn unknown_fields_and_bad_values_are_config_errors() {
        let err = JobConfig::from_json_str(r#"{ "render": { "widht": 10 } }"#).unwrap_err();
        assert!(matches!(err, WaveError::Config(_)));

        let bad = RenderConfig {
            fps: 0,
            ..RenderConfig::default()
        };
        assert!(matches!(bad.validate(), Err(WaveError::Config(_))));

        let bad = RenderConfig {
            width: 70_000,
            ..RenderConfig::default()
        };
        assert!(matches!(bad.validate(), Err(WaveError::Config(_))));

        let bad = EncodeSettings {
            audio_chunk_frames: 0,
            ..EncodeSettings::default()
        };
        assert!(matches!(bad.validate(), Err(WaveError::Config(_))));
    }

    #[test]
    fn missing_file_is_reported_with_its_path() {
        let err = JobConfig::load(Path::new("/nonexistent/wavereel-job.json")).unwrap_err();
        assert!(err.to_string().contains("wavereel-job.json"), "{err}");
    }
}
