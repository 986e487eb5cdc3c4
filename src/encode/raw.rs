//! In-process encoders that store frames uncompressed and audio as float PCM.

use crate::encode::codec::{
    AudioData, AudioEncoder, AudioEncoderConfig, CodecInfo, EncodedUnit, Encoder, EncoderBackend,
    EncoderEvent, EventChannel, VideoEncoder, VideoEncoderConfig, VideoFrame,
};
use crate::foundation::core::sample_timestamp_us;
use crate::foundation::error::{WaveError, WaveResult};
use crate::foundation::math::flatten_premul_over_bg_to_opaque_rgba8;

/// Backend producing `V_UNCOMPRESSED` (RGBA) video and `A_PCM/FLOAT/IEEE` audio.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawBackend;

impl EncoderBackend for RawBackend {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn stores_uncompressed_video(&self) -> bool {
        true
    }

    fn video_encoder(&self, cfg: &VideoEncoderConfig) -> WaveResult<Box<dyn VideoEncoder>> {
        Ok(Box::new(RawVideoEncoder::new(cfg.clone())?))
    }

    fn audio_encoder(&self, cfg: &AudioEncoderConfig) -> WaveResult<Box<dyn AudioEncoder>> {
        Ok(Box::new(RawAudioEncoder::new(cfg.clone())?))
    }
}

pub struct RawVideoEncoder {
    cfg: VideoEncoderConfig,
    events: EventChannel,
    closed: bool,
}

impl RawVideoEncoder {
    pub fn new(cfg: VideoEncoderConfig) -> WaveResult<Self> {
        if cfg.width == 0 || cfg.height == 0 || cfg.fps == 0 {
            return Err(WaveError::config(
                "raw video encoder needs non-zero width, height and fps",
            ));
        }
        Ok(Self {
            cfg,
            events: EventChannel::new(),
            closed: false,
        })
    }
}

impl Encoder for RawVideoEncoder {
    fn codec(&self) -> CodecInfo {
        CodecInfo {
            fourcc: Some(*b"RGBA"),
            ..CodecInfo::new("V_UNCOMPRESSED")
        }
    }

    fn poll_event(&mut self) -> Option<EncoderEvent> {
        self.events.try_next()
    }

    fn flush(&mut self) -> WaveResult<()> {
        Ok(())
    }

    fn close(&mut self) -> WaveResult<()> {
        self.closed = true;
        Ok(())
    }
}

impl VideoEncoder for RawVideoEncoder {
    fn encode(&mut self, frame: &VideoFrame<'_>, _keyframe: bool) -> WaveResult<()> {
        if self.closed {
            return Err(WaveError::encode("raw video encoder is closed"));
        }
        if frame.width != self.cfg.width || frame.height != self.cfg.height {
            return Err(WaveError::encode(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, self.cfg.width, self.cfg.height
            )));
        }
        let mut data = vec![0u8; frame.data.len()];
        flatten_premul_over_bg_to_opaque_rgba8(&mut data, frame.data, [0, 0, 0, 255])?;
        // Uncompressed frames never reference each other.
        self.events.emit(EncoderEvent::Unit(EncodedUnit {
            data,
            timestamp_us: frame.timestamp_us,
            duration_us: Some(frame.duration_us),
            keyframe: true,
        }));
        Ok(())
    }
}

pub struct RawAudioEncoder {
    cfg: AudioEncoderConfig,
    events: EventChannel,
    closed: bool,
}

impl RawAudioEncoder {
    pub fn new(cfg: AudioEncoderConfig) -> WaveResult<Self> {
        if cfg.sample_rate == 0 || cfg.channels == 0 {
            return Err(WaveError::config(
                "raw audio encoder needs non-zero sample rate and channels",
            ));
        }
        Ok(Self {
            cfg,
            events: EventChannel::new(),
            closed: false,
        })
    }
}

impl Encoder for RawAudioEncoder {
    fn codec(&self) -> CodecInfo {
        CodecInfo {
            bit_depth: Some(32),
            ..CodecInfo::new("A_PCM/FLOAT/IEEE")
        }
    }

    fn poll_event(&mut self) -> Option<EncoderEvent> {
        self.events.try_next()
    }

    fn flush(&mut self) -> WaveResult<()> {
        Ok(())
    }

    fn close(&mut self) -> WaveResult<()> {
        self.closed = true;
        Ok(())
    }
}

impl AudioEncoder for RawAudioEncoder {
    fn encode(&mut self, data: &AudioData<'_>) -> WaveResult<()> {
        if self.closed {
            return Err(WaveError::encode("raw audio encoder is closed"));
        }
        if data.channels != self.cfg.channels || data.sample_rate != self.cfg.sample_rate {
            return Err(WaveError::encode(format!(
                "audio format mismatch: got {}ch @ {}Hz, expected {}ch @ {}Hz",
                data.channels, data.sample_rate, self.cfg.channels, self.cfg.sample_rate
            )));
        }
        let mut bytes = Vec::<u8>::with_capacity(data.interleaved.len() * 4);
        for &sample in data.interleaved {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        let duration_us = if data.frames() == 0 {
            0
        } else {
            sample_timestamp_us(data.frames(), data.sample_rate).max(1)
        };
        self.events.emit(EncoderEvent::Unit(EncodedUnit {
            data: bytes,
            timestamp_us: data.timestamp_us,
            duration_us: Some(duration_us),
            keyframe: true,
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_cfg() -> VideoEncoderConfig {
        VideoEncoderConfig {
            width: 2,
            height: 1,
            fps: 30,
            bitrate_bps: 0,
            keyframe_interval: 150,
        }
    }

    #[test]
    fn video_units_are_flattened_keyframes() {
        let mut enc = RawVideoEncoder::new(video_cfg()).unwrap();
        let px = [10u8, 20, 30, 255, 0, 0, 0, 0];
        enc.encode(
            &VideoFrame {
                width: 2,
                height: 1,
                data: &px,
                timestamp_us: 33_333,
                duration_us: 33_333,
            },
            false,
        )
        .unwrap();
        let Some(EncoderEvent::Unit(unit)) = enc.poll_event() else {
            panic!("expected a unit");
        };
        assert_eq!(unit.data, vec![10, 20, 30, 255, 0, 0, 0, 255]);
        assert_eq!(unit.timestamp_us, 33_333);
        assert!(unit.keyframe);
        assert!(enc.poll_event().is_none());
    }

    #[test]
    fn video_rejects_wrong_size_and_closed_use() {
        let mut enc = RawVideoEncoder::new(video_cfg()).unwrap();
        let px = [0u8; 16];
        let frame = VideoFrame {
            width: 4,
            height: 1,
            data: &px,
            timestamp_us: 0,
            duration_us: 1,
        };
        assert!(matches!(enc.encode(&frame, true), Err(WaveError::Encode(_))));
        enc.close().unwrap();
        let frame = VideoFrame {
            width: 2,
            height: 1,
            data: &px[..8],
            ..frame
        };
        assert!(enc.encode(&frame, true).is_err());
    }

    #[test]
    fn audio_units_carry_le_floats() {
        let mut enc = RawAudioEncoder::new(AudioEncoderConfig {
            sample_rate: 48_000,
            channels: 2,
            bitrate_bps: 0,
        })
        .unwrap();
        let samples = [0.5f32, -0.5];
        enc.encode(&AudioData {
            sample_rate: 48_000,
            channels: 2,
            interleaved: &samples,
            timestamp_us: 20_000,
        })
        .unwrap();
        let Some(EncoderEvent::Unit(unit)) = enc.poll_event() else {
            panic!("expected a unit");
        };
        assert_eq!(&unit.data[0..4], &0.5f32.to_le_bytes());
        assert_eq!(&unit.data[4..8], &(-0.5f32).to_le_bytes());
        assert_eq!(unit.timestamp_us, 20_000);
        assert_eq!(unit.duration_us, Some(20));
        assert_eq!(enc.codec().bit_depth, Some(32));
    }
}
