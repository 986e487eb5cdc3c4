#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use wavereel::{
    AudioBuffer, AudioData, AudioEncoder, AudioEncoderConfig, CodecInfo, EncodedUnit, Encoder,
    EncoderBackend, EncoderEvent, JobStatus, StatusObserver, VideoEncoder, VideoEncoderConfig,
    VideoFrame, WaveError, WaveResult,
};

pub fn silence(samples: usize, sample_rate: u32, channels: usize) -> AudioBuffer {
    AudioBuffer::new(sample_rate, vec![vec![0.0; samples]; channels]).unwrap()
}

/// How a recording encoder fails on its configured submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailMode {
    /// `encode` returns an error.
    Returned,
    /// `encode` succeeds but an `EncoderEvent::Error` is queued.
    Event,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stream {
    Video,
    Audio,
}

/// Everything the recording encoders saw.
#[derive(Debug, Default)]
pub struct Log {
    pub video_encoders: usize,
    pub audio_encoders: usize,
    /// `(timestamp_us, keyframe_requested)` per submitted frame.
    pub frames: Vec<(u64, bool)>,
    /// `(timestamp_us, frames, first interleaved samples)` per submitted chunk.
    pub chunks: Vec<(u64, usize, Vec<f32>)>,
    pub flushes: usize,
    pub closes: usize,
    /// Start and end of every video flush.
    pub video_flush_windows: Vec<(Instant, Instant)>,
}

/// Backend whose encoders log every call and fail on demand.
#[derive(Clone, Default)]
pub struct RecordingBackend {
    pub log: Arc<Mutex<Log>>,
    pub fail_video_at: Option<(usize, FailMode)>,
    pub fail_audio_at: Option<(usize, FailMode)>,
    /// `flush` on this stream returns an error.
    pub fail_flush: Option<Stream>,
    /// The video unit for this frame is emitted with timestamp 0.
    pub rewind_video_at: Option<usize>,
    /// Video `flush` blocks the calling thread this long.
    pub video_flush_delay: Option<Duration>,
    /// Report video as uncompressed, like the raw backend.
    pub uncompressed: bool,
    pub refuse_construction: bool,
}

impl RecordingBackend {
    pub fn failing_at(frame: usize, mode: FailMode) -> Self {
        Self {
            fail_video_at: Some((frame, mode)),
            ..Self::default()
        }
    }

    pub fn failing_audio_at(chunk: usize, mode: FailMode) -> Self {
        Self {
            fail_audio_at: Some((chunk, mode)),
            ..Self::default()
        }
    }

    pub fn log(&self) -> std::sync::MutexGuard<'_, Log> {
        self.log.lock().unwrap()
    }
}

impl EncoderBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn stores_uncompressed_video(&self) -> bool {
        self.uncompressed
    }

    fn video_encoder(&self, _cfg: &VideoEncoderConfig) -> WaveResult<Box<dyn VideoEncoder>> {
        if self.refuse_construction {
            return Err(WaveError::capability("recording backend has no video encoder"));
        }
        self.log.lock().unwrap().video_encoders += 1;
        Ok(Box::new(RecordingVideo {
            log: self.log.clone(),
            fail_at: self.fail_video_at,
            fail_flush: self.fail_flush == Some(Stream::Video),
            rewind_at: self.rewind_video_at,
            flush_delay: self.video_flush_delay,
            pending: Vec::new(),
        }))
    }

    fn audio_encoder(&self, _cfg: &AudioEncoderConfig) -> WaveResult<Box<dyn AudioEncoder>> {
        if self.refuse_construction {
            return Err(WaveError::capability("recording backend has no audio encoder"));
        }
        self.log.lock().unwrap().audio_encoders += 1;
        Ok(Box::new(RecordingAudio {
            log: self.log.clone(),
            fail_at: self.fail_audio_at,
            fail_flush: self.fail_flush == Some(Stream::Audio),
            pending: Vec::new(),
        }))
    }
}

fn next_pending(pending: &mut Vec<EncoderEvent>) -> Option<EncoderEvent> {
    if pending.is_empty() {
        None
    } else {
        Some(pending.remove(0))
    }
}

/// Applies `fail_at` to submission `index`; `Ok(true)` means an error event was queued.
fn inject(
    fail_at: Option<(usize, FailMode)>,
    index: usize,
    what: &str,
    pending: &mut Vec<EncoderEvent>,
) -> WaveResult<bool> {
    match fail_at {
        Some((at, FailMode::Returned)) if at == index => Err(WaveError::encode(format!(
            "injected failure on {what} {index}"
        ))),
        Some((at, FailMode::Event)) if at == index => {
            pending.push(EncoderEvent::Error(format!(
                "injected failure on {what} {index}"
            )));
            Ok(true)
        }
        _ => Ok(false),
    }
}

struct RecordingVideo {
    log: Arc<Mutex<Log>>,
    fail_at: Option<(usize, FailMode)>,
    fail_flush: bool,
    rewind_at: Option<usize>,
    flush_delay: Option<Duration>,
    pending: Vec<EncoderEvent>,
}

impl Encoder for RecordingVideo {
    fn codec(&self) -> CodecInfo {
        CodecInfo::new("V_TEST")
    }

    fn poll_event(&mut self) -> Option<EncoderEvent> {
        next_pending(&mut self.pending)
    }

    fn flush(&mut self) -> WaveResult<()> {
        let start = Instant::now();
        if let Some(delay) = self.flush_delay {
            std::thread::sleep(delay);
        }
        let mut log = self.log.lock().unwrap();
        log.flushes += 1;
        log.video_flush_windows.push((start, Instant::now()));
        if self.fail_flush {
            return Err(WaveError::encode("injected video flush failure"));
        }
        Ok(())
    }

    fn close(&mut self) -> WaveResult<()> {
        self.log.lock().unwrap().closes += 1;
        Ok(())
    }
}

impl VideoEncoder for RecordingVideo {
    fn encode(&mut self, frame: &VideoFrame<'_>, keyframe: bool) -> WaveResult<()> {
        let index = {
            let mut log = self.log.lock().unwrap();
            log.frames.push((frame.timestamp_us, keyframe));
            log.frames.len() - 1
        };
        if inject(self.fail_at, index, "frame", &mut self.pending)? {
            return Ok(());
        }
        let timestamp_us = if self.rewind_at == Some(index) {
            0
        } else {
            frame.timestamp_us
        };
        self.pending.push(EncoderEvent::Unit(EncodedUnit {
            data: vec![index as u8],
            timestamp_us,
            duration_us: Some(frame.duration_us),
            keyframe,
        }));
        Ok(())
    }
}

struct RecordingAudio {
    log: Arc<Mutex<Log>>,
    fail_at: Option<(usize, FailMode)>,
    fail_flush: bool,
    pending: Vec<EncoderEvent>,
}

impl Encoder for RecordingAudio {
    fn codec(&self) -> CodecInfo {
        CodecInfo::new("A_TEST")
    }

    fn poll_event(&mut self) -> Option<EncoderEvent> {
        next_pending(&mut self.pending)
    }

    fn flush(&mut self) -> WaveResult<()> {
        self.log.lock().unwrap().flushes += 1;
        if self.fail_flush {
            return Err(WaveError::encode("injected audio flush failure"));
        }
        Ok(())
    }

    fn close(&mut self) -> WaveResult<()> {
        self.log.lock().unwrap().closes += 1;
        Ok(())
    }
}

impl AudioEncoder for RecordingAudio {
    fn encode(&mut self, data: &AudioData<'_>) -> WaveResult<()> {
        let head: Vec<f32> = data.interleaved.iter().take(8).copied().collect();
        let index = {
            let mut log = self.log.lock().unwrap();
            log.chunks.push((data.timestamp_us, data.frames(), head));
            log.chunks.len() - 1
        };
        if inject(self.fail_at, index, "chunk", &mut self.pending)? {
            return Ok(());
        }
        self.pending.push(EncoderEvent::Unit(EncodedUnit {
            data: vec![0],
            timestamp_us: data.timestamp_us,
            duration_us: None,
            keyframe: true,
        }));
        Ok(())
    }
}

/// Observer that keeps every status it is handed.
#[derive(Clone, Default)]
pub struct StatusLog(pub Arc<Mutex<Vec<JobStatus>>>);

impl StatusLog {
    pub fn snapshot(&self) -> Vec<JobStatus> {
        self.0.lock().unwrap().clone()
    }
}

impl StatusObserver for StatusLog {
    fn publish(&self, status: &JobStatus) {
        self.0.lock().unwrap().push(status.clone());
    }
}
