use std::io::{Read, Write as _};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use crossbeam_channel::Sender;

use crate::encode::codec::{
    AudioData, AudioEncoder, AudioEncoderConfig, CodecInfo, EncodedUnit, Encoder, EncoderBackend,
    EncoderEvent, EventChannel, VideoEncoder, VideoEncoderConfig, VideoFrame,
};
use crate::encode::{ivf, ogg};
use crate::foundation::core::MICROS_PER_SEC;
use crate::foundation::error::{WaveError, WaveResult};
use crate::foundation::math::flatten_premul_over_bg_to_opaque_rgba8;

const VP9_ENCODER: &str = "libvpx-vp9";
const OPUS_ENCODER: &str = "libopus";
/// Recommended Opus seek pre-roll (80 ms).
const OPUS_SEEK_PRE_ROLL_NS: u64 = 80_000_000;

/// Backend that pipes raw frames and PCM through the system `ffmpeg`, producing VP9 video and
/// Opus audio.
///
/// Encoded packets are read back from ffmpeg's stdout (IVF for video, Ogg for audio) on a
/// reader thread, so events arrive asynchronously.
#[derive(Clone, Debug)]
pub struct FfmpegBackend {
    program: PathBuf,
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
        }
    }
}

impl FfmpegBackend {
    /// Use a specific ffmpeg executable instead of the one on `PATH`.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Fail with a capability error unless ffmpeg runs and lists `encoder`.
    pub fn check_encoder(&self, encoder: &str) -> WaveResult<()> {
        let out = Command::new(&self.program)
            .args(["-hide_banner", "-encoders"])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|e| {
                WaveError::capability(format!(
                    "ffmpeg is required for the ffmpeg backend, but '{}' could not be run: {e}",
                    self.program.display()
                ))
            })?;
        if !out.status.success() {
            return Err(WaveError::capability(format!(
                "'{} -encoders' exited with status {}",
                self.program.display(),
                out.status
            )));
        }
        let listing = String::from_utf8_lossy(&out.stdout);
        let found = listing
            .lines()
            .any(|line| line.split_whitespace().nth(1) == Some(encoder));
        if !found {
            return Err(WaveError::capability(format!(
                "ffmpeg was built without the '{encoder}' encoder"
            )));
        }
        Ok(())
    }
}

impl EncoderBackend for FfmpegBackend {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn video_encoder(&self, cfg: &VideoEncoderConfig) -> WaveResult<Box<dyn VideoEncoder>> {
        Ok(Box::new(FfmpegVideoEncoder::spawn(self, cfg.clone())?))
    }

    fn audio_encoder(&self, cfg: &AudioEncoderConfig) -> WaveResult<Box<dyn AudioEncoder>> {
        Ok(Box::new(FfmpegOpusEncoder::spawn(self, cfg.clone())?))
    }
}

/// Returns true if `ffmpeg -version` runs successfully.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// A running ffmpeg child with its stdin, a stdout parser thread and a stderr drain.
struct FfmpegProcess {
    label: &'static str,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    reader: Option<JoinHandle<()>>,
    stderr_drain: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
}

impl FfmpegProcess {
    fn spawn<F>(
        label: &'static str,
        mut cmd: Command,
        events: Sender<EncoderEvent>,
        parse: F,
    ) -> WaveResult<Self>
    where
        F: FnOnce(ChildStdout, &Sender<EncoderEvent>) -> std::io::Result<()> + Send + 'static,
    {
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        tracing::debug!(encoder = label, command = ?cmd, "spawning ffmpeg");

        let mut child = cmd.spawn().map_err(|e| {
            WaveError::capability(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| WaveError::encode("failed to open ffmpeg stdin (unexpected)"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| WaveError::encode("failed to open ffmpeg stdout (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| WaveError::encode("failed to open ffmpeg stderr (unexpected)"))?;

        let reader = std::thread::spawn(move || {
            if let Err(e) = parse(stdout, &events) {
                let _ = events.send(EncoderEvent::Error(format!(
                    "failed to parse ffmpeg {label} output: {e}"
                )));
            }
        });
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        Ok(Self {
            label,
            child: Some(child),
            stdin: Some(stdin),
            reader: Some(reader),
            stderr_drain: Some(stderr_drain),
        })
    }

    fn write(&mut self, bytes: &[u8]) -> WaveResult<()> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(WaveError::encode(format!(
                "ffmpeg {} encoder is already flushed",
                self.label
            )));
        };
        stdin.write_all(bytes).map_err(|e| {
            WaveError::encode(format!(
                "failed to write {} data to ffmpeg stdin: {e}",
                self.label
            ))
        })
    }

    /// Close stdin and wait for every packet to be parsed and for ffmpeg to exit.
    fn finish(&mut self) -> WaveResult<()> {
        drop(self.stdin.take());
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        let status = child.wait().map_err(|e| {
            WaveError::encode(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;
        if let Some(handle) = self.reader.take() {
            handle
                .join()
                .map_err(|_| WaveError::encode("ffmpeg output reader thread panicked"))?;
        }
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| WaveError::encode("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| WaveError::encode(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(WaveError::encode(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }
        Ok(())
    }

    /// Stop the child without waiting for its output.
    fn kill(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.stderr_drain.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for FfmpegProcess {
    fn drop(&mut self) {
        self.kill();
    }
}

/// VP9 encoder streaming RGBA frames into `ffmpeg -c:v libvpx-vp9 -f ivf`.
pub struct FfmpegVideoEncoder {
    cfg: VideoEncoderConfig,
    events: EventChannel,
    process: FfmpegProcess,
    scratch: Vec<u8>,
}

impl FfmpegVideoEncoder {
    fn spawn(backend: &FfmpegBackend, cfg: VideoEncoderConfig) -> WaveResult<Self> {
        if cfg.width == 0 || cfg.height == 0 || cfg.fps == 0 {
            return Err(WaveError::config(
                "video encoder needs non-zero width, height and fps",
            ));
        }
        if !cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2) {
            return Err(WaveError::config(
                "width/height must be even (required for yuv420p VP9 output)",
            ));
        }
        if cfg.keyframe_interval == 0 {
            return Err(WaveError::config("keyframe interval must be non-zero"));
        }
        backend.check_encoder(VP9_ENCODER)?;

        let k = cfg.keyframe_interval;
        let mut cmd = Command::new(&backend.program);
        cmd.args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
            "-r",
            &cfg.fps.to_string(),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            VP9_ENCODER,
            "-b:v",
            &cfg.bitrate_bps.to_string(),
            "-g",
            &k.to_string(),
            "-force_key_frames",
            &format!("expr:eq(mod(n\\,{k})\\,0)"),
            "-pix_fmt",
            "yuv420p",
            "-deadline",
            "realtime",
            "-cpu-used",
            "8",
            "-f",
            "ivf",
            "pipe:1",
        ]);

        let events = EventChannel::new();
        let fps = cfg.fps;
        let process = FfmpegProcess::spawn("video", cmd, events.sender(), move |out, tx| {
            parse_ivf_stream(out, fps, tx)
        })?;

        Ok(Self {
            scratch: vec![0u8; (cfg.width as usize) * (cfg.height as usize) * 4],
            cfg,
            events,
            process,
        })
    }
}

fn parse_ivf_stream<R: Read>(
    mut out: R,
    fps: u32,
    tx: &Sender<EncoderEvent>,
) -> std::io::Result<()> {
    let header = ivf::read_header(&mut out)?;
    let (num, den) = if header.timebase_den == 0 || header.timebase_num == 0 {
        (1u128, u128::from(fps))
    } else {
        (
            u128::from(header.timebase_num),
            u128::from(header.timebase_den),
        )
    };
    let frame_us = (MICROS_PER_SEC / u64::from(fps)).max(1);
    while let Some(frame) = ivf::read_frame(&mut out)? {
        let timestamp_us = (u128::from(frame.pts) * num * u128::from(MICROS_PER_SEC) / den) as u64;
        let keyframe = ivf::vp9_is_keyframe(&frame.data);
        let unit = EncodedUnit {
            data: frame.data,
            timestamp_us,
            duration_us: Some(frame_us),
            keyframe,
        };
        if tx.send(EncoderEvent::Unit(unit)).is_err() {
            break;
        }
    }
    Ok(())
}

impl Encoder for FfmpegVideoEncoder {
    fn codec(&self) -> CodecInfo {
        CodecInfo::new("V_VP9")
    }

    fn poll_event(&mut self) -> Option<EncoderEvent> {
        self.events.try_next()
    }

    fn flush(&mut self) -> WaveResult<()> {
        self.process.finish()
    }

    fn close(&mut self) -> WaveResult<()> {
        self.process.kill();
        Ok(())
    }
}

impl VideoEncoder for FfmpegVideoEncoder {
    fn encode(&mut self, frame: &VideoFrame<'_>, keyframe: bool) -> WaveResult<()> {
        if frame.width != self.cfg.width || frame.height != self.cfg.height {
            return Err(WaveError::encode(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, self.cfg.width, self.cfg.height
            )));
        }
        if keyframe {
            // Key frames are forced by frame number on the ffmpeg side, matching this request.
            tracing::trace!(timestamp_us = frame.timestamp_us, "keyframe requested");
        }
        flatten_premul_over_bg_to_opaque_rgba8(&mut self.scratch, frame.data, [0, 0, 0, 255])?;
        self.process.write(&self.scratch)
    }
}

/// Opus encoder streaming float PCM into `ffmpeg -c:a libopus -f ogg`.
pub struct FfmpegOpusEncoder {
    cfg: AudioEncoderConfig,
    events: EventChannel,
    process: FfmpegProcess,
    scratch: Vec<u8>,
}

impl FfmpegOpusEncoder {
    fn spawn(backend: &FfmpegBackend, cfg: AudioEncoderConfig) -> WaveResult<Self> {
        if cfg.sample_rate == 0 {
            return Err(WaveError::config("audio sample rate must be non-zero"));
        }
        if !(1..=2).contains(&cfg.channels) {
            return Err(WaveError::capability(format!(
                "the Opus encoder supports mono or stereo, got {} channels",
                cfg.channels
            )));
        }
        backend.check_encoder(OPUS_ENCODER)?;

        let mut cmd = Command::new(&backend.program);
        cmd.args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "f32le",
            "-ar",
            &cfg.sample_rate.to_string(),
            "-ac",
            &cfg.channels.to_string(),
            "-i",
            "pipe:0",
            "-vn",
            "-c:a",
            OPUS_ENCODER,
            "-b:a",
            &cfg.bitrate_bps.to_string(),
            "-frame_duration",
            "20",
            "-ar",
            &ogg::OPUS_CLOCK_HZ.to_string(),
            "-f",
            "ogg",
            "pipe:1",
        ]);

        let events = EventChannel::new();
        let process = FfmpegProcess::spawn("audio", cmd, events.sender(), |out, tx| {
            parse_ogg_opus_stream(out, tx)
        })?;
        Ok(Self {
            cfg,
            events,
            process,
            scratch: Vec::new(),
        })
    }
}

fn parse_ogg_opus_stream<R: Read>(out: R, tx: &Sender<EncoderEvent>) -> std::io::Result<()> {
    let mut packets = ogg::OggPacketReader::new(out);
    let mut position: u64 = 0;
    let mut seen_head = false;
    while let Some(packet) = packets.next_packet()? {
        if !seen_head {
            if ogg::opus_head_pre_skip(&packet).is_none() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "first Ogg packet is not an OpusHead",
                ));
            }
            seen_head = true;
            if tx.send(EncoderEvent::DecoderConfig(packet)).is_err() {
                break;
            }
            continue;
        }
        if ogg::is_opus_tags(&packet) || packet.is_empty() {
            continue;
        }
        let samples = u64::from(ogg::opus_packet_samples(&packet).unwrap_or(960));
        let clock = u64::from(ogg::OPUS_CLOCK_HZ);
        let unit = EncodedUnit {
            data: packet,
            timestamp_us: position * MICROS_PER_SEC / clock,
            duration_us: Some(samples * MICROS_PER_SEC / clock),
            keyframe: true,
        };
        position += samples;
        if tx.send(EncoderEvent::Unit(unit)).is_err() {
            break;
        }
    }
    Ok(())
}

impl Encoder for FfmpegOpusEncoder {
    fn codec(&self) -> CodecInfo {
        CodecInfo {
            seek_pre_roll_ns: Some(OPUS_SEEK_PRE_ROLL_NS),
            ..CodecInfo::new("A_OPUS")
        }
    }

    fn poll_event(&mut self) -> Option<EncoderEvent> {
        self.events.try_next()
    }

    fn flush(&mut self) -> WaveResult<()> {
        self.process.finish()
    }

    fn close(&mut self) -> WaveResult<()> {
        self.process.kill();
        Ok(())
    }
}

impl AudioEncoder for FfmpegOpusEncoder {
    fn encode(&mut self, data: &AudioData<'_>) -> WaveResult<()> {
        if data.channels != self.cfg.channels || data.sample_rate != self.cfg.sample_rate {
            return Err(WaveError::encode(format!(
                "audio format mismatch: got {}ch @ {}Hz, expected {}ch @ {}Hz",
                data.channels, data.sample_rate, self.cfg.channels, self.cfg.sample_rate
            )));
        }
        self.scratch.clear();
        for &sample in data.interleaved {
            self.scratch.extend_from_slice(&sample.to_le_bytes());
        }
        self.process.write(&self.scratch)
    }
}
