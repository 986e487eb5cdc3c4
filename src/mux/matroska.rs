use crate::encode::codec::{CodecInfo, EncodedUnit};
use crate::encode::ogg::{OPUS_CLOCK_HZ, opus_head_pre_skip};
use crate::foundation::core::MICROS_PER_SEC;
use crate::foundation::error::{WaveError, WaveResult};
use crate::mux::ebml::{
    put_bytes, put_float, put_master, put_str, put_uint, put_uint_width, write_id, write_size,
};

pub(crate) mod ids {
    pub const EBML: u32 = 0x1A45_DFA3;
    pub const EBML_VERSION: u32 = 0x4286;
    pub const EBML_READ_VERSION: u32 = 0x42F7;
    pub const EBML_MAX_ID_LENGTH: u32 = 0x42F2;
    pub const EBML_MAX_SIZE_LENGTH: u32 = 0x42F3;
    pub const DOC_TYPE: u32 = 0x4282;
    pub const DOC_TYPE_VERSION: u32 = 0x4287;
    pub const DOC_TYPE_READ_VERSION: u32 = 0x4285;

    pub const SEGMENT: u32 = 0x1853_8067;
    pub const SEEK_HEAD: u32 = 0x114D_9B74;
    pub const SEEK: u32 = 0x4DBB;
    pub const SEEK_ID: u32 = 0x53AB;
    pub const SEEK_POSITION: u32 = 0x53AC;

    pub const INFO: u32 = 0x1549_A966;
    pub const TIMESTAMP_SCALE: u32 = 0x2A_D7B1;
    pub const DURATION: u32 = 0x4489;
    pub const MUXING_APP: u32 = 0x4D80;
    pub const WRITING_APP: u32 = 0x5741;

    pub const TRACKS: u32 = 0x1654_AE6B;
    pub const TRACK_ENTRY: u32 = 0xAE;
    pub const TRACK_NUMBER: u32 = 0xD7;
    pub const TRACK_UID: u32 = 0x73C5;
    pub const TRACK_TYPE: u32 = 0x83;
    pub const FLAG_LACING: u32 = 0x9C;
    pub const CODEC_ID: u32 = 0x86;
    pub const CODEC_PRIVATE: u32 = 0x63A2;
    pub const CODEC_DELAY: u32 = 0x56AA;
    pub const SEEK_PRE_ROLL: u32 = 0x56BB;
    pub const DEFAULT_DURATION: u32 = 0x23_E383;

    pub const VIDEO: u32 = 0xE0;
    pub const PIXEL_WIDTH: u32 = 0xB0;
    pub const PIXEL_HEIGHT: u32 = 0xBA;
    pub const UNCOMPRESSED_FOURCC: u32 = 0x2E_B524;

    pub const AUDIO: u32 = 0xE1;
    pub const SAMPLING_FREQUENCY: u32 = 0xB5;
    pub const CHANNELS: u32 = 0x9F;
    pub const BIT_DEPTH: u32 = 0x6264;

    pub const CLUSTER: u32 = 0x1F43_B675;
    pub const TIMESTAMP: u32 = 0xE7;
    pub const SIMPLE_BLOCK: u32 = 0xA3;

    pub const CUES: u32 = 0x1C53_BB6B;
    pub const CUE_POINT: u32 = 0xBB;
    pub const CUE_TIME: u32 = 0xB3;
    pub const CUE_TRACK_POSITIONS: u32 = 0xB7;
    pub const CUE_TRACK: u32 = 0xF7;
    pub const CUE_CLUSTER_POSITION: u32 = 0xF1;
}

pub const VIDEO_TRACK_NUMBER: u64 = 1;
pub const AUDIO_TRACK_NUMBER: u64 = 2;

/// Nanoseconds per timestamp tick (1 ms).
const TIMESTAMP_SCALE_NS: u64 = 1_000_000;
/// Clusters are cut on the next video keyframe once they span this long.
const CLUSTER_TARGET_MS: u64 = 1_000;
const SIMPLE_BLOCK_KEYFRAME: u8 = 0x80;

const WEBM_VIDEO_CODECS: &[&str] = &["V_VP8", "V_VP9", "V_AV1"];
const WEBM_AUDIO_CODECS: &[&str] = &["A_OPUS", "A_VORBIS"];

/// Declared video track.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VideoTrackConfig {
    pub codec: CodecInfo,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

/// Declared audio track.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioTrackConfig {
    pub codec: CodecInfo,
    pub channels: u16,
    pub sample_rate: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MuxerConfig {
    pub video: VideoTrackConfig,
    pub audio: AudioTrackConfig,
}

impl MuxerConfig {
    /// `webm` when both codecs are allowed in WebM, `matroska` otherwise.
    pub fn doc_type(&self) -> &'static str {
        if WEBM_VIDEO_CODECS.contains(&self.video.codec.codec_id)
            && WEBM_AUDIO_CODECS.contains(&self.audio.codec.codec_id)
        {
            "webm"
        } else {
            "matroska"
        }
    }
}

/// In-memory Matroska/WebM writer for one video and one audio track.
///
/// Units may arrive interleaved across streams in any order, but each stream must be
/// non-decreasing in timestamp. Nothing is serialized until [`Muxer::finalize`].
#[derive(Debug)]
pub struct Muxer {
    cfg: MuxerConfig,
    video: Vec<EncodedUnit>,
    audio: Vec<EncodedUnit>,
    video_private: Option<Vec<u8>>,
    audio_private: Option<Vec<u8>>,
}

impl Muxer {
    pub fn new(cfg: MuxerConfig) -> WaveResult<Self> {
        if cfg.video.width == 0 || cfg.video.height == 0 || cfg.video.fps == 0 {
            return Err(WaveError::mux("video track needs non-zero width, height and fps"));
        }
        if cfg.audio.channels == 0 || cfg.audio.sample_rate == 0 {
            return Err(WaveError::mux(
                "audio track needs non-zero channels and sample rate",
            ));
        }
        Ok(Self {
            cfg,
            video: Vec::new(),
            audio: Vec::new(),
            video_private: None,
            audio_private: None,
        })
    }

    pub fn config(&self) -> &MuxerConfig {
        &self.cfg
    }

    pub fn add_video_unit(&mut self, unit: EncodedUnit) -> WaveResult<()> {
        push_monotonic(&mut self.video, unit, "video")
    }

    pub fn add_audio_unit(&mut self, unit: EncodedUnit) -> WaveResult<()> {
        push_monotonic(&mut self.audio, unit, "audio")
    }

    pub fn set_video_codec_private(&mut self, data: Vec<u8>) {
        self.video_private = Some(data);
    }

    pub fn set_audio_codec_private(&mut self, data: Vec<u8>) {
        self.audio_private = Some(data);
    }

    pub fn video_units(&self) -> usize {
        self.video.len()
    }

    pub fn audio_units(&self) -> usize {
        self.audio.len()
    }

    /// Serialize the container. Consumes the muxer.
    pub fn finalize(self) -> WaveResult<Vec<u8>> {
        if self.video.is_empty() {
            return Err(WaveError::mux("cannot finalize a container without video"));
        }

        let info = self.info_element();
        let tracks = self.tracks_element();
        let (clusters, cue_refs) = self.cluster_elements()?;

        // SeekHead positions use fixed-width payloads so its length is known up front.
        let seek_head_len = seek_head(&[(ids::INFO, 0), (ids::TRACKS, 0), (ids::CUES, 0)]).len();
        let info_pos = seek_head_len as u64;
        let tracks_pos = info_pos + info.len() as u64;
        let clusters_pos = tracks_pos + tracks.len() as u64;
        let cues_pos = clusters_pos + clusters.len() as u64;

        let mut cues = Vec::new();
        put_master(&mut cues, ids::CUES, |c| {
            for cue in &cue_refs {
                put_master(c, ids::CUE_POINT, |p| {
                    put_uint(p, ids::CUE_TIME, cue.time_ms);
                    put_master(p, ids::CUE_TRACK_POSITIONS, |t| {
                        put_uint(t, ids::CUE_TRACK, VIDEO_TRACK_NUMBER);
                        put_uint(t, ids::CUE_CLUSTER_POSITION, clusters_pos + cue.offset);
                    });
                });
            }
        });

        let mut out = Vec::new();
        self.ebml_header(&mut out);
        put_master(&mut out, ids::SEGMENT, |s| {
            s.extend_from_slice(&seek_head(&[
                (ids::INFO, info_pos),
                (ids::TRACKS, tracks_pos),
                (ids::CUES, cues_pos),
            ]));
            s.extend_from_slice(&info);
            s.extend_from_slice(&tracks);
            s.extend_from_slice(&clusters);
            s.extend_from_slice(&cues);
        });

        tracing::debug!(
            doc_type = self.cfg.doc_type(),
            video_units = self.video.len(),
            audio_units = self.audio.len(),
            cues = cue_refs.len(),
            bytes = out.len(),
            "container finalized"
        );
        Ok(out)
    }

    fn ebml_header(&self, out: &mut Vec<u8>) {
        put_master(out, ids::EBML, |h| {
            put_uint(h, ids::EBML_VERSION, 1);
            put_uint(h, ids::EBML_READ_VERSION, 1);
            put_uint(h, ids::EBML_MAX_ID_LENGTH, 4);
            put_uint(h, ids::EBML_MAX_SIZE_LENGTH, 8);
            put_str(h, ids::DOC_TYPE, self.cfg.doc_type());
            // CodecDelay, SeekPreRoll and UncompressedFourCC are version 4 elements.
            put_uint(h, ids::DOC_TYPE_VERSION, 4);
            put_uint(h, ids::DOC_TYPE_READ_VERSION, 2);
        });
    }

    fn duration_ms(&self) -> f64 {
        let end_us = self
            .video
            .iter()
            .chain(self.audio.iter())
            .map(|u| u.timestamp_us + u.duration_us.unwrap_or(0))
            .max()
            .unwrap_or(0);
        end_us as f64 / 1_000.0
    }

    fn info_element(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_master(&mut out, ids::INFO, |i| {
            put_uint(i, ids::TIMESTAMP_SCALE, TIMESTAMP_SCALE_NS);
            put_float(i, ids::DURATION, self.duration_ms());
            put_str(i, ids::MUXING_APP, "wavereel");
            put_str(
                i,
                ids::WRITING_APP,
                concat!("wavereel ", env!("CARGO_PKG_VERSION")),
            );
        });
        out
    }

    fn tracks_element(&self) -> Vec<u8> {
        let v = &self.cfg.video;
        let a = &self.cfg.audio;
        let mut out = Vec::new();
        put_master(&mut out, ids::TRACKS, |t| {
            put_master(t, ids::TRACK_ENTRY, |e| {
                put_uint(e, ids::TRACK_NUMBER, VIDEO_TRACK_NUMBER);
                put_uint(e, ids::TRACK_UID, VIDEO_TRACK_NUMBER);
                put_uint(e, ids::TRACK_TYPE, 1);
                put_uint(e, ids::FLAG_LACING, 0);
                put_str(e, ids::CODEC_ID, v.codec.codec_id);
                if let Some(private) = &self.video_private {
                    put_bytes(e, ids::CODEC_PRIVATE, private);
                }
                put_uint(
                    e,
                    ids::DEFAULT_DURATION,
                    MICROS_PER_SEC * 1_000 / u64::from(v.fps),
                );
                put_master(e, ids::VIDEO, |vv| {
                    put_uint(vv, ids::PIXEL_WIDTH, u64::from(v.width));
                    put_uint(vv, ids::PIXEL_HEIGHT, u64::from(v.height));
                    if let Some(fourcc) = v.codec.fourcc {
                        put_bytes(vv, ids::UNCOMPRESSED_FOURCC, &fourcc);
                    }
                });
            });
            put_master(t, ids::TRACK_ENTRY, |e| {
                put_uint(e, ids::TRACK_NUMBER, AUDIO_TRACK_NUMBER);
                put_uint(e, ids::TRACK_UID, AUDIO_TRACK_NUMBER);
                put_uint(e, ids::TRACK_TYPE, 2);
                put_uint(e, ids::FLAG_LACING, 0);
                put_str(e, ids::CODEC_ID, a.codec.codec_id);
                if let Some(private) = &self.audio_private {
                    put_bytes(e, ids::CODEC_PRIVATE, private);
                    if let Some(pre_skip) = opus_head_pre_skip(private) {
                        let delay_ns =
                            u64::from(pre_skip) * MICROS_PER_SEC * 1_000 / u64::from(OPUS_CLOCK_HZ);
                        put_uint(e, ids::CODEC_DELAY, delay_ns);
                    }
                }
                if let Some(pre_roll) = a.codec.seek_pre_roll_ns {
                    put_uint(e, ids::SEEK_PRE_ROLL, pre_roll);
                }
                put_master(e, ids::AUDIO, |aa| {
                    put_float(aa, ids::SAMPLING_FREQUENCY, f64::from(a.sample_rate));
                    put_uint(aa, ids::CHANNELS, u64::from(a.channels));
                    if let Some(depth) = a.codec.bit_depth {
                        put_uint(aa, ids::BIT_DEPTH, u64::from(depth));
                    }
                });
            });
        });
        out
    }

    /// Serialize all clusters; returns the bytes and the cue targets (offsets relative to the
    /// first cluster).
    fn cluster_elements(&self) -> WaveResult<(Vec<u8>, Vec<CueRef>)> {
        let mut out = Vec::new();
        let mut cues = Vec::new();
        let mut current: Option<ClusterBuf> = None;

        for block in interleave(&self.video, &self.audio) {
            let ms = block.unit.timestamp_us / 1_000;
            let starts_cluster = match &current {
                None => true,
                Some(c) => {
                    let span = ms - c.start_ms;
                    let video_key = block.track == VIDEO_TRACK_NUMBER && block.unit.keyframe;
                    (video_key && span >= CLUSTER_TARGET_MS) || span > i16::MAX as u64
                }
            };
            if starts_cluster {
                if let Some(c) = current.take() {
                    c.write_to(&mut out);
                }
                if block.track == VIDEO_TRACK_NUMBER && block.unit.keyframe {
                    cues.push(CueRef {
                        time_ms: ms,
                        offset: out.len() as u64,
                    });
                }
                current = Some(ClusterBuf::new(ms));
            }
            let Some(cluster) = current.as_mut() else {
                return Err(WaveError::mux("no open cluster (unexpected)"));
            };
            let rel = i16::try_from(ms - cluster.start_ms)
                .map_err(|_| WaveError::mux("block timecode out of range (unexpected)"))?;
            cluster.push_block(block.track, rel, block.unit);
        }
        if let Some(c) = current.take() {
            c.write_to(&mut out);
        }
        Ok((out, cues))
    }
}

fn push_monotonic(
    units: &mut Vec<EncodedUnit>,
    unit: EncodedUnit,
    stream: &str,
) -> WaveResult<()> {
    if let Some(last) = units.last()
        && unit.timestamp_us < last.timestamp_us
    {
        return Err(WaveError::mux(format!(
            "{stream} timestamps must be non-decreasing: {} after {}",
            unit.timestamp_us, last.timestamp_us
        )));
    }
    units.push(unit);
    Ok(())
}

fn seek_head(entries: &[(u32, u64)]) -> Vec<u8> {
    let mut out = Vec::new();
    put_master(&mut out, ids::SEEK_HEAD, |h| {
        for &(id, pos) in entries {
            put_master(h, ids::SEEK, |s| {
                let mut id_bytes = Vec::new();
                write_id(&mut id_bytes, id);
                put_bytes(s, ids::SEEK_ID, &id_bytes);
                put_uint_width(s, ids::SEEK_POSITION, pos, 8);
            });
        }
    });
    out
}

struct CueRef {
    time_ms: u64,
    offset: u64,
}

struct Block<'a> {
    track: u64,
    unit: &'a EncodedUnit,
}

/// Merge both streams by timestamp, video first on ties.
fn interleave<'a>(video: &'a [EncodedUnit], audio: &'a [EncodedUnit]) -> Vec<Block<'a>> {
    let mut out = Vec::with_capacity(video.len() + audio.len());
    let (mut vi, mut ai) = (0, 0);
    while vi < video.len() || ai < audio.len() {
        let take_video = match (video.get(vi), audio.get(ai)) {
            (Some(v), Some(a)) => v.timestamp_us <= a.timestamp_us,
            (Some(_), None) => true,
            _ => false,
        };
        if take_video {
            out.push(Block {
                track: VIDEO_TRACK_NUMBER,
                unit: &video[vi],
            });
            vi += 1;
        } else {
            out.push(Block {
                track: AUDIO_TRACK_NUMBER,
                unit: &audio[ai],
            });
            ai += 1;
        }
    }
    out
}

struct ClusterBuf {
    start_ms: u64,
    body: Vec<u8>,
}

impl ClusterBuf {
    fn new(start_ms: u64) -> Self {
        let mut body = Vec::new();
        put_uint(&mut body, ids::TIMESTAMP, start_ms);
        Self { start_ms, body }
    }

    fn push_block(&mut self, track: u64, rel: i16, unit: &EncodedUnit) {
        let mut block = Vec::with_capacity(unit.data.len() + 4);
        write_size(&mut block, track);
        block.extend_from_slice(&rel.to_be_bytes());
        block.push(if unit.keyframe {
            SIMPLE_BLOCK_KEYFRAME
        } else {
            0
        });
        block.extend_from_slice(&unit.data);
        put_bytes(&mut self.body, ids::SIMPLE_BLOCK, &block);
    }

    fn write_to(self, out: &mut Vec<u8>) {
        put_bytes(out, ids::CLUSTER, &self.body);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/mux/matroska.rs"]
mod tests;
