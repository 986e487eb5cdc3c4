//! Read back the structure of a Matroska/WebM byte stream.

use serde::Serialize;

use crate::foundation::error::{WaveError, WaveResult};
use crate::mux::ebml::{children, read_float, read_header, read_uint, read_vint};
use crate::mux::matroska::ids;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
    Other,
}

/// One declared track plus the blocks found for it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProbedTrack {
    pub number: u64,
    pub kind: TrackKind,
    pub codec_id: String,
    pub codec_private_len: usize,
    pub default_duration_ns: Option<u64>,
    pub width: Option<u64>,
    pub height: Option<u64>,
    pub channels: Option<u64>,
    pub sampling_frequency: Option<f64>,
    pub bit_depth: Option<u64>,
    pub codec_delay_ns: Option<u64>,
    pub blocks: usize,
    pub keyframes: usize,
}

impl ProbedTrack {
    fn new(number: u64) -> Self {
        Self {
            number,
            kind: TrackKind::Other,
            codec_id: String::new(),
            codec_private_len: 0,
            default_duration_ns: None,
            width: None,
            height: None,
            channels: None,
            sampling_frequency: None,
            bit_depth: None,
            codec_delay_ns: None,
            blocks: 0,
            keyframes: 0,
        }
    }

    /// Frame rate implied by the default duration.
    pub fn fps(&self) -> Option<f64> {
        self.default_duration_ns
            .filter(|&d| d > 0)
            .map(|d| 1e9 / d as f64)
    }
}

/// Summary of a container.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProbeReport {
    pub doc_type: String,
    pub timestamp_scale_ns: u64,
    pub duration_ms: Option<f64>,
    pub tracks: Vec<ProbedTrack>,
    /// Cluster start timestamps, in timestamp-scale ticks.
    pub clusters: Vec<u64>,
    /// Cue times, in timestamp-scale ticks.
    pub cues: Vec<u64>,
}

impl ProbeReport {
    pub fn track(&self, kind: TrackKind) -> Option<&ProbedTrack> {
        self.tracks.iter().find(|t| t.kind == kind)
    }
}

/// Walk the EBML tree of `bytes`.
pub fn probe(bytes: &[u8]) -> WaveResult<ProbeReport> {
    let header = read_header(bytes).ok_or_else(|| WaveError::input("not an EBML stream"))?;
    if header.id != ids::EBML {
        return Err(WaveError::input("missing EBML header"));
    }

    let mut report = ProbeReport {
        doc_type: String::new(),
        timestamp_scale_ns: 1_000_000,
        duration_ms: None,
        tracks: Vec::new(),
        clusters: Vec::new(),
        cues: Vec::new(),
    };

    let mut found_segment = false;
    for (id, payload) in children(bytes) {
        match id {
            ids::EBML => {
                for (cid, p) in children(payload) {
                    if cid == ids::DOC_TYPE {
                        report.doc_type = String::from_utf8_lossy(p).into_owned();
                    }
                }
            }
            ids::SEGMENT => {
                found_segment = true;
                probe_segment(payload, &mut report);
            }
            _ => {}
        }
    }
    if !found_segment {
        return Err(WaveError::input("container has no Segment"));
    }
    Ok(report)
}

fn probe_segment(segment: &[u8], report: &mut ProbeReport) {
    for (id, payload) in children(segment) {
        match id {
            ids::INFO => {
                for (cid, p) in children(payload) {
                    match cid {
                        ids::TIMESTAMP_SCALE => {
                            report.timestamp_scale_ns = read_uint(p).unwrap_or(1_000_000)
                        }
                        ids::DURATION => report.duration_ms = read_float(p),
                        _ => {}
                    }
                }
            }
            ids::TRACKS => {
                for (cid, entry) in children(payload) {
                    if cid == ids::TRACK_ENTRY {
                        report.tracks.push(probe_track(entry));
                    }
                }
            }
            ids::CLUSTER => probe_cluster(payload, report),
            ids::CUES => {
                for (cid, point) in children(payload) {
                    if cid != ids::CUE_POINT {
                        continue;
                    }
                    for (pid, p) in children(point) {
                        if pid == ids::CUE_TIME
                            && let Some(t) = read_uint(p)
                        {
                            report.cues.push(t);
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

fn probe_track(entry: &[u8]) -> ProbedTrack {
    let mut t = ProbedTrack::new(0);
    for (id, p) in children(entry) {
        match id {
            ids::TRACK_NUMBER => t.number = read_uint(p).unwrap_or(0),
            ids::TRACK_TYPE => {
                t.kind = match read_uint(p) {
                    Some(1) => TrackKind::Video,
                    Some(2) => TrackKind::Audio,
                    _ => TrackKind::Other,
                }
            }
            ids::CODEC_ID => t.codec_id = String::from_utf8_lossy(p).into_owned(),
            ids::CODEC_PRIVATE => t.codec_private_len = p.len(),
            ids::CODEC_DELAY => t.codec_delay_ns = read_uint(p),
            ids::DEFAULT_DURATION => t.default_duration_ns = read_uint(p),
            ids::VIDEO => {
                for (vid, vp) in children(p) {
                    match vid {
                        ids::PIXEL_WIDTH => t.width = read_uint(vp),
                        ids::PIXEL_HEIGHT => t.height = read_uint(vp),
                        _ => {}
                    }
                }
            }
            ids::AUDIO => {
                for (aid, ap) in children(p) {
                    match aid {
                        ids::SAMPLING_FREQUENCY => t.sampling_frequency = read_float(ap),
                        ids::CHANNELS => t.channels = read_uint(ap),
                        ids::BIT_DEPTH => t.bit_depth = read_uint(ap),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
    t
}

fn probe_cluster(cluster: &[u8], report: &mut ProbeReport) {
    for (id, p) in children(cluster) {
        match id {
            ids::TIMESTAMP => {
                if let Some(ts) = read_uint(p) {
                    report.clusters.push(ts);
                }
            }
            ids::SIMPLE_BLOCK => {
                let Some((track, len, _)) = read_vint(p) else {
                    continue;
                };
                let keyframe = p.get(len + 2).is_some_and(|flags| flags & 0x80 != 0);
                if let Some(t) = report.tracks.iter_mut().find(|t| t.number == track) {
                    t.blocks += 1;
                    if keyframe {
                        t.keyframes += 1;
                    }
                }
            }
            _ => {}
        }
    }
}
