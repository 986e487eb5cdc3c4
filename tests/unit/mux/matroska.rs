use super::*;
use crate::mux::probe::{TrackKind, probe};

fn unit(timestamp_us: u64, keyframe: bool) -> EncodedUnit {
    EncodedUnit {
        data: vec![0xAB; 16],
        timestamp_us,
        duration_us: None,
        keyframe,
    }
}

fn raw_config(fps: u32) -> MuxerConfig {
    MuxerConfig {
        video: VideoTrackConfig {
            codec: CodecInfo {
                fourcc: Some(*b"RGBA"),
                ..CodecInfo::new("V_UNCOMPRESSED")
            },
            width: 320,
            height: 180,
            fps,
        },
        audio: AudioTrackConfig {
            codec: CodecInfo {
                bit_depth: Some(32),
                ..CodecInfo::new("A_PCM/FLOAT/IEEE")
            },
            channels: 1,
            sample_rate: 48_000,
        },
    }
}

fn webm_config() -> MuxerConfig {
    MuxerConfig {
        video: VideoTrackConfig {
            codec: CodecInfo::new("V_VP9"),
            width: 320,
            height: 180,
            fps: 30,
        },
        audio: AudioTrackConfig {
            codec: CodecInfo {
                seek_pre_roll_ns: Some(80_000_000),
                ..CodecInfo::new("A_OPUS")
            },
            channels: 2,
            sample_rate: 48_000,
        },
    }
}

#[test]
fn doc_type_follows_codecs() {
    assert_eq!(raw_config(30).doc_type(), "matroska");
    assert_eq!(webm_config().doc_type(), "webm");
    let mut mixed = webm_config();
    mixed.audio.codec = CodecInfo::new("A_PCM/FLOAT/IEEE");
    assert_eq!(mixed.doc_type(), "matroska");
}

#[test]
fn finalize_without_video_is_a_mux_error() {
    let mut mux = Muxer::new(raw_config(30)).unwrap();
    mux.add_audio_unit(unit(0, true)).unwrap();
    assert!(matches!(mux.finalize(), Err(WaveError::Mux(_))));
}

#[test]
fn per_stream_timestamps_must_not_decrease() {
    let mut mux = Muxer::new(raw_config(30)).unwrap();
    mux.add_video_unit(unit(66_666, true)).unwrap();
    mux.add_video_unit(unit(66_666, true)).unwrap();
    // Audio is an independent stream and may trail video.
    mux.add_audio_unit(unit(0, true)).unwrap();
    let err = mux.add_video_unit(unit(33_333, true)).unwrap_err();
    assert!(matches!(err, WaveError::Mux(_)));
    assert_eq!(mux.video_units(), 2);
    assert_eq!(mux.audio_units(), 1);
}

#[test]
fn zero_sized_tracks_are_rejected() {
    let mut cfg = raw_config(30);
    cfg.video.fps = 0;
    assert!(Muxer::new(cfg).is_err());
    let mut cfg = raw_config(30);
    cfg.audio.channels = 0;
    assert!(Muxer::new(cfg).is_err());
}

#[test]
fn one_second_job_declares_tracks_and_blocks() {
    let mut mux = Muxer::new(raw_config(30)).unwrap();
    // Cross-stream arrival order is arbitrary.
    for j in 0..50u64 {
        mux.add_audio_unit(unit(j * 20_000, true)).unwrap();
    }
    for i in 0..30u64 {
        mux.add_video_unit(unit(i * 1_000_000 / 30, true)).unwrap();
    }
    let bytes = mux.finalize().unwrap();
    let report = probe(&bytes).unwrap();

    assert_eq!(report.doc_type, "matroska");
    assert_eq!(report.timestamp_scale_ns, 1_000_000);

    let video = report.track(TrackKind::Video).unwrap();
    assert_eq!(video.number, VIDEO_TRACK_NUMBER);
    assert_eq!(video.codec_id, "V_UNCOMPRESSED");
    assert_eq!((video.width, video.height), (Some(320), Some(180)));
    assert_eq!(video.default_duration_ns, Some(33_333_333));
    assert_eq!(video.fps().map(f64::round), Some(30.0));
    assert_eq!(video.blocks, 30);
    assert_eq!(video.keyframes, 30);

    let audio = report.track(TrackKind::Audio).unwrap();
    assert_eq!(audio.codec_id, "A_PCM/FLOAT/IEEE");
    assert_eq!(audio.channels, Some(1));
    assert_eq!(audio.sampling_frequency, Some(48_000.0));
    assert_eq!(audio.bit_depth, Some(32));
    assert_eq!(audio.blocks, 50);

    assert_eq!(report.clusters, vec![0]);
    assert_eq!(report.cues, vec![0]);
}

#[test]
fn clusters_cut_on_keyframes_after_one_second() {
    let mut mux = Muxer::new(raw_config(25)).unwrap();
    for i in 0..75u64 {
        mux.add_video_unit(unit(i * 40_000, i % 25 == 0)).unwrap();
    }
    let report = probe(&mux.finalize().unwrap()).unwrap();
    assert_eq!(report.clusters, vec![0, 1_000, 2_000]);
    assert_eq!(report.cues, vec![0, 1_000, 2_000]);
    let video = report.track(TrackKind::Video).unwrap();
    assert_eq!(video.blocks, 75);
    assert_eq!(video.keyframes, 3);
}

#[test]
fn long_gop_cuts_clusters_before_block_timecode_overflows() {
    let mut mux = Muxer::new(raw_config(1)).unwrap();
    for i in 0..40u64 {
        mux.add_video_unit(unit(i * 1_000_000, i == 0)).unwrap();
    }
    let report = probe(&mux.finalize().unwrap()).unwrap();
    assert_eq!(report.clusters, vec![0, 33_000]);
    // Only clusters opened by a video keyframe are cue targets.
    assert_eq!(report.cues, vec![0]);
}

#[test]
fn opus_head_sets_codec_delay() {
    let mut head = b"OpusHead".to_vec();
    head.extend_from_slice(&[1, 2]);
    head.extend_from_slice(&312u16.to_le_bytes());
    head.extend_from_slice(&48_000u32.to_le_bytes());
    head.extend_from_slice(&[0, 0, 0]);

    let mut mux = Muxer::new(webm_config()).unwrap();
    mux.set_audio_codec_private(head.clone());
    mux.add_video_unit(unit(0, true)).unwrap();
    mux.add_audio_unit(unit(0, true)).unwrap();
    let report = probe(&mux.finalize().unwrap()).unwrap();

    assert_eq!(report.doc_type, "webm");
    let audio = report.track(TrackKind::Audio).unwrap();
    assert_eq!(audio.codec_id, "A_OPUS");
    assert_eq!(audio.codec_private_len, head.len());
    assert_eq!(audio.codec_delay_ns, Some(6_500_000));
    assert_eq!(audio.bit_depth, None);
}

#[test]
fn interleave_puts_video_first_on_ties() {
    let video = vec![unit(0, true), unit(20_000, false)];
    let audio = vec![unit(0, true), unit(10_000, true), unit(20_000, true)];
    let order: Vec<(u64, u64)> = interleave(&video, &audio)
        .iter()
        .map(|b| (b.track, b.unit.timestamp_us))
        .collect();
    assert_eq!(
        order,
        vec![
            (VIDEO_TRACK_NUMBER, 0),
            (AUDIO_TRACK_NUMBER, 0),
            (AUDIO_TRACK_NUMBER, 10_000),
            (VIDEO_TRACK_NUMBER, 20_000),
            (AUDIO_TRACK_NUMBER, 20_000),
        ]
    );
}

#[test]
fn duration_covers_the_last_unit() {
    let mut mux = Muxer::new(raw_config(30)).unwrap();
    mux.add_video_unit(EncodedUnit {
        duration_us: Some(33_333),
        ..unit(966_657, true)
    })
    .unwrap();
    mux.add_audio_unit(EncodedUnit {
        duration_us: Some(20_000),
        ..unit(980_000, true)
    })
    .unwrap();
    let report = probe(&mux.finalize().unwrap()).unwrap();
    assert_eq!(report.duration_ms, Some(1_000.0));
}
