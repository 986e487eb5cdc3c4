use super::*;

fn assert_exact_cover(ranges: &[SampleRange], total: usize) {
    let mut cursor = 0usize;
    for r in ranges {
        assert_eq!(r.start, cursor, "gap or overlap at {cursor}");
        assert!(r.end >= r.start);
        cursor = r.end;
    }
    assert_eq!(cursor, total);
}

#[test]
fn one_second_at_30fps_is_30_frames_of_1600() {
    let plan = FramePlan::new(48_000, 48_000, 30).unwrap();
    assert_eq!(plan.len(), 30);
    assert_eq!(plan.samples_per_frame(), 1600);
    for (idx, r) in plan.iter() {
        assert_eq!(r.start, idx.0 as usize * 1600);
        assert_eq!(r.len(), 1600);
    }
}

#[test]
fn frame_plan_covers_channel_for_many_shapes() {
    for rate in [8_000u32, 22_050, 44_100, 48_000] {
        for fps in [1u32, 24, 25, 30, 60, 144] {
            for len in [1usize, 7, 999, 44_100, 48_001, 130_337] {
                let plan = FramePlan::new(len, rate, fps).unwrap();
                let expected = ((len as u128) * u128::from(fps)).div_ceil(u128::from(rate));
                assert_eq!(u128::from(plan.len()), expected, "len={len} rate={rate} fps={fps}");

                let ranges: Vec<_> = plan.iter().map(|(_, r)| r).collect();
                assert_eq!(ranges.len() as u64, plan.len());
                assert_exact_cover(&ranges, len);

                let spf = plan.samples_per_frame();
                for r in &ranges {
                    if spf > 0 {
                        assert_eq!(r.start % spf, 0);
                    }
                }
            }
        }
    }
}

#[test]
fn remainder_is_appended_to_last_frame() {
    // 100 samples at 10 Hz, 3 fps => 30 frames of 3 samples, remainder 10.
    let plan = FramePlan::new(100, 10, 3).unwrap();
    assert_eq!(plan.len(), 30);
    assert_eq!(plan.samples_per_frame(), 3);
    let last = plan.range(FrameIndex(29)).unwrap();
    assert_eq!(last, SampleRange { start: 87, end: 100 });
}

#[test]
fn underflowing_samples_per_frame_puts_everything_in_last_frame() {
    // fps above the sample rate: 5 samples at 10 Hz, 30 fps => 15 frames, 0 samples each.
    let plan = FramePlan::new(5, 10, 30).unwrap();
    assert_eq!(plan.len(), 15);
    assert_eq!(plan.samples_per_frame(), 0);
    assert!(plan.range(FrameIndex(0)).unwrap().is_empty());
    assert_eq!(
        plan.range(FrameIndex(14)).unwrap(),
        SampleRange { start: 0, end: 5 }
    );
}

#[test]
fn zero_length_audio_yields_empty_plan() {
    let plan = FramePlan::new(0, 48_000, 30).unwrap();
    assert!(plan.is_empty());
    assert_eq!(plan.iter().count(), 0);
    assert!(plan.range(FrameIndex(0)).is_none());
}

#[test]
fn frame_plan_rejects_zero_rates() {
    assert!(FramePlan::new(10, 0, 30).is_err());
    assert!(FramePlan::new(10, 48_000, 0).is_err());
}

#[test]
fn chunk_plan_covers_buffer() {
    for chunk in [1usize, 7, 960, 4096] {
        for total in [0usize, 1, 959, 960, 961, 48_000, 100_003] {
            let plan = AudioChunkPlan::new(total, chunk).unwrap();
            assert_eq!(plan.len(), total.div_ceil(chunk));
            let ranges: Vec<_> = plan.iter().map(|(_, r)| r).collect();
            assert_exact_cover(&ranges, total);
            for r in ranges.iter().take(ranges.len().saturating_sub(1)) {
                assert_eq!(r.len(), chunk);
            }
        }
    }
}

#[test]
fn chunk_plan_rejects_zero_chunk() {
    assert!(AudioChunkPlan::new(10, 0).is_err());
}
