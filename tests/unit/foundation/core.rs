use super::*;

#[test]
fn sample_range_rejects_inverted_bounds() {
    assert!(SampleRange::new(4, 2).is_err());
    let r = SampleRange::new(2, 6).unwrap();
    assert_eq!(r.len(), 4);
    assert!(r.contains(2));
    assert!(!r.contains(6));
    assert!(SampleRange::new(3, 3).unwrap().is_empty());
}

#[test]
fn canvas_validation_catches_bad_values() {
    assert!(
        Canvas {
            width: 0,
            height: 10
        }
        .validate()
        .is_err()
    );
    assert!(
        Canvas {
            width: 70_000,
            height: 10
        }
        .validate()
        .is_err()
    );
    assert!(
        Canvas {
            width: 321,
            height: 181
        }
        .validate()
        .is_ok()
    );
}

#[test]
fn timestamps_use_integer_floor() {
    assert_eq!(frame_timestamp_us(FrameIndex(0), 30), 0);
    assert_eq!(frame_timestamp_us(FrameIndex(1), 30), 33_333);
    assert_eq!(frame_timestamp_us(FrameIndex(30), 30), 1_000_000);
    assert_eq!(sample_timestamp_us(960, 48_000), 20_000);
    assert_eq!(sample_timestamp_us(441, 44_100), 10_000);
}
