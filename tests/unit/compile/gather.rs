use super::*;

#[test]
fn half_speed_section_maps_compile_range_into_local_time() {
    let root = GatherParameters::root(TimeRange::new(90, 210));
    // Section [100, 200) at timescale 0.5 onto local [0, 100).
    let child = root
        .child(
            SequenceId(1),
            LinearTransform::new(0.5, -50.0),
            TimeTransform::identity(),
            TimeRange::new(100, 200),
            TimeRange::new(0, 100),
            2,
        )
        .unwrap();
    assert_eq!(child.root_compile_range, TimeRange::new(100, 200));
    assert_eq!(child.local_compile_range, TimeRange::new(0, 50));
    assert_eq!(child.local_to_root(TimeRange::new(0, 100)), TimeRange::new(100, 200));
    assert_eq!(child.hierarchical_bias, 2);
    assert_eq!(child.depth, 1);
}

#[test]
fn collapsed_compile_range_is_coerced_to_the_clamp_frame() {
    let root = GatherParameters::root(TimeRange::new(100, 101));
    let child = root
        .child(
            SequenceId(1),
            LinearTransform::new(0.5, -50.0),
            TimeTransform::identity(),
            TimeRange::new(100, 101),
            TimeRange::ALL,
            0,
        )
        .unwrap();
    // [100, 101) floors to [0, 0); the touching frame is kept.
    assert_eq!(child.local_compile_range, TimeRange::inclusive(0, 0));
    assert!(!child.local_to_root(child.local_compile_range).is_empty());
}

#[test]
fn sections_outside_the_compile_range_are_skipped() {
    let root = GatherParameters::root(TimeRange::new(0, 50));
    assert!(
        root.child(
            SequenceId(1),
            LinearTransform::IDENTITY,
            TimeTransform::identity(),
            TimeRange::new(60, 80),
            TimeRange::ALL,
            0,
        )
        .is_none()
    );
}
