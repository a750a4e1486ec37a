use super::*;

#[test]
fn linear_inverse_round_trips_times() {
    let t = LinearTransform::new(0.5, -50.0);
    let inv = t.inverse();
    for v in [0.0, 100.0, 137.5, -12.0] {
        assert!((inv.apply(t.apply(v)) - v).abs() < 1e-9);
    }
}

#[test]
fn map_range_floors_bounds_and_keeps_open_ends() {
    let t = LinearTransform::new(0.5, -50.0);
    assert_eq!(t.map_range(TimeRange::new(90, 210)), TimeRange::new(-5, 55));
    assert_eq!(t.map_range(TimeRange::new(100, 101)), TimeRange::new(0, 0));
    assert_eq!(t.map_range(TimeRange::from_start(100)), TimeRange::from_start(0));
}

#[test]
fn composition_applies_parent_first() {
    let parent = LinearTransform::new(2.0, 10.0);
    let child = LinearTransform::new(0.5, -3.0);
    let both = parent.then(child);
    assert_eq!(both.apply(4.0), child.apply(parent.apply(4.0)));
}

#[test]
fn looping_transform_wraps_and_counts_iterations() {
    let tt = TimeTransform::looping(
        LinearTransform::new(1.0, 10.0),
        TimeWarp {
            origin: 0.0,
            period: 50.0,
        },
    );
    assert_eq!(tt.apply(FrameTime(0.0)), FrameTime(10.0));
    assert_eq!(tt.apply(FrameTime(45.0)), FrameTime(5.0));
    assert_eq!(tt.loop_index(FrameTime(39.0)), 0);
    assert_eq!(tt.loop_index(FrameTime(40.0)), 1);
    assert!(tt.as_linear().is_none());
}

#[test]
fn linear_stages_fold_together() {
    let a = TimeTransform::linear(LinearTransform::new(2.0, 0.0));
    let b = TimeTransform::linear(LinearTransform::new(1.0, 5.0));
    let ab = a.then(&b);
    assert_eq!(ab.as_linear(), Some(LinearTransform::new(2.0, 5.0)));
    assert_eq!(ab.apply(FrameTime(3.0)), FrameTime(11.0));
}
