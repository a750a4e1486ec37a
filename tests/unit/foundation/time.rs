use super::*;

#[test]
fn inclusive_ranges_are_stored_half_open() {
    assert_eq!(TimeRange::inclusive(3, 5), TimeRange::new(3, 6));
    assert_eq!(TimeRange::frame(FrameNumber(7)).len_frames(), Some(1));
}

#[test]
fn open_bounds_sort_outside_bounded_ones() {
    let all = TimeRange::ALL;
    assert!(all.contains(FrameNumber(i64::MIN)));
    assert!(all.contains(FrameNumber(123)));
    assert!(!all.is_empty());
    assert!(all.contains_range(TimeRange::new(-5, 5)));
    assert_eq!(all.len_frames(), None);
}

#[test]
fn intersect_and_hull() {
    let a = TimeRange::new(0, 10);
    let b = TimeRange::new(5, 20);
    assert_eq!(a.intersect(b), TimeRange::new(5, 10));
    assert_eq!(a.hull(b), TimeRange::new(0, 20));
    assert!(a.intersect(TimeRange::new(10, 12)).is_empty());
    assert_eq!(TimeRange::from_start(4).intersect(a), TimeRange::new(4, 10));
    assert_eq!(TimeRange::until(4).hull(a), TimeRange::until(10));
}

#[test]
fn coerce_inclusive_only_touches_collapsed_ranges() {
    assert_eq!(TimeRange::new(4, 4).coerce_inclusive(), TimeRange::inclusive(4, 4));
    assert_eq!(TimeRange::new(2, 9).coerce_inclusive(), TimeRange::new(2, 9));
    assert_eq!(TimeRange::ALL.coerce_inclusive(), TimeRange::ALL);
}

#[test]
fn difference_reports_gaps_in_order() {
    let gaps = TimeRange::new(0, 100).difference(&[TimeRange::new(10, 20), TimeRange::new(50, 120)]);
    assert_eq!(gaps, vec![TimeRange::new(0, 10), TimeRange::new(20, 50)]);

    let none = TimeRange::new(0, 10).difference(&[TimeRange::ALL]);
    assert!(none.is_empty());

    let open = TimeRange::ALL.difference(&[TimeRange::new(0, 5)]);
    assert_eq!(open, vec![TimeRange::until(0), TimeRange::from_start(5)]);
}

#[test]
fn frame_time_floors_negative_subframes() {
    assert_eq!(FrameTime(-0.5).frame(), FrameNumber(-1));
    assert_eq!(FrameTime(2.999).frame(), FrameNumber(2));
    assert!(TimeRange::new(2, 3).contains_time(FrameTime(2.5)));
}
