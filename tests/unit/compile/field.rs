use super::*;

fn seg(track: u32, group: i16, bias: i32, eval: i16) -> FieldSegment {
    FieldSegment {
        sequence: SequenceId::ROOT,
        track: TrackId(track),
        section: SectionId(0),
        entity_index: 0,
        group_priority: group,
        hierarchical_bias: bias,
        eval_priority: eval,
        requires_init: false,
        one_shot: false,
    }
}

#[test]
fn priority_orders_group_desc_bias_asc_eval_desc_then_ids() {
    let mut v = vec![
        seg(1, 0, 0, 0),
        seg(2, 5, 0, 0),
        seg(3, 0, -1, 0),
        seg(4, 0, 0, 9),
        seg(0, 0, 0, 0),
    ];
    v.sort_by(FieldSegment::priority_cmp);
    let order: Vec<u32> = v.iter().map(|s| s.track.0).collect();
    assert_eq!(order, vec![2, 3, 4, 0, 1]);
}

#[test]
fn partition_splits_at_every_boundary_and_records_empty_space() {
    let parts = build_partition(
        TimeRange::new(0, 100),
        &[
            (TimeRange::new(10, 50), seg(1, 0, 0, 0)),
            (TimeRange::new(30, 200), seg(2, 0, 0, 0)),
        ],
        &[(TimeRange::new(40, 60), SequenceId(7))],
    );
    let ranges: Vec<TimeRange> = parts.iter().map(|(r, _)| *r).collect();
    assert_eq!(
        ranges,
        vec![
            TimeRange::new(0, 10),
            TimeRange::new(10, 30),
            TimeRange::new(30, 40),
            TimeRange::new(40, 50),
            TimeRange::new(50, 60),
            TimeRange::new(60, 100),
        ]
    );
    assert!(parts[0].1.is_empty());
    assert_eq!(parts[3].1.segments.len(), 2);
    assert_eq!(parts[3].1.active_sequences.as_slice(), &[SequenceId(7)]);
}

#[test]
fn equal_neighbours_merge() {
    let parts = build_partition(
        TimeRange::new(0, 20),
        &[
            (TimeRange::new(0, 10), seg(1, 0, 0, 0)),
            (TimeRange::new(10, 20), seg(1, 0, 0, 0)),
        ],
        &[],
    );
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].0, TimeRange::new(0, 20));
}

#[test]
fn open_spans_keep_open_bounds() {
    let parts = build_partition(
        TimeRange::ALL,
        &[(TimeRange::new(0, 10), seg(1, 0, 0, 0))],
        &[],
    );
    assert_eq!(parts.first().unwrap().0, TimeRange::until(0));
    assert_eq!(parts.last().unwrap().0, TimeRange::from_start(10));
}

#[test]
fn find_and_insert_respect_existing_ranges() {
    let mut f = EvaluationField::default();
    f.insert(TimeRange::new(10, 20), FieldEntry::default()).unwrap();
    f.insert(TimeRange::new(0, 10), FieldEntry::default()).unwrap();
    assert!(f.insert(TimeRange::new(15, 25), FieldEntry::default()).is_err());
    assert_eq!(f.find(FrameNumber(10)).unwrap().0, TimeRange::new(10, 20));
    assert!(f.find(FrameNumber(20)).is_none());
    assert_eq!(f.gaps(TimeRange::new(-5, 30)), vec![TimeRange::new(-5, 0), TimeRange::new(20, 30)]);
    assert_eq!(f.overlapping(TimeRange::new(5, 12)).count(), 2);
    assert!(f.covers(TimeRange::new(0, 20)));
}
