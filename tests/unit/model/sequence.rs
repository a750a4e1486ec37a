use super::*;
use crate::foundation::time::FrameTime;

fn property(id: u32, range: TimeRange, value: f64) -> Section {
    Section::new(
        SectionId(id),
        range,
        SectionPayload::Property(PropertySection {
            property: "x".to_owned(),
            curve: Curve::constant(value),
            base_time: None,
        }),
    )
}

#[test]
fn curve_interpolates_and_holds_outside_keys() {
    let c = Curve::from_keys(&[(10, 1.0), (0, 0.0)]);
    assert_eq!(c.keys[0].frame, FrameNumber(0));
    assert_eq!(c.evaluate(-5.0), 0.0);
    assert!((c.evaluate(2.5) - 0.25).abs() < 1e-12);
    assert_eq!(c.evaluate(99.0), 1.0);
    assert_eq!(Curve::constant(3.0).evaluate(7.0), 3.0);
}

#[test]
fn validate_rejects_duplicates_and_bad_timescale() {
    let dup = Sequence::new("s", TimeRange::new(0, 10))
        .with_track(Track::new(TrackId(1), None))
        .with_track(Track::new(TrackId(1), None));
    assert!(matches!(dup.validate(), Err(TemporaError::Validation(_))));

    let bad = Sequence::new("s", TimeRange::new(0, 10)).with_sub_section(
        SubSection::new(SubSectionId(1), SequenceKey::new("c"), TimeRange::new(0, 5))
            .with_timescale(0.0),
    );
    assert!(bad.validate().is_err());

    let open = Sequence::new("s", TimeRange::new(0, 10)).with_sub_section(SubSection::new(
        SubSectionId(1),
        SequenceKey::new("c"),
        TimeRange::until(5),
    ));
    assert!(open.validate().is_err());
}

#[test]
fn json_round_trip_preserves_signature() {
    let seq = Sequence::new("s", TimeRange::new(0, 100)).with_track(
        Track::new(TrackId(1), Some(BindingId(7)))
            .with_section(property(1, TimeRange::new(0, 50), 2.0).with_easing(5, 5)),
    );
    let json = seq.to_json().unwrap();
    let back = Sequence::from_json(&json).unwrap();
    assert_eq!(back, seq);
    assert_eq!(back.signature().unwrap(), seq.signature().unwrap());

    let mut edited = seq.clone();
    edited.tracks[0].sections[0].ease_in = 6;
    assert_ne!(edited.signature().unwrap(), seq.signature().unwrap());
}

#[test]
fn payload_json_is_tagged_by_kind() {
    let json = r#"{
        "name": "s",
        "play_range": {"start": 0, "end": 10},
        "tracks": [{"id": 1, "sections": [
            {"id": 1, "range": {"start": 2, "end": 3},
             "payload": {"kind": "event", "keys": [{"frame": 2, "name": "boom"}]}}
        ]}]
    }"#;
    let seq = Sequence::from_json(json).unwrap();
    let (_, section) = seq.section(TrackId(1), SectionId(1)).unwrap();
    assert!(matches!(section.payload, SectionPayload::Event(_)));
    assert_eq!(section.blend, BlendKind::Absolute);
}

#[test]
fn loop_windows_follow_first_loop_offset() {
    let sub = SubSection::new(SubSectionId(1), SequenceKey::new("c"), TimeRange::new(0, 200))
        .looping(10);
    let inner = TimeRange::new(0, 50);
    let len = sub.loop_length(inner).unwrap();
    assert_eq!(len, 50);
    let windows: Vec<_> = (0..4).map(|k| sub.loop_window(len, k)).collect();
    assert_eq!(
        windows,
        vec![
            TimeRange::new(0, 40),
            TimeRange::new(40, 90),
            TimeRange::new(90, 140),
            TimeRange::new(140, 190),
        ]
    );
    // Loop 1 starts back at the inner window start.
    assert_eq!(sub.loop_transform(inner, len, 1).apply(40.0), 0.0);
    assert_eq!(sub.loop_transform(inner, len, 0).apply(0.0), 10.0);
}

#[test]
fn node_transform_warps_loops_and_scales_plain_sections() {
    let inner = TimeRange::new(0, 50);
    let looping = SubSection::new(SubSectionId(1), SequenceKey::new("c"), TimeRange::new(0, 200))
        .looping(10)
        .node_transform(inner);
    assert_eq!(looping.apply(FrameTime(45.0)), FrameTime(5.0));
    assert_eq!(looping.loop_index(FrameTime(45.0)), 1);

    let plain = SubSection::new(SubSectionId(2), SequenceKey::new("c"), TimeRange::new(100, 200))
        .with_timescale(0.5)
        .node_transform(TimeRange::new(0, 100));
    assert_eq!(plain.apply(FrameTime(150.0)), FrameTime(25.0));
}
