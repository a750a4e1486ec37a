use super::*;
use crate::foundation::ids::{SectionId, TrackId};
use crate::model::sequence::{BindingId, Curve, EventKey};

fn event_section() -> (Track, Section) {
    let section = Section::new(
        SectionId(1),
        TimeRange::new(0, 100),
        SectionPayload::Event(EventSection {
            keys: vec![
                EventKey {
                    frame: FrameNumber(10),
                    name: "a".into(),
                },
                EventKey {
                    frame: FrameNumber(60),
                    name: "b".into(),
                },
            ],
        }),
    );
    (Track::new(TrackId(1), None), section)
}

#[test]
fn events_provide_one_shot_single_frames_inside_the_effective_range() {
    let (track, section) = event_section();
    let mut out = Vec::new();
    section
        .payload
        .provider()
        .populate_evaluation_field(&track, &section, TimeRange::new(0, 50), &mut out);
    assert_eq!(
        out,
        vec![ProvidedEntity {
            range: TimeRange::frame(FrameNumber(10)),
            entity_index: 0,
            one_shot: true,
            requires_init: false,
        }]
    );

    let mut fences = Vec::new();
    section.payload.provider().determinism_fences(&section, &mut fences);
    assert_eq!(fences, vec![FrameNumber(10), FrameNumber(60)]);
}

#[test]
fn unbound_property_tracks_provide_nothing() {
    let section = Section::new(
        SectionId(1),
        TimeRange::new(0, 10),
        SectionPayload::Property(PropertySection {
            property: "x".into(),
            curve: Curve::constant(1.0),
            base_time: None,
        }),
    );
    let mut out = Vec::new();
    let unbound = Track::new(TrackId(1), None);
    section
        .payload
        .provider()
        .populate_evaluation_field(&unbound, &section, section.range, &mut out);
    assert!(out.is_empty());

    let bound = Track::new(TrackId(1), Some(BindingId(3)));
    section
        .payload
        .provider()
        .populate_evaluation_field(&bound, &section, section.range, &mut out);
    assert_eq!(out.len(), 1);
}

#[test]
fn property_import_preallocates_evaluation_outputs() {
    let section = Section::new(
        SectionId(1),
        TimeRange::new(5, 10),
        SectionPayload::Property(PropertySection {
            property: "x".into(),
            curve: Curve::constant(1.0),
            base_time: None,
        }),
    )
    .with_blend(BlendKind::AdditiveFromBase);
    let track = Track::new(TrackId(1), Some(BindingId(3)));
    let mut bundle = ImportedEntity::new();
    section
        .payload
        .provider()
        .import_entity(
            &ImportParams {
                instance: InstanceHandle(0),
                sequence: SequenceId::ROOT,
                track: &track,
                section: &section,
                entity_index: 0,
                hierarchical_bias: 0,
            },
            &mut bundle,
        )
        .unwrap();
    assert!(bundle.has::<EvaluatedValue>());
    assert!(bundle.has::<BlendInputs>());
    assert!(bundle.has::<BaseValueTime>());
}
