use super::*;
use crate::compile::compiler::CompilerOpts;
use crate::ecs::linker::Linker;
use crate::foundation::ids::{SectionId, SubSectionId, TrackId};
use crate::foundation::time::{FrameTime, TimeRange};
use crate::model::library::SequenceLibrary;
use crate::model::sequence::{
    BindingId, Curve, PropertySection, Section, SectionPayload, Sequence, SequenceKey, SubSection,
    Track,
};
use std::sync::Arc;

fn property(id: u32, range: TimeRange) -> Track {
    Track::new(TrackId(id), Some(BindingId(id))).with_section(Section::new(
        SectionId(1),
        range,
        SectionPayload::Property(PropertySection {
            property: "x".into(),
            curve: Curve::constant(1.0),
            base_time: None,
        }),
    ))
}

fn linker(library: SequenceLibrary) -> Linker {
    crate::Runtime::init()
        .unwrap()
        .create_linker(Arc::new(library), CompilerOpts::default())
        .unwrap()
}

fn flat_library() -> SequenceLibrary {
    let lib = SequenceLibrary::new();
    lib.insert(
        SequenceKey::new("root"),
        Sequence::new("root", TimeRange::new(0, 100)).with_track(property(1, TimeRange::new(0, 50))),
    )
    .unwrap();
    lib
}

fn nested_library() -> SequenceLibrary {
    let lib = SequenceLibrary::new();
    lib.insert(
        SequenceKey::new("child"),
        Sequence::new("child", TimeRange::new(0, 100)).with_track(property(7, TimeRange::new(0, 100))),
    )
    .unwrap();
    lib.insert(
        SequenceKey::new("root"),
        Sequence::new("root", TimeRange::new(0, 100)).with_sub_section(SubSection::new(
            SubSectionId(1),
            SequenceKey::new("child"),
            TimeRange::new(10, 20),
        )),
    )
    .unwrap();
    lib
}

fn update(l: &mut Linker, root: InstanceHandle, t: f64) -> UpdateOutcome {
    let ctx = EvaluationContext::at(FrameTime(t));
    update_root(root, &ctx, &mut l.update_env()).unwrap()
}

#[test]
fn root_starts_finished_and_caches_its_field_range() {
    let mut l = linker(flat_library());
    let root = l.play(&SequenceKey::new("root")).unwrap();
    assert!(l.instances.get(root).unwrap().is_finished());

    let first = update(&mut l, root, 10.0);
    assert!(!first.cache_hit);
    assert_eq!(first.linked, 1);
    assert!(!l.instances.get(root).unwrap().is_finished());

    let second = update(&mut l, root, 20.0);
    assert!(second.cache_hit);
    assert_eq!(second.linked, 0);

    let third = update(&mut l, root, 60.0);
    assert!(!third.cache_hit);
    assert_eq!(third.unlinked, 1);
    assert!(l.instances.get(root).unwrap().ledger().is_empty());
}

#[test]
fn finish_then_update_matches_a_fresh_instance() {
    let mut l = linker(flat_library());
    let a = l.play(&SequenceKey::new("root")).unwrap();
    update(&mut l, a, 70.0);
    l.instances.finish_root(a, &mut l.store).unwrap();
    assert!(l.instances.get(a).unwrap().is_finished());
    let restarted = update(&mut l, a, 30.0);
    assert!(!restarted.cache_hit);

    let b = l.play(&SequenceKey::new("root")).unwrap();
    update(&mut l, b, 30.0);
    let keys = |h: InstanceHandle| {
        l.instances
            .get(h)
            .unwrap()
            .ledger()
            .keys()
            .copied()
            .collect::<Vec<_>>()
    };
    assert_eq!(keys(a), keys(b));
    assert_eq!(keys(a).len(), 1);
}

#[test]
fn sub_instances_are_created_lazily_and_retained_when_inactive() {
    let mut l = linker(nested_library());
    let root = l.play(&SequenceKey::new("root")).unwrap();
    assert!(l.instances.children(root).is_empty());

    let inside = update(&mut l, root, 15.0);
    assert_eq!(inside.active_sub_sequences, 1);
    let children = l.instances.children(root);
    assert_eq!(children.len(), 1);
    let child = l.instances.get(children[0]).unwrap();
    assert!(!child.is_finished());
    assert_eq!(child.ledger().len(), 1);
    assert_eq!(child.context().to, FrameTime(5.0));

    update(&mut l, root, 30.0);
    let child = l.instances.get(children[0]).unwrap();
    assert!(child.is_finished());
    assert!(child.ledger().is_empty());
    assert_eq!(l.instances.children(root), children);

    update(&mut l, root, 12.0);
    assert_eq!(l.instances.children(root), children);
    assert!(!l.instances.get(children[0]).unwrap().is_finished());
}

#[test]
fn volatile_roots_recompile_when_their_source_changes() {
    let lib = flat_library();
    lib.edit(&SequenceKey::new("root"), |s| s.volatile = true).unwrap();
    let mut l = linker(lib);
    let root = l.play(&SequenceKey::new("root")).unwrap();
    update(&mut l, root, 10.0);
    assert_eq!(l.instances.get(root).unwrap().volatility().unwrap().recompiles(), 0);

    l.library
        .edit(&SequenceKey::new("root"), |s| {
            s.tracks[0].sections[0].range = TimeRange::new(0, 5);
        })
        .unwrap();
    let after = update(&mut l, root, 10.0);
    let vm = l.instances.get(root).unwrap().volatility().unwrap();
    assert_eq!(vm.recompiles(), 1);
    assert_eq!(vm.checks(), 2);
    assert_eq!(after.linked, 0);
    assert!(l.instances.get(root).unwrap().ledger().is_empty());
}

#[test]
fn non_root_handles_are_rejected() {
    let mut l = linker(nested_library());
    let root = l.play(&SequenceKey::new("root")).unwrap();
    update(&mut l, root, 15.0);
    let child = l.instances.children(root)[0];
    let ctx = EvaluationContext::at(FrameTime(15.0));
    assert!(update_root(child, &ctx, &mut l.update_env()).is_err());
    assert!(l.instances.finish_root(child, &mut l.store).is_err());
}
