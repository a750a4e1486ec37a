use super::*;
use crate::ecs::components::{EntityOwner, NeedsLink};
use crate::ecs::registry::{ComponentMask, ComponentRegistry};
use crate::foundation::ids::InstanceHandle;
use proptest::prelude::*;
use std::sync::Arc;

fn store() -> EntityStore {
    let mut r = ComponentRegistry::default();
    r.register::<EntityOwner>("owner").unwrap();
    r.register_tag::<NeedsLink>("needs_link").unwrap();
    r.register_tag::<NeedsUnlink>("needs_unlink").unwrap();
    EntityStore::new(Arc::new(r))
}

fn seg(track: u32, one_shot: bool) -> FieldSegment {
    FieldSegment {
        sequence: SequenceId::ROOT,
        track: TrackId(track),
        section: SectionId(0),
        entity_index: 0,
        group_priority: 0,
        hierarchical_bias: 0,
        eval_priority: 0,
        requires_init: false,
        one_shot,
    }
}

fn importer(seg: &FieldSegment) -> TemporaResult<Option<ImportedEntity>> {
    let mut b = ImportedEntity::new();
    b.add(EntityOwner {
        instance: InstanceHandle(0),
        sequence: seg.sequence,
        track: seg.track,
        section: seg.section,
        entity_index: seg.entity_index,
    })
    .add_tag::<NeedsLink>();
    Ok(Some(b))
}

/// Free unlinked entities the way an instantiation pass does.
fn instantiate(store: &mut EntityStore) {
    let unlink = store.registry().mask_of::<NeedsUnlink>().unwrap();
    for e in store.query(unlink, ComponentMask::EMPTY) {
        store.despawn(e);
    }
}

#[test]
fn diff_links_new_and_unlinks_stale_entities() {
    let mut s = store();
    let mut l = EntityLedger::default();
    let d = l.update_entities(&mut s, &[seg(1, false), seg(2, false)], &mut importer).unwrap();
    assert_eq!(d, LedgerDiff { linked: 2, unlinked: 0 });
    let d = l.update_entities(&mut s, &[seg(2, false), seg(3, false)], &mut importer).unwrap();
    assert_eq!(d, LedgerDiff { linked: 1, unlinked: 1 });
    instantiate(&mut s);
    assert_eq!(s.len(), 2);
    assert_eq!(l.len(), 2);
}

#[test]
fn one_shots_are_replaced_every_update() {
    let mut s = store();
    let mut l = EntityLedger::default();
    l.update_one_shots(&mut s, &[seg(9, true)], &mut importer).unwrap();
    let first = l.get(&EntityKey::from(&seg(9, true))).unwrap();
    l.update_one_shots(&mut s, &[seg(9, true)], &mut importer).unwrap();
    let second = l.get(&EntityKey::from(&seg(9, true))).unwrap();
    assert_ne!(first, second);
    assert!(s.has::<NeedsUnlink>(first));
    assert_eq!(l.unlink_all(&mut s).unwrap(), 1);
    assert!(l.is_empty());
}

#[test]
fn unlink_failures_propagate_to_the_caller() {
    let mut r = ComponentRegistry::default();
    r.register::<EntityOwner>("owner").unwrap();
    r.register_tag::<NeedsLink>("needs_link").unwrap();
    let mut s = EntityStore::new(Arc::new(r));
    let mut l = EntityLedger::default();
    l.update_entities(&mut s, &[seg(1, false)], &mut importer).unwrap();

    let err = l.update_entities(&mut s, &[], &mut importer).unwrap_err();
    assert!(matches!(err, crate::foundation::error::TemporaError::Precondition(_)));
    assert!(l.is_empty());
    assert_eq!(s.len(), 1);
}

proptest! {
    #[test]
    fn at_most_one_live_entity_per_key(
        steps in proptest::collection::vec(
            (proptest::collection::vec(0u32..6, 0..6), any::<bool>()),
            1..20,
        ),
    ) {
        let mut s = store();
        let mut l = EntityLedger::default();
        let unlink = s.registry().mask_of::<NeedsUnlink>().unwrap();
        for (tracks, flush) in steps {
            let wanted: Vec<FieldSegment> = tracks.iter().map(|t| seg(*t, false)).collect();
            l.update_entities(&mut s, &wanted, &mut importer).unwrap();
            if flush {
                instantiate(&mut s);
            }
            let live = s.query(ComponentMask::EMPTY, unlink);
            let mut seen = std::collections::BTreeMap::new();
            for e in live {
                let owner = s.get::<EntityOwner>(e).unwrap();
                *seen.entry(owner.track).or_insert(0) += 1;
            }
            for (track, n) in &seen {
                prop_assert!(*n <= 1, "track {track:?} has {n} live entities");
            }
            for t in &tracks {
                prop_assert_eq!(seen.get(&TrackId(*t)).copied(), Some(1));
            }
        }
    }
}
