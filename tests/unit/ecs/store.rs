use super::*;

#[derive(Debug, Clone, PartialEq)]
struct Pos(f64);
struct Marker;
struct Unregistered;

fn store() -> EntityStore {
    let mut r = ComponentRegistry::default();
    r.register::<Pos>("pos").unwrap();
    r.register_tag::<Marker>("marker").unwrap();
    EntityStore::new(Arc::new(r))
}

fn spawn_pos(s: &mut EntityStore, v: f64) -> EntityId {
    let mut b = ImportedEntity::new();
    b.add(Pos(v)).add_tag::<Marker>();
    s.spawn(b).unwrap()
}

#[test]
fn spawn_insert_and_query() {
    let mut s = store();
    let e = spawn_pos(&mut s, 1.0);
    assert_eq!(s.get::<Pos>(e), Some(Pos(1.0)));
    assert!(s.has::<Marker>(e));
    let v0 = s.structure_version();
    s.insert(e, Pos(2.0)).unwrap();
    assert_eq!(s.structure_version(), v0, "value replacement is not structural");
    assert_eq!(s.get::<Pos>(e), Some(Pos(2.0)));

    let all = s.registry().mask_of::<Marker>().unwrap();
    assert_eq!(s.query(all, ComponentMask::EMPTY), vec![e]);
    assert!(s.query(ComponentMask::EMPTY, all).is_empty());
}

#[test]
fn empty_bundles_and_unknown_types_are_rejected() {
    let mut s = store();
    assert!(matches!(
        s.spawn(ImportedEntity::new()),
        Err(TemporaError::Precondition(_))
    ));
    let mut b = ImportedEntity::new();
    b.add_tag::<Unregistered>();
    assert!(s.spawn(b).is_err());
    assert!(s.is_empty());
}

#[test]
fn removing_the_last_component_frees_the_entity() {
    let mut s = store();
    let e = spawn_pos(&mut s, 1.0);
    s.remove::<Pos>(e).unwrap();
    assert!(s.contains(e));
    s.remove::<Marker>(e).unwrap();
    assert!(!s.contains(e));
    assert_eq!(s.get::<Pos>(e), None);
}

#[test]
fn stale_handles_do_not_alias_new_entities() {
    let mut s = store();
    let old = spawn_pos(&mut s, 1.0);
    assert!(s.despawn(old));
    s.compact();
    let new = spawn_pos(&mut s, 5.0);
    assert_eq!(old.index(), new.index());
    assert_eq!(s.get::<Pos>(old), None);
    assert!(s.set(old, Pos(9.0)).is_err());
    assert_eq!(s.get::<Pos>(new), Some(Pos(5.0)));
}

#[test]
fn value_writes_are_allowed_while_locked() {
    let mut s = store();
    let e = spawn_pos(&mut s, 1.0);
    s.lock();
    s.set(e, Pos(3.0)).unwrap();
    {
        let mut col = s.write::<Pos>().unwrap();
        col.get_mut(e).unwrap().0 += 1.0;
    }
    s.unlock();
    assert_eq!(s.get::<Pos>(e), Some(Pos(4.0)));
}

#[test]
#[should_panic(expected = "locked EntityStore")]
fn structural_mutation_while_locked_panics() {
    let mut s = store();
    let e = spawn_pos(&mut s, 1.0);
    s.lock();
    s.despawn(e);
}
