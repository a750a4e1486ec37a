use super::*;
use crate::ecs::store::ImportedEntity;

struct A;
struct B;
struct C;

fn registry() -> Arc<ComponentRegistry> {
    let mut r = ComponentRegistry::default();
    r.register_tag::<A>("a").unwrap();
    r.register_tag::<B>("b").unwrap();
    r.register_tag::<C>("c").unwrap();
    Arc::new(r)
}

#[derive(Clone, Copy)]
enum Mask {
    None,
    A,
    B,
    C,
}

impl Mask {
    fn resolve(self, r: &ComponentRegistry) -> ComponentMask {
        match self {
            Mask::None => ComponentMask::EMPTY,
            Mask::A => r.mask_of::<A>().unwrap(),
            Mask::B => r.mask_of::<B>().unwrap(),
            Mask::C => r.mask_of::<C>().unwrap(),
        }
    }
}

struct Probe {
    name: &'static str,
    phase: Phase,
    relevant: Option<Mask>,
    produces: Mask,
    consumes: Mask,
    after: Vec<&'static str>,
}

impl Probe {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            phase: Phase::Evaluation,
            relevant: None,
            produces: Mask::None,
            consumes: Mask::None,
            after: Vec::new(),
        }
    }

    fn io(mut self, consumes: Mask, produces: Mask) -> Self {
        self.consumes = consumes;
        self.produces = produces;
        self
    }

    fn after(mut self, name: &'static str) -> Self {
        self.after.push(name);
        self
    }

    fn relevant(mut self, m: Mask) -> Self {
        self.relevant = Some(m);
        self
    }

    fn phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }
}

impl System for Probe {
    fn name(&self) -> &'static str {
        self.name
    }

    fn phase(&self) -> Phase {
        self.phase
    }

    fn describe(&self, r: &ComponentRegistry) -> TemporaResult<SystemDescriptor> {
        let mut d = match self.relevant {
            Some(m) => SystemDescriptor::relevant_to(m.resolve(r)),
            None => SystemDescriptor::always(),
        }
        .producing(self.produces.resolve(r))
        .consuming(self.consumes.resolve(r));
        for p in &self.after {
            d = d.after(*p);
        }
        Ok(d)
    }

    fn run(&self, _cx: &mut SystemContext<'_>) -> TemporaResult<()> {
        Ok(())
    }
}

fn graph(probes: Vec<Probe>, r: &ComponentRegistry) -> SystemGraph {
    let mut g = SystemGraph::default();
    for p in probes {
        g.add(Arc::new(p), r).unwrap();
    }
    g
}

#[test]
fn producers_run_before_consumers() {
    let r = registry();
    let store = EntityStore::new(Arc::clone(&r));
    let mut g = graph(
        vec![
            Probe::new("third").io(Mask::B, Mask::None),
            Probe::new("second").io(Mask::A, Mask::B),
            Probe::new("first").io(Mask::None, Mask::A),
            Probe::new("loose"),
        ],
        &r,
    );
    assert!(g.update_links(&store).unwrap());
    assert_eq!(
        g.order(Phase::Evaluation),
        vec!["first", "second", "third", "loose"]
    );
    assert!(g.order(Phase::Spawn).is_empty());
}

#[test]
fn explicit_prerequisites_order_within_a_phase() {
    let r = registry();
    let store = EntityStore::new(Arc::clone(&r));
    let mut g = graph(
        vec![
            Probe::new("late").after("early"),
            Probe::new("early"),
            Probe::new("spawn").phase(Phase::Spawn).after("early"),
        ],
        &r,
    );
    g.update_links(&store).unwrap();
    assert_eq!(g.order(Phase::Evaluation), vec!["early", "late"]);
    // Prerequisites in other phases do not constrain.
    assert_eq!(g.order(Phase::Spawn), vec!["spawn"]);
}

#[test]
fn cycles_are_precondition_errors() {
    let r = registry();
    let store = EntityStore::new(Arc::clone(&r));
    let mut g = graph(
        vec![
            Probe::new("x").io(Mask::A, Mask::B),
            Probe::new("y").io(Mask::B, Mask::A),
        ],
        &r,
    );
    assert!(matches!(
        g.update_links(&store),
        Err(TemporaError::Precondition(_))
    ));
}

#[test]
fn duplicate_names_are_rejected() {
    let r = registry();
    let mut g = graph(vec![Probe::new("dup")], &r);
    assert!(g.add(Arc::new(Probe::new("dup")), &r).is_err());
    assert_eq!(g.names(), vec!["dup"]);
}

#[test]
fn systems_link_while_relevant_entities_exist() {
    let r = registry();
    let mut store = EntityStore::new(Arc::clone(&r));
    let mut g = graph(
        vec![
            Probe::new("on_a").relevant(Mask::A),
            Probe::new("on_c").relevant(Mask::C),
            Probe::new("always"),
        ],
        &r,
    );
    g.update_links(&store).unwrap();
    assert_eq!(g.linked(), vec!["always"]);
    assert!(!g.update_links(&store).unwrap(), "unchanged structure does no work");

    let mut bundle = ImportedEntity::new();
    bundle.add_tag::<A>();
    let e = store.spawn(bundle).unwrap();
    assert!(g.update_links(&store).unwrap());
    assert_eq!(g.linked(), vec!["on_a", "always"]);
    assert_eq!(g.order(Phase::Evaluation), vec!["on_a", "always"]);

    store.despawn(e);
    store.compact();
    assert!(g.update_links(&store).unwrap());
    assert_eq!(g.linked(), vec!["always"]);
}
