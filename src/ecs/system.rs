use crate::blend::results::BlendState;
use crate::ecs::components::BuiltinComponents;
use crate::ecs::registry::{ComponentMask, ComponentRegistry};
use crate::ecs::store::EntityStore;
use crate::foundation::error::{TemporaError, TemporaResult};
use crate::instance::registry::InstanceRegistry;
use crate::player::{EventRecord, PlaybackContext, SpawnRegister};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;

/// Evaluation phase, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Spawnable objects are created and destroyed.
    Spawn,
    /// Linked and unlinked entities are resolved, freed entities released.
    Instantiation,
    /// Values are computed; the store is locked.
    Evaluation,
    /// Results are published and events collected.
    Finalization,
}

impl Phase {
    /// Every phase in execution order.
    pub const ALL: [Phase; 4] = [
        Phase::Spawn,
        Phase::Instantiation,
        Phase::Evaluation,
        Phase::Finalization,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Declared data dependencies of a system.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemDescriptor {
    /// The system is linked while any entity holds all of these.
    pub relevant: ComponentMask,
    /// Component types the system writes.
    pub produces: ComponentMask,
    /// Component types the system reads.
    pub consumes: ComponentMask,
    /// Systems of the same phase that must run first.
    pub prerequisites: Vec<&'static str>,
    /// Linked regardless of the store contents.
    pub always: bool,
}

impl SystemDescriptor {
    /// Descriptor linked while any entity holds all of `relevant`.
    pub fn relevant_to(relevant: ComponentMask) -> Self {
        Self {
            relevant,
            ..Self::default()
        }
    }

    /// Descriptor of a system that is always linked.
    pub fn always() -> Self {
        Self {
            always: true,
            ..Self::default()
        }
    }

    /// Declare written component types.
    pub fn producing(mut self, mask: ComponentMask) -> Self {
        self.produces = self.produces.union(mask);
        self
    }

    /// Declare read component types.
    pub fn consuming(mut self, mask: ComponentMask) -> Self {
        self.consumes = self.consumes.union(mask);
        self
    }

    /// Declare an explicit prerequisite.
    pub fn after(mut self, name: &'static str) -> Self {
        self.prerequisites.push(name);
        self
    }
}

/// Borrowed state a system runs against.
pub struct SystemContext<'a> {
    /// Entity store; locked during [`Phase::Evaluation`].
    pub store: &'a mut EntityStore,
    /// Host player.
    pub player: &'a mut dyn PlaybackContext,
    /// Live instances.
    pub instances: &'a InstanceRegistry,
    /// Blend channels and results.
    pub blend: &'a mut BlendState,
    /// Events queued for dispatch after finalization.
    pub events: &'a mut Vec<EventRecord>,
    /// Objects spawned for spawnable bindings.
    pub spawns: &'a mut SpawnRegister,
    /// Ids of the built-in component types.
    pub builtins: BuiltinComponents,
    /// Phase being run.
    pub phase: Phase,
    /// Systems may split per-entity work across the rayon pool.
    pub parallel: bool,
}

/// One unit of evaluation work.
pub trait System: Send + Sync {
    /// Unique name, used for explicit prerequisites.
    fn name(&self) -> &'static str;

    /// Phase the system runs in.
    fn phase(&self) -> Phase;

    /// Data dependencies, resolved against the runtime's registry once when added.
    fn describe(&self, registry: &ComponentRegistry) -> TemporaResult<SystemDescriptor>;

    /// Run over the current store contents.
    fn run(&self, cx: &mut SystemContext<'_>) -> TemporaResult<()>;
}

struct SystemNode {
    system: Arc<dyn System>,
    descriptor: SystemDescriptor,
    linked: bool,
}

/// Registered systems with incremental linking and per-phase topological order.
#[derive(Default)]
pub struct SystemGraph {
    nodes: Vec<SystemNode>,
    order: [Vec<usize>; 4],
    linked_version: Option<u64>,
}

impl std::fmt::Debug for SystemGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemGraph")
            .field("systems", &self.names())
            .field("linked", &self.linked())
            .finish()
    }
}

impl SystemGraph {
    /// Register a system; names must be unique.
    pub fn add(&mut self, system: Arc<dyn System>, registry: &ComponentRegistry) -> TemporaResult<()> {
        let name = system.name();
        if self.nodes.iter().any(|n| n.system.name() == name) {
            return Err(TemporaError::precondition(format!(
                "system '{name}' is already registered"
            )));
        }
        let descriptor = system.describe(registry)?;
        self.nodes.push(SystemNode {
            system,
            descriptor,
            linked: false,
        });
        self.linked_version = None;
        Ok(())
    }

    /// Names of every registered system, in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.nodes.iter().map(|n| n.system.name()).collect()
    }

    /// Names of the linked systems, in registration order.
    pub fn linked(&self) -> Vec<&'static str> {
        self.nodes
            .iter()
            .filter(|n| n.linked)
            .map(|n| n.system.name())
            .collect()
    }

    /// Linked systems of `phase` in execution order.
    pub fn order(&self, phase: Phase) -> Vec<&'static str> {
        self.order[phase.index()]
            .iter()
            .map(|i| self.nodes[*i].system.name())
            .collect()
    }

    /// Link systems that gained relevant entities and unlink those that lost them.
    /// Only does work when the store's structure changed. Returns `true` when the linked set
    /// changed.
    pub fn update_links(&mut self, store: &EntityStore) -> TemporaResult<bool> {
        let version = store.structure_version();
        if self.linked_version == Some(version) {
            return Ok(false);
        }
        let mut changed = self.linked_version.is_none();
        for node in &mut self.nodes {
            let linked = node.descriptor.always || store.any_with(node.descriptor.relevant);
            if linked != node.linked {
                tracing::debug!(system = node.system.name(), linked, "system link changed");
                node.linked = linked;
                changed = true;
            }
        }
        if changed {
            for phase in Phase::ALL {
                self.order[phase.index()] = self.sort_phase(phase)?;
            }
        }
        self.linked_version = Some(version);
        Ok(changed)
    }

    /// Kahn's algorithm over linked systems of one phase; ready ties resolve to the
    /// earliest-registered system.
    fn sort_phase(&self, phase: Phase) -> TemporaResult<Vec<usize>> {
        let members: Vec<usize> = (0..self.nodes.len())
            .filter(|i| self.nodes[*i].linked && self.nodes[*i].system.phase() == phase)
            .collect();
        let n = self.nodes.len();
        let mut indeg = vec![0u32; n];
        let mut dependents = vec![Vec::<usize>::new(); n];
        for &b in &members {
            let nb = &self.nodes[b];
            for &a in &members {
                if a == b {
                    continue;
                }
                let na = &self.nodes[a];
                let explicit = nb.descriptor.prerequisites.contains(&na.system.name());
                let implicit = na.descriptor.produces.intersects(nb.descriptor.consumes);
                if explicit || implicit {
                    dependents[a].push(b);
                    indeg[b] += 1;
                }
            }
        }

        let mut ready = BinaryHeap::<Reverse<usize>>::new();
        for &i in &members {
            if indeg[i] == 0 {
                ready.push(Reverse(i));
            }
        }
        let mut out = Vec::with_capacity(members.len());
        while let Some(Reverse(i)) = ready.pop() {
            out.push(i);
            for &d in &dependents[i] {
                indeg[d] -= 1;
                if indeg[d] == 0 {
                    ready.push(Reverse(d));
                }
            }
        }
        if out.len() != members.len() {
            let stuck: Vec<&str> = members
                .iter()
                .filter(|i| !out.contains(*i))
                .map(|i| self.nodes[*i].system.name())
                .collect();
            return Err(TemporaError::precondition(format!(
                "cyclic system dependencies in {phase:?}: {stuck:?}"
            )));
        }
        Ok(out)
    }

    /// Run the linked systems of the context's phase in order.
    pub(crate) fn run_phase(&self, cx: &mut SystemContext<'_>) -> TemporaResult<()> {
        for &i in &self.order[cx.phase.index()] {
            let system = &self.nodes[i].system;
            tracing::trace!(system = system.name(), phase = ?cx.phase, "run system");
            system.run(cx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/ecs/system.rs"]
mod tests;
