use crate::compile::data::CompiledDataId;
use crate::ecs::store::EntityStore;
use crate::foundation::error::{TemporaError, TemporaResult};
use crate::foundation::ids::{InstanceHandle, SequenceId};
use crate::instance::context::EvaluationContext;
use crate::instance::ledger::EntityLedger;
use crate::instance::updater::{SequenceUpdater, UpdateEnv, UpdateOutcome};
use crate::instance::volatility::VolatilityManager;
use std::collections::BTreeMap;

/// Runtime state of one root or sub-sequence instance.
#[derive(Debug)]
pub struct SequenceInstance {
    pub(crate) handle: InstanceHandle,
    pub(crate) root: InstanceHandle,
    pub(crate) sequence: SequenceId,
    pub(crate) compiled: CompiledDataId,
    pub(crate) generation: u64,
    pub(crate) context: EvaluationContext,
    pub(crate) finished: bool,
    pub(crate) ledger: EntityLedger,
    pub(crate) updater: Option<SequenceUpdater>,
    pub(crate) volatility: Option<VolatilityManager>,
    pub(crate) children: BTreeMap<SequenceId, InstanceHandle>,
}

impl SequenceInstance {
    /// Handle of this instance.
    pub fn handle(&self) -> InstanceHandle {
        self.handle
    }

    /// Handle of the owning root (itself for roots).
    pub fn root_handle(&self) -> InstanceHandle {
        self.root
    }

    /// Node id inside the root's hierarchy.
    pub fn sequence(&self) -> SequenceId {
        self.sequence
    }

    /// Compiled data the instance evaluates.
    pub fn compiled(&self) -> CompiledDataId {
        self.compiled
    }

    /// Context of the last update, in this instance's local time.
    pub fn context(&self) -> &EvaluationContext {
        &self.context
    }

    /// Return `true` when the instance holds no entities and is not being evaluated.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Return `true` for root instances.
    pub fn is_root(&self) -> bool {
        self.handle == self.root
    }

    /// Entities this instance owns.
    pub fn ledger(&self) -> &EntityLedger {
        &self.ledger
    }

    /// Updater of a root instance.
    pub fn updater(&self) -> Option<&SequenceUpdater> {
        self.updater.as_ref()
    }

    /// Volatility tracker, present on roots compiled from volatile sequences.
    pub fn volatility(&self) -> Option<&VolatilityManager> {
        self.volatility.as_ref()
    }
}

/// Owner of every live sequence instance.
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    instances: BTreeMap<InstanceHandle, SequenceInstance>,
    next: u32,
}

impl InstanceRegistry {
    fn next_handle(&mut self) -> InstanceHandle {
        let h = InstanceHandle(self.next);
        self.next += 1;
        h
    }

    /// Allocate a root instance; it starts finished.
    pub(crate) fn allocate_root(
        &mut self,
        compiled: CompiledDataId,
        generation: u64,
        updater: SequenceUpdater,
        volatile: bool,
    ) -> InstanceHandle {
        let handle = self.next_handle();
        self.instances.insert(
            handle,
            SequenceInstance {
                handle,
                root: handle,
                sequence: SequenceId::ROOT,
                compiled,
                generation,
                context: EvaluationContext::default(),
                finished: true,
                ledger: EntityLedger::default(),
                updater: Some(updater),
                volatility: volatile.then(VolatilityManager::default),
                children: BTreeMap::new(),
            },
        );
        handle
    }

    /// Sub-instance of `root` for `sequence`, created on first activation and retained after.
    pub(crate) fn get_or_create_sub(
        &mut self,
        root: InstanceHandle,
        sequence: SequenceId,
    ) -> TemporaResult<InstanceHandle> {
        let (compiled, generation, existing) = {
            let r = self.require(root)?;
            (r.compiled, r.generation, r.children.get(&sequence).copied())
        };
        if let Some(h) = existing {
            return Ok(h);
        }
        let handle = self.next_handle();
        self.instances.insert(
            handle,
            SequenceInstance {
                handle,
                root,
                sequence,
                compiled,
                generation,
                context: EvaluationContext::default(),
                finished: true,
                ledger: EntityLedger::default(),
                updater: None,
                volatility: None,
                children: BTreeMap::new(),
            },
        );
        self.require_mut(root)?.children.insert(sequence, handle);
        tracing::debug!(root = root.0, sequence = sequence.0, "sub-instance created");
        Ok(handle)
    }

    /// Existing sub-instance of `root` for `sequence`.
    pub fn sub_instance(&self, root: InstanceHandle, sequence: SequenceId) -> Option<InstanceHandle> {
        self.instances.get(&root)?.children.get(&sequence).copied()
    }

    /// Instance by handle.
    pub fn get(&self, h: InstanceHandle) -> Option<&SequenceInstance> {
        self.instances.get(&h)
    }

    pub(crate) fn get_mut(&mut self, h: InstanceHandle) -> Option<&mut SequenceInstance> {
        self.instances.get_mut(&h)
    }

    /// Instance by handle, or a precondition error.
    pub fn require(&self, h: InstanceHandle) -> TemporaResult<&SequenceInstance> {
        self.get(h)
            .ok_or_else(|| TemporaError::precondition(format!("instance {} does not exist", h.0)))
    }

    pub(crate) fn require_mut(&mut self, h: InstanceHandle) -> TemporaResult<&mut SequenceInstance> {
        self.instances
            .get_mut(&h)
            .ok_or_else(|| TemporaError::precondition(format!("instance {} does not exist", h.0)))
    }

    /// Root handles, ascending.
    pub fn roots(&self) -> Vec<InstanceHandle> {
        self.instances
            .values()
            .filter(|i| i.is_root())
            .map(|i| i.handle)
            .collect()
    }

    /// Sub-instances of `root`, ordered by sequence id.
    pub fn children(&self, root: InstanceHandle) -> Vec<InstanceHandle> {
        self.instances
            .get(&root)
            .map(|r| r.children.values().copied().collect())
            .unwrap_or_default()
    }

    /// Every instance, ascending by handle.
    pub fn iter(&self) -> impl Iterator<Item = &SequenceInstance> {
        self.instances.values()
    }

    /// Number of instances (roots and subs).
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Return `true` when no instance exists.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    fn root_and_children(&self, root: InstanceHandle) -> Vec<InstanceHandle> {
        let mut out = vec![root];
        out.extend(self.children(root));
        out
    }

    /// Unlink every entity of `root` and its sub-instances and mark them finished.
    /// Returns the number of entities scheduled for unlinking.
    pub(crate) fn finish_root(&mut self, root: InstanceHandle, store: &mut EntityStore) -> TemporaResult<usize> {
        if !self.require(root)?.is_root() {
            return Err(TemporaError::precondition(format!(
                "instance {} is not a root",
                root.0
            )));
        }
        let mut n = 0;
        for h in self.root_and_children(root) {
            if let Some(inst) = self.instances.get_mut(&h) {
                n += inst.ledger.unlink_all(store)?;
                inst.finished = true;
                if let Some(u) = inst.updater.as_mut() {
                    u.invalidate();
                }
            }
        }
        Ok(n)
    }

    /// Finish `root` and drop it with all its sub-instances.
    pub(crate) fn destroy_root(&mut self, root: InstanceHandle, store: &mut EntityStore) -> TemporaResult<usize> {
        let n = self.finish_root(root, store)?;
        for h in self.root_and_children(root) {
            self.instances.remove(&h);
        }
        Ok(n)
    }

    /// Drop the sub-instances of `root` after its hierarchy was rebuilt.
    fn drop_children(&mut self, root: InstanceHandle, store: &mut EntityStore) -> TemporaResult<()> {
        for h in self.children(root) {
            if let Some(mut inst) = self.instances.remove(&h) {
                inst.ledger.unlink_all(store)?;
            }
        }
        if let Some(r) = self.instances.get_mut(&root) {
            r.children.clear();
        }
        Ok(())
    }
}

/// Update a root instance to `ctx`: volatility check, start, then the entity diff.
pub(crate) fn update_root(
    root: InstanceHandle,
    ctx: &EvaluationContext,
    env: &mut UpdateEnv<'_>,
) -> TemporaResult<UpdateOutcome> {
    let (updater, volatility) = {
        let inst = env.instances.require_mut(root)?;
        (inst.updater.take(), inst.volatility.take())
    };
    let Some(mut updater) = updater else {
        return Err(TemporaError::precondition(format!(
            "instance {} is not a root",
            root.0
        )));
    };
    let mut volatility = volatility;
    let result = run_update(root, ctx, env, &mut updater, &mut volatility);
    if let Some(inst) = env.instances.get_mut(root) {
        inst.updater = Some(updater);
        inst.volatility = volatility;
    }
    result
}

fn run_update(
    root: InstanceHandle,
    ctx: &EvaluationContext,
    env: &mut UpdateEnv<'_>,
    updater: &mut SequenceUpdater,
    volatility: &mut Option<VolatilityManager>,
) -> TemporaResult<UpdateOutcome> {
    let id = env.instances.require(root)?.compiled;
    if let Some(vm) = volatility.as_mut() {
        vm.conditional_recompile(env.library, env.compiled, id)?;
    }
    // The data may also have been rebuilt through another root of the same sequence.
    let generation = env.compiled.require(id)?.generation;
    let inst = env.instances.require_mut(root)?;
    if inst.generation != generation {
        inst.generation = generation;
        inst.ledger.unlink_all(env.store)?;
        env.instances.drop_children(root, env.store)?;
        *updater = SequenceUpdater::for_hierarchy(&env.compiled.require(id)?.hierarchy);
        tracing::debug!(root = root.0, generation, "root re-linked against rebuilt data");
    }
    let inst = env.instances.require_mut(root)?;
    if inst.finished {
        inst.finished = false;
        updater.invalidate();
        tracing::debug!(root = root.0, "instance started");
    }
    updater.update(root, ctx, env)
}

#[cfg(test)]
#[path = "../../tests/unit/instance/registry.rs"]
mod tests;
