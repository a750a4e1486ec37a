//! Read-only access for renderers and inspection tools.

use crate::blend::channel::BlendTarget;
use crate::blend::decompose::{Contribution, Decomposition, DecompositionQuery};
use crate::compile::data::CompiledData;
use crate::ecs::entity::EntityId;
use crate::ecs::linker::Linker;
use crate::foundation::ids::{InstanceHandle, ObjectKey, SequenceId};
use crate::instance::ledger::EntityKey;
use std::sync::Arc;

/// One node of the instance tree.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceNode {
    /// Instance handle.
    pub handle: InstanceHandle,
    /// Node id in the root's hierarchy.
    pub sequence: SequenceId,
    /// The instance is finished.
    pub finished: bool,
    /// Live entities owned by the instance.
    pub entities: usize,
    /// Sub-instances (roots only).
    pub children: Vec<InstanceNode>,
}

/// Borrowed view over a [`Linker`]; never mutates it.
#[derive(Debug, Clone, Copy)]
pub struct LinkerView<'a> {
    linker: &'a Linker,
}

fn target(object: ObjectKey, property: &str) -> BlendTarget {
    BlendTarget {
        object,
        property: Arc::from(property),
    }
}

impl<'a> LinkerView<'a> {
    pub(crate) fn new(linker: &'a Linker) -> Self {
        Self { linker }
    }

    /// Blended value of `property` on `object` from the last evaluation.
    pub fn value(&self, object: ObjectKey, property: &str) -> Option<f64> {
        self.linker.blend.value_of(&target(object, property))
    }

    /// Every blended value, ordered by object then property.
    pub fn outputs(&self) -> Vec<(BlendTarget, f64)> {
        let mut out: Vec<(BlendTarget, f64)> = self
            .linker
            .blend
            .outputs()
            .map(|(t, v)| (t.clone(), v))
            .collect();
        out.sort_by(|a, b| {
            (a.0.object, &*a.0.property).cmp(&(b.0.object, &*b.0.property))
        });
        out
    }

    /// Contributions blended into `property` on `object`.
    pub fn contributions(&self, object: ObjectKey, property: &str) -> &'a [Contribution] {
        match self.linker.blend.channels.channel_of(&target(object, property)) {
            Some(ch) => self.linker.blend.contributions(ch),
            None => &[],
        }
    }

    /// Separate `entities` from the rest of one property's blend.
    pub fn decompose(&self, object: ObjectKey, property: &str, entities: &[EntityId]) -> Option<Decomposition> {
        let channel = self
            .linker
            .blend
            .channels
            .channel_of(&target(object, property))?;
        self.linker
            .blend
            .decompose(DecompositionQuery { channel, entities })
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.linker.store.len()
    }

    /// Roots with their sub-instances.
    pub fn instance_tree(&self) -> Vec<InstanceNode> {
        let instances = &self.linker.instances;
        let node = |h: InstanceHandle| {
            instances.get(h).map(|i| InstanceNode {
                handle: h,
                sequence: i.sequence(),
                finished: i.is_finished(),
                entities: i.ledger().len(),
                children: Vec::new(),
            })
        };
        instances
            .roots()
            .into_iter()
            .filter_map(|root| {
                let mut n = node(root)?;
                n.children = instances.children(root).into_iter().filter_map(node).collect();
                Some(n)
            })
            .collect()
    }

    /// Field-sourced entities of one instance.
    pub fn entities_of(&self, instance: InstanceHandle) -> Vec<(EntityKey, EntityId)> {
        self.linker
            .instances
            .get(instance)
            .map(|i| i.ledger().iter().map(|(k, e)| (*k, *e)).collect())
            .unwrap_or_default()
    }

    /// Compiled data evaluated by an instance.
    pub fn compiled(&self, instance: InstanceHandle) -> Option<&'a CompiledData> {
        let id = self.linker.instances.get(instance)?.compiled();
        self.linker.compiled.get(id)
    }
}
