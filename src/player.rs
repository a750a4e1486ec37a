//! Host-side contracts: the player that drives evaluation and receives its results.

use crate::blend::channel::BlendTarget;
use crate::ecs::runner::EventScope;
use crate::foundation::error::TemporaResult;
use crate::foundation::ids::{InstanceHandle, ObjectKey, SequenceId};
use crate::foundation::time::FrameNumber;
use crate::instance::context::PlaybackStatus;
use crate::model::sequence::BindingId;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One-shot event collected during finalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    /// Instance that fired the event.
    pub instance: InstanceHandle,
    /// Sequence node of the event's track.
    pub sequence: SequenceId,
    /// Event name.
    pub name: Arc<str>,
    /// Local key frame.
    pub frame: FrameNumber,
    /// Objects bound to the event's track, if any.
    pub objects: SmallVec<[ObjectKey; 2]>,
}

/// Objects spawned for spawnable bindings, per owning instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpawnRegister {
    objects: BTreeMap<(InstanceHandle, BindingId), ObjectKey>,
}

impl SpawnRegister {
    /// Object spawned for `binding` in `instance`.
    pub fn get(&self, instance: InstanceHandle, binding: BindingId) -> Option<ObjectKey> {
        self.objects.get(&(instance, binding)).copied()
    }

    pub(crate) fn insert(&mut self, instance: InstanceHandle, binding: BindingId, object: ObjectKey) {
        self.objects.insert((instance, binding), object);
    }

    pub(crate) fn remove(&mut self, instance: InstanceHandle, binding: BindingId) -> Option<ObjectKey> {
        self.objects.remove(&(instance, binding))
    }

    /// Number of spawned objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Return `true` when nothing is spawned.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Host player consulted during evaluation.
///
/// Only binding resolution is mandatory; every hook defaults to a no-op.
pub trait PlaybackContext: Send {
    /// Objects bound to `binding` in the given sequence node. Empty when unresolvable.
    fn resolve_bound_objects(&mut self, binding: BindingId, sequence: SequenceId) -> SmallVec<[ObjectKey; 2]>;

    /// Current player status.
    fn status(&self) -> PlaybackStatus {
        PlaybackStatus::Playing
    }

    /// Current value of `property` on `object`, captured as a blend channel's initial value.
    fn initial_value(&mut self, _object: ObjectKey, _property: &str) -> f64 {
        0.0
    }

    /// Spawn an object for a spawnable binding.
    fn spawn_object(&mut self, _binding: BindingId, _template: &str, _instance: InstanceHandle) -> Option<ObjectKey> {
        None
    }

    /// Destroy an object created by [`PlaybackContext::spawn_object`].
    fn destroy_object(&mut self, _object: ObjectKey) {}

    /// Called for every instance before its systems run.
    fn pre_evaluation(&mut self, _instance: InstanceHandle) {}

    /// Called for every instance after finalization.
    fn post_evaluation(&mut self, _instance: InstanceHandle) {}

    /// Receive one blended value.
    fn apply_property(&mut self, _target: &BlendTarget, _value: f64) {}

    /// Handle the events of one cycle. Runs inside a re-entrancy window: `scope` may start
    /// sequences and flush them recursively.
    fn handle_events(&mut self, _events: &[EventRecord], _scope: &mut EventScope<'_>) -> TemporaResult<()> {
        Ok(())
    }
}
