use crate::blend::channel::BlendChannel;
use crate::foundation::error::TemporaResult;
use crate::foundation::ids::{InstanceHandle, ObjectKey, SectionId, SequenceId, TrackId};
use crate::foundation::time::{FrameNumber, FrameTime, TimeRange};
use crate::model::sequence::{BindingId, BlendKind, Curve};
use smallvec::SmallVec;
use std::sync::Arc;

use super::registry::{ComponentMask, ComponentRegistry, ComponentTypeId};

/// Instance, sequence and source section that own an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityOwner {
    /// Owning instance.
    pub instance: InstanceHandle,
    /// Sequence node that compiled the entity.
    pub sequence: SequenceId,
    /// Source track.
    pub track: TrackId,
    /// Source section.
    pub section: SectionId,
    /// Provider-local entity index.
    pub entity_index: u32,
}

/// Unresolved object binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectBinding(pub BindingId);

/// Objects the binding resolved to; empty when unresolvable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundObjects(pub SmallVec<[ObjectKey; 2]>);

/// Name of the animated property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyBinding(pub Arc<str>);

/// Value source of a property entity.
#[derive(Debug, Clone)]
pub struct FloatCurve(pub Arc<Curve>);

/// Ease-in/out ramp in sequence-local time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Easing {
    /// Section range.
    pub range: TimeRange,
    /// Ramp-in length in frames.
    pub ease_in: u32,
    /// Ramp-out length in frames.
    pub ease_out: u32,
}

/// Base time of an additive-from-base contributor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaseValueTime(pub FrameTime);

/// Accumulated hierarchical bias of the owning sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HierarchicalBias(pub i32);

/// Sequence-local evaluation time, written every cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EvalTime(pub FrameTime);

/// Blend weight in `[0, 1]`, written every cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weight(pub f64);

impl Default for Weight {
    fn default() -> Self {
        Self(1.0)
    }
}

/// Contribution value before blending, written every cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EvaluatedValue(pub f64);

/// Blend channels this entity contributes to (one per bound object).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlendInputs(pub SmallVec<[BlendChannel; 2]>);

/// One-shot trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTrigger {
    /// Event name.
    pub name: Arc<str>,
    /// Local key frame.
    pub frame: FrameNumber,
}

/// Keeps a spawnable alive while linked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnableBinding {
    /// Binding the spawned object answers to.
    pub binding: BindingId,
    /// Host template name.
    pub template: Arc<str>,
}

/// Tag: linked since the last instantiation pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeedsLink;

/// Tag: scheduled for removal at the next instantiation pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeedsUnlink;

/// Tag: needs an initialization pass when linked.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequiresInit;

/// Tag: lives for a single update.
#[derive(Debug, Clone, Copy, Default)]
pub struct OneShot;

/// Tag: the event has been queued for dispatch.
#[derive(Debug, Clone, Copy, Default)]
pub struct Triggered;

/// Ids of the built-in component types.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy)]
pub struct BuiltinComponents {
    pub owner: ComponentTypeId,
    pub object_binding: ComponentTypeId,
    pub bound_objects: ComponentTypeId,
    pub property: ComponentTypeId,
    pub curve: ComponentTypeId,
    pub blend_kind: ComponentTypeId,
    pub easing: ComponentTypeId,
    pub base_time: ComponentTypeId,
    pub bias: ComponentTypeId,
    pub eval_time: ComponentTypeId,
    pub weight: ComponentTypeId,
    pub value: ComponentTypeId,
    pub blend_inputs: ComponentTypeId,
    pub event: ComponentTypeId,
    pub spawnable: ComponentTypeId,
    pub needs_link: ComponentTypeId,
    pub needs_unlink: ComponentTypeId,
    pub requires_init: ComponentTypeId,
    pub one_shot: ComponentTypeId,
    pub triggered: ComponentTypeId,
}

impl BuiltinComponents {
    /// Register every built-in type.
    pub fn register(r: &mut ComponentRegistry) -> TemporaResult<Self> {
        Ok(Self {
            owner: r.register::<EntityOwner>("owner")?,
            object_binding: r.register::<ObjectBinding>("object_binding")?,
            bound_objects: r.register::<BoundObjects>("bound_objects")?,
            property: r.register::<PropertyBinding>("property")?,
            curve: r.register::<FloatCurve>("float_curve")?,
            blend_kind: r.register::<BlendKind>("blend_kind")?,
            easing: r.register::<Easing>("easing")?,
            base_time: r.register::<BaseValueTime>("base_value_time")?,
            bias: r.register::<HierarchicalBias>("hierarchical_bias")?,
            eval_time: r.register::<EvalTime>("eval_time")?,
            weight: r.register::<Weight>("weight")?,
            value: r.register::<EvaluatedValue>("evaluated_value")?,
            blend_inputs: r.register::<BlendInputs>("blend_inputs")?,
            event: r.register::<EventTrigger>("event_trigger")?,
            spawnable: r.register::<SpawnableBinding>("spawnable")?,
            needs_link: r.register_tag::<NeedsLink>("needs_link")?,
            needs_unlink: r.register_tag::<NeedsUnlink>("needs_unlink")?,
            requires_init: r.register_tag::<RequiresInit>("requires_init")?,
            one_shot: r.register_tag::<OneShot>("one_shot")?,
            triggered: r.register_tag::<Triggered>("triggered")?,
        })
    }

    /// Look the built-in ids up in a registry they were registered in.
    pub fn lookup(r: &ComponentRegistry) -> TemporaResult<Self> {
        Ok(Self {
            owner: r.id_of::<EntityOwner>()?,
            object_binding: r.id_of::<ObjectBinding>()?,
            bound_objects: r.id_of::<BoundObjects>()?,
            property: r.id_of::<PropertyBinding>()?,
            curve: r.id_of::<FloatCurve>()?,
            blend_kind: r.id_of::<BlendKind>()?,
            easing: r.id_of::<Easing>()?,
            base_time: r.id_of::<BaseValueTime>()?,
            bias: r.id_of::<HierarchicalBias>()?,
            eval_time: r.id_of::<EvalTime>()?,
            weight: r.id_of::<Weight>()?,
            value: r.id_of::<EvaluatedValue>()?,
            blend_inputs: r.id_of::<BlendInputs>()?,
            event: r.id_of::<EventTrigger>()?,
            spawnable: r.id_of::<SpawnableBinding>()?,
            needs_link: r.id_of::<NeedsLink>()?,
            needs_unlink: r.id_of::<NeedsUnlink>()?,
            requires_init: r.id_of::<RequiresInit>()?,
            one_shot: r.id_of::<OneShot>()?,
            triggered: r.id_of::<Triggered>()?,
        })
    }

    /// Mask of the given ids.
    pub fn mask(ids: &[ComponentTypeId]) -> ComponentMask {
        ids.iter().fold(ComponentMask::EMPTY, |m, id| m.with(*id))
    }
}
