use crate::blend::channel::BlendTarget;
use crate::ecs::components::{
    BlendInputs, BoundObjects, BuiltinComponents, EntityOwner, ObjectBinding, PropertyBinding,
    RequiresInit,
};
use crate::ecs::registry::{ComponentMask, ComponentRegistry};
use crate::ecs::system::{Phase, System, SystemContext, SystemDescriptor};
use crate::foundation::error::TemporaResult;
use smallvec::{SmallVec, smallvec};

/// Resolves the objects of newly linked bound entities.
///
/// Spawned objects take precedence over the player's binding resolution. An unresolvable
/// binding yields no objects and is logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundObjectSystem;

impl System for BoundObjectSystem {
    fn name(&self) -> &'static str {
        "bound_objects"
    }

    fn phase(&self) -> Phase {
        Phase::Instantiation
    }

    fn describe(&self, registry: &ComponentRegistry) -> TemporaResult<SystemDescriptor> {
        let b = BuiltinComponents::lookup(registry)?;
        Ok(
            SystemDescriptor::relevant_to(BuiltinComponents::mask(&[b.object_binding]))
                .consuming(BuiltinComponents::mask(&[b.owner, b.object_binding]))
                .producing(BuiltinComponents::mask(&[b.bound_objects])),
        )
    }

    fn run(&self, cx: &mut SystemContext<'_>) -> TemporaResult<()> {
        let b = cx.builtins;
        let fresh = cx.store.query(
            BuiltinComponents::mask(&[b.object_binding, b.owner, b.needs_link]),
            BuiltinComponents::mask(&[b.needs_unlink]),
        );
        for e in fresh {
            let (Some(owner), Some(ObjectBinding(binding))) = (
                cx.store.get::<EntityOwner>(e),
                cx.store.get::<ObjectBinding>(e),
            ) else {
                continue;
            };
            let objects = match cx.spawns.get(owner.instance, binding) {
                Some(object) => smallvec![object],
                None => cx.player.resolve_bound_objects(binding, owner.sequence),
            };
            if objects.is_empty() {
                tracing::warn!(
                    binding = binding.0,
                    sequence = owner.sequence.0,
                    "unresolvable binding, entity contributes nothing"
                );
            }
            cx.store.insert(e, BoundObjects(objects))?;
        }
        Ok(())
    }
}

/// Assigns blend channels to property entities, releases them on unlink and keeps channel
/// ids dense.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlendChannelSystem;

impl System for BlendChannelSystem {
    fn name(&self) -> &'static str {
        "blend_channels"
    }

    fn phase(&self) -> Phase {
        Phase::Instantiation
    }

    fn describe(&self, registry: &ComponentRegistry) -> TemporaResult<SystemDescriptor> {
        let b = BuiltinComponents::lookup(registry)?;
        Ok(
            SystemDescriptor::relevant_to(BuiltinComponents::mask(&[b.property, b.blend_inputs]))
                .consuming(BuiltinComponents::mask(&[b.property, b.bound_objects]))
                .producing(BuiltinComponents::mask(&[b.blend_inputs])),
        )
    }

    fn run(&self, cx: &mut SystemContext<'_>) -> TemporaResult<()> {
        let b = cx.builtins;
        let gone = cx.store.query(
            BuiltinComponents::mask(&[b.blend_inputs, b.needs_unlink]),
            ComponentMask::EMPTY,
        );
        {
            let inputs = cx.store.read::<BlendInputs>()?;
            for e in &gone {
                for ch in inputs.get(*e).map_or(&[][..], |i| i.0.as_slice()) {
                    cx.blend.channels.release(*ch);
                }
            }
        }

        let fresh = cx.store.query(
            BuiltinComponents::mask(&[b.property, b.bound_objects, b.blend_inputs, b.needs_link]),
            BuiltinComponents::mask(&[b.needs_unlink]),
        );
        for e in fresh {
            let (Some(PropertyBinding(property)), Some(BoundObjects(objects))) = (
                cx.store.get::<PropertyBinding>(e),
                cx.store.get::<BoundObjects>(e),
            ) else {
                continue;
            };
            let requires_init = cx.store.has::<RequiresInit>(e);
            let mut channels = SmallVec::new();
            for object in objects {
                let target = BlendTarget {
                    object,
                    property: property.clone(),
                };
                let player = &mut *cx.player;
                let ch = cx
                    .blend
                    .channels
                    .acquire(target, || player.initial_value(object, &property));
                if requires_init {
                    let v = cx.player.initial_value(object, &property);
                    cx.blend.channels.recapture(ch, v);
                }
                channels.push(ch);
            }
            cx.store.set(e, BlendInputs(channels))?;
        }

        if cx.blend.channels.needs_compaction() {
            let remap = cx.blend.channels.compact();
            let mut inputs = cx.store.write::<BlendInputs>()?;
            for slot in inputs.slots_mut().iter_mut().flatten() {
                for ch in slot.0.iter_mut() {
                    if let Some(Some(new)) = remap.get(ch.index()) {
                        *ch = *new;
                    }
                }
            }
            tracing::debug!(channels = cx.blend.channels.len(), "blend channels compacted");
        }
        Ok(())
    }
}
