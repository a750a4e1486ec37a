use crate::ecs::components::{BoundObjects, BuiltinComponents, EntityOwner, EventTrigger, Triggered};
use crate::ecs::registry::ComponentRegistry;
use crate::ecs::system::{Phase, System, SystemContext, SystemDescriptor};
use crate::foundation::error::TemporaResult;
use crate::player::EventRecord;

/// Queues each linked event trigger once for dispatch after finalization.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventSystem;

impl System for EventSystem {
    fn name(&self) -> &'static str {
        "events"
    }

    fn phase(&self) -> Phase {
        Phase::Finalization
    }

    fn describe(&self, registry: &ComponentRegistry) -> TemporaResult<SystemDescriptor> {
        let b = BuiltinComponents::lookup(registry)?;
        Ok(
            SystemDescriptor::relevant_to(BuiltinComponents::mask(&[b.event, b.owner]))
                .consuming(BuiltinComponents::mask(&[b.event, b.owner, b.bound_objects])),
        )
    }

    fn run(&self, cx: &mut SystemContext<'_>) -> TemporaResult<()> {
        let b = cx.builtins;
        let fresh = cx.store.query(
            BuiltinComponents::mask(&[b.event, b.owner]),
            BuiltinComponents::mask(&[b.triggered, b.needs_unlink]),
        );
        let mut records = Vec::with_capacity(fresh.len());
        for e in fresh {
            let (Some(owner), Some(trigger)) = (
                cx.store.get::<EntityOwner>(e),
                cx.store.get::<EventTrigger>(e),
            ) else {
                continue;
            };
            records.push(EventRecord {
                instance: owner.instance,
                sequence: owner.sequence,
                name: trigger.name,
                frame: trigger.frame,
                objects: cx
                    .store
                    .get::<BoundObjects>(e)
                    .map(|o| o.0)
                    .unwrap_or_default(),
            });
            cx.store.add_tag::<Triggered>(e)?;
        }
        records.sort_by(|a, b| {
            (a.instance, a.sequence, a.frame)
                .cmp(&(b.instance, b.sequence, b.frame))
                .then_with(|| a.name.cmp(&b.name))
        });
        cx.events.extend(records);
        Ok(())
    }
}

/// Hands every blended value to the player.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertyOutputSystem;

impl System for PropertyOutputSystem {
    fn name(&self) -> &'static str {
        "property_output"
    }

    fn phase(&self) -> Phase {
        Phase::Finalization
    }

    fn describe(&self, registry: &ComponentRegistry) -> TemporaResult<SystemDescriptor> {
        let b = BuiltinComponents::lookup(registry)?;
        Ok(
            SystemDescriptor::relevant_to(BuiltinComponents::mask(&[b.blend_inputs]))
                .consuming(BuiltinComponents::mask(&[b.blend_inputs])),
        )
    }

    fn run(&self, cx: &mut SystemContext<'_>) -> TemporaResult<()> {
        for (target, value) in cx.blend.outputs() {
            cx.player.apply_property(target, value);
        }
        Ok(())
    }
}
