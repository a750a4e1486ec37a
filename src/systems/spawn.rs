use crate::ecs::components::{BuiltinComponents, EntityOwner, SpawnableBinding};
use crate::ecs::registry::{ComponentMask, ComponentRegistry};
use crate::ecs::system::{Phase, System, SystemContext, SystemDescriptor};
use crate::foundation::error::TemporaResult;

/// Keeps bound objects of spawn sections alive while their entities are linked.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpawnableSystem;

impl System for SpawnableSystem {
    fn name(&self) -> &'static str {
        "spawnables"
    }

    fn phase(&self) -> Phase {
        Phase::Spawn
    }

    fn describe(&self, registry: &ComponentRegistry) -> TemporaResult<SystemDescriptor> {
        let b = BuiltinComponents::lookup(registry)?;
        Ok(SystemDescriptor::relevant_to(BuiltinComponents::mask(&[b.spawnable]))
            .consuming(BuiltinComponents::mask(&[b.owner, b.spawnable])))
    }

    fn run(&self, cx: &mut SystemContext<'_>) -> TemporaResult<()> {
        let b = cx.builtins;
        let gone = cx.store.query(
            BuiltinComponents::mask(&[b.spawnable, b.owner, b.needs_unlink]),
            ComponentMask::EMPTY,
        );
        for e in gone {
            let (Some(owner), Some(spawn)) = (
                cx.store.get::<EntityOwner>(e),
                cx.store.get::<SpawnableBinding>(e),
            ) else {
                continue;
            };
            if let Some(object) = cx.spawns.remove(owner.instance, spawn.binding) {
                cx.player.destroy_object(object);
            }
        }

        let fresh = cx.store.query(
            BuiltinComponents::mask(&[b.spawnable, b.owner, b.needs_link]),
            BuiltinComponents::mask(&[b.needs_unlink]),
        );
        for e in fresh {
            let (Some(owner), Some(spawn)) = (
                cx.store.get::<EntityOwner>(e),
                cx.store.get::<SpawnableBinding>(e),
            ) else {
                continue;
            };
            if cx.spawns.get(owner.instance, spawn.binding).is_some() {
                continue;
            }
            match cx
                .player
                .spawn_object(spawn.binding, &spawn.template, owner.instance)
            {
                Some(object) => cx.spawns.insert(owner.instance, spawn.binding, object),
                None => tracing::warn!(
                    binding = spawn.binding.0,
                    template = %spawn.template,
                    "player could not spawn object"
                ),
            }
        }
        Ok(())
    }
}
