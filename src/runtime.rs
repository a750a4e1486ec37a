use crate::compile::compiler::CompilerOpts;
use crate::ecs::components::BuiltinComponents;
use crate::ecs::linker::Linker;
use crate::ecs::registry::{Component, ComponentRegistry, ComponentTypeId};
use crate::foundation::error::TemporaResult;
use crate::model::library::SequenceLibrary;
use std::sync::Arc;

/// Builder registering host component types before the registry is frozen.
#[derive(Debug)]
pub struct RuntimeBuilder {
    registry: ComponentRegistry,
    builtins: BuiltinComponents,
}

impl RuntimeBuilder {
    /// Register a host value component.
    pub fn component<T: Component>(&mut self, name: &'static str) -> TemporaResult<ComponentTypeId> {
        self.registry.register::<T>(name)
    }

    /// Register a host tag component.
    pub fn tag<T: Component>(&mut self, name: &'static str) -> TemporaResult<ComponentTypeId> {
        self.registry.register_tag::<T>(name)
    }

    /// Freeze the registry.
    pub fn build(self) -> Runtime {
        tracing::debug!(components = self.registry.len(), "runtime initialized");
        Runtime {
            registry: Arc::new(self.registry),
            builtins: self.builtins,
        }
    }
}

/// Process-wide evaluation state with an explicit init/shutdown lifecycle.
///
/// Owns the frozen component registry every linker's store is built from.
#[derive(Debug)]
pub struct Runtime {
    registry: Arc<ComponentRegistry>,
    builtins: BuiltinComponents,
}

impl Runtime {
    /// Builder with the built-in component types registered.
    pub fn builder() -> TemporaResult<RuntimeBuilder> {
        let mut registry = ComponentRegistry::default();
        let builtins = BuiltinComponents::register(&mut registry)?;
        Ok(RuntimeBuilder { registry, builtins })
    }

    /// Runtime with built-in component types only.
    pub fn init() -> TemporaResult<Self> {
        Ok(Self::builder()?.build())
    }

    /// Frozen component registry.
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Ids of the built-in component types.
    pub fn builtins(&self) -> BuiltinComponents {
        self.builtins
    }

    /// New linker over `library` with the built-in systems registered.
    pub fn create_linker(&self, library: Arc<SequenceLibrary>, opts: CompilerOpts) -> TemporaResult<Linker> {
        Linker::new(Arc::clone(&self.registry), self.builtins, library, opts)
    }

    /// Tear the runtime down. Linkers created from it stay usable until dropped.
    pub fn shutdown(self) {
        let linkers = Arc::strong_count(&self.registry) - 1;
        if linkers > 0 {
            tracing::debug!(linkers, "runtime shut down with live linkers");
        } else {
            tracing::debug!("runtime shut down");
        }
    }
}
