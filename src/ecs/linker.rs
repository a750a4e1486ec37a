use crate::blend::results::BlendState;
use crate::compile::compiler::CompilerOpts;
use crate::compile::data::CompiledDataManager;
use crate::ecs::components::BuiltinComponents;
use crate::ecs::registry::ComponentRegistry;
use crate::ecs::store::EntityStore;
use crate::ecs::system::{System, SystemGraph};
use crate::foundation::error::TemporaResult;
use crate::foundation::ids::InstanceHandle;
use crate::instance::registry::InstanceRegistry;
use crate::instance::updater::{SequenceUpdater, UpdateEnv};
use crate::model::library::SequenceLibrary;
use crate::model::sequence::SequenceKey;
use crate::player::{EventRecord, SpawnRegister};
use crate::systems;
use crate::view::LinkerView;
use std::sync::Arc;

/// Entity store, systems and sequence instances of one player.
///
/// Created by [`crate::Runtime::create_linker`] and driven by a [`crate::Runner`].
#[derive(Debug)]
pub struct Linker {
    pub(crate) builtins: BuiltinComponents,
    pub(crate) store: EntityStore,
    pub(crate) systems: SystemGraph,
    pub(crate) instances: InstanceRegistry,
    pub(crate) compiled: CompiledDataManager,
    pub(crate) library: Arc<SequenceLibrary>,
    pub(crate) blend: BlendState,
    pub(crate) spawns: SpawnRegister,
    pub(crate) events: Vec<EventRecord>,
    pub(crate) evaluating: bool,
    pub(crate) open_windows: u32,
    pub(crate) pending_structural: bool,
}

impl Linker {
    pub(crate) fn new(
        registry: Arc<ComponentRegistry>,
        builtins: BuiltinComponents,
        library: Arc<SequenceLibrary>,
        opts: CompilerOpts,
    ) -> TemporaResult<Self> {
        opts.validate()?;
        let mut systems = SystemGraph::default();
        for system in systems::builtin() {
            systems.add(system, &registry)?;
        }
        Ok(Self {
            builtins,
            store: EntityStore::new(registry),
            systems,
            instances: InstanceRegistry::default(),
            compiled: CompiledDataManager::new(opts),
            library,
            blend: BlendState::default(),
            spawns: SpawnRegister::default(),
            events: Vec::new(),
            evaluating: false,
            open_windows: 0,
            pending_structural: false,
        })
    }

    /// Register a host system next to the built-in ones.
    pub fn add_system(&mut self, system: Arc<dyn System>) -> TemporaResult<()> {
        self.systems.add(system, self.store.registry())
    }

    /// Create a root instance of `key`, compiling it on first use. The instance starts finished
    /// and begins evaluating on its first queued update.
    pub fn play(&mut self, key: &SequenceKey) -> TemporaResult<InstanceHandle> {
        let id = self.compiled.get_or_compile(&self.library, key)?;
        let data = self.compiled.require(id)?;
        let updater = SequenceUpdater::for_hierarchy(&data.hierarchy);
        let handle = self.instances.allocate_root(id, data.generation(), updater, data.is_volatile());
        tracing::debug!(root = %key.0, instance = handle.0, "root instance allocated");
        Ok(handle)
    }

    /// Drop a root instance and its sub-instances; their entities are released at the next flush.
    pub fn destroy(&mut self, root: InstanceHandle) -> TemporaResult<()> {
        self.instances.destroy_root(root, &mut self.store)?;
        self.pending_structural = true;
        Ok(())
    }

    /// Entity store.
    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Registered systems.
    pub fn systems(&self) -> &SystemGraph {
        &self.systems
    }

    /// Live instances.
    pub fn instances(&self) -> &InstanceRegistry {
        &self.instances
    }

    /// Compiled data cache.
    pub fn compiled(&self) -> &CompiledDataManager {
        &self.compiled
    }

    /// Blend channels and the results of the last evaluation.
    pub fn blend(&self) -> &BlendState {
        &self.blend
    }

    /// Source library.
    pub fn library(&self) -> &Arc<SequenceLibrary> {
        &self.library
    }

    /// Objects spawned for spawnable bindings.
    pub fn spawns(&self) -> &SpawnRegister {
        &self.spawns
    }

    /// Ids of the built-in component types.
    pub fn builtins(&self) -> BuiltinComponents {
        self.builtins
    }

    /// Return `true` while a runner is evaluating this linker.
    pub fn is_evaluating(&self) -> bool {
        self.evaluating
    }

    /// Read-only view for renderers and inspection tools.
    pub fn view(&self) -> LinkerView<'_> {
        LinkerView::new(self)
    }

    pub(crate) fn update_env(&mut self) -> UpdateEnv<'_> {
        UpdateEnv {
            store: &mut self.store,
            instances: &mut self.instances,
            compiled: &mut self.compiled,
            library: &self.library,
        }
    }
}
