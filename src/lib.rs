//! Tempora compiles hierarchical timelines and evaluates them on an entity-component runtime.
//!
//! - Author [`Sequence`]s (tracks, sections, nested [`SubSection`]s) into a [`SequenceLibrary`]
//! - The [`Compiler`] flattens a root and its sub-sequences into an [`EvaluationField`]
//! - A [`Linker`] created from a [`Runtime`] instantiates entities for the current time, and a
//!   [`Runner`] drives them through Spawn, Instantiation, Evaluation and Finalization
//! - Property contributions are combined per channel by the [`PiecewiseBlender`]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub(crate) mod blend;
pub(crate) mod compile;
pub(crate) mod consumer;
pub(crate) mod ecs;
mod foundation;
pub(crate) mod instance;
pub(crate) mod model;
/// Host-side player contracts.
pub mod player;
mod runtime;
/// Built-in evaluation systems.
pub mod systems;
/// Read-only consumer views.
pub mod view;

pub use crate::foundation::error::{TemporaError, TemporaResult};
pub use crate::foundation::hash::Signature;
pub use crate::foundation::ids::{
    InstanceHandle, ObjectKey, SectionId, SequenceId, SubSectionId, TrackId,
};
pub use crate::foundation::time::{FrameNumber, FrameTime, TimeRange};
pub use crate::foundation::transform::{LinearTransform, TimeTransform, TimeWarp};

pub use crate::model::library::SequenceLibrary;
pub use crate::model::provider::{EntityProvider, ImportParams, ProvidedEntity};
pub use crate::model::sequence::{
    BindingId, BlendKind, Curve, CurveKey, EventKey, EventSection, PropertySection, Section,
    SectionPayload, Sequence, SequenceKey, SpawnSection, SubSection, Track,
};

pub use crate::compile::compiler::{CompileReport, Compiler, CompilerOpts};
pub use crate::compile::data::{CompiledData, CompiledDataId, CompiledDataManager};
pub use crate::compile::field::{EvaluationField, FieldEntry, FieldSegment};
pub use crate::compile::hierarchy::{SequenceHierarchy, SequenceHierarchyNode};

pub use crate::ecs::components::{
    BaseValueTime, BlendInputs, BoundObjects, BuiltinComponents, Easing, EntityOwner, EvalTime,
    EvaluatedValue, EventTrigger, FloatCurve, HierarchicalBias, NeedsLink, NeedsUnlink,
    ObjectBinding, OneShot, PropertyBinding, RequiresInit, SpawnableBinding, Triggered, Weight,
};
pub use crate::ecs::entity::EntityId;
pub use crate::ecs::linker::Linker;
pub use crate::ecs::registry::{Component, ComponentMask, ComponentRegistry, ComponentTypeId, MaskBuilder};
pub use crate::ecs::runner::{EventScope, FlushReport, Runner, RunnerOpts, RunnerState};
pub use crate::ecs::store::{ColumnMut, ColumnRef, EntityStore, ImportedEntity};
pub use crate::ecs::system::{Phase, System, SystemContext, SystemDescriptor, SystemGraph};

pub use crate::instance::context::{EvaluationContext, PlayDirection, PlaybackStatus};
pub use crate::instance::ledger::{EntityKey, EntityLedger, LedgerDiff};
pub use crate::instance::registry::{InstanceRegistry, SequenceInstance};
pub use crate::instance::updater::{FlatUpdater, HierarchicalUpdater, SequenceUpdater, UpdateOutcome};
pub use crate::instance::volatility::VolatilityManager;

pub use crate::blend::accumulator::{ChannelAccumulator, PiecewiseBlender, WeightedSum};
pub use crate::blend::channel::{BlendChannel, BlendChannelAllocator, BlendTarget};
pub use crate::blend::decompose::{Contribution, Decomposition, DecompositionQuery, decompose};
pub use crate::blend::results::BlendState;

pub use crate::consumer::trail::{CacheState, Trail, TrailKind, TrailScene, update_trail};
pub use crate::player::{EventRecord, PlaybackContext, SpawnRegister};
pub use crate::runtime::{Runtime, RuntimeBuilder};
pub use crate::view::{InstanceNode, LinkerView};
