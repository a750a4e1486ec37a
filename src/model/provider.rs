use crate::ecs::components::{
    BaseValueTime, BlendInputs, Easing, EvalTime, EvaluatedValue, EventTrigger, FloatCurve,
    HierarchicalBias, ObjectBinding, OneShot, PropertyBinding, SpawnableBinding, Weight,
};
use crate::ecs::store::ImportedEntity;
use crate::foundation::error::{TemporaError, TemporaResult};
use crate::foundation::ids::{InstanceHandle, SequenceId};
use crate::foundation::time::{FrameNumber, FrameTime, TimeRange};
use crate::model::sequence::{
    BlendKind, EventSection, PropertySection, Section, SectionPayload, SpawnSection, Track,
};
use std::sync::Arc;

/// One entity a section wants alive over `range` (sequence-local time).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvidedEntity {
    /// Local range in which the entity exists.
    pub range: TimeRange,
    /// Provider-local index, stable across compiles.
    pub entity_index: u32,
    /// Lives for a single update and is re-queried every frame.
    pub one_shot: bool,
    /// Needs an initialization pass when linked.
    pub requires_init: bool,
}

/// Inputs to [`EntityProvider::import_entity`].
#[derive(Debug, Clone, Copy)]
pub struct ImportParams<'a> {
    /// Instance the entity is linked into.
    pub instance: InstanceHandle,
    /// Sequence node that compiled the entity.
    pub sequence: SequenceId,
    /// Source track.
    pub track: &'a Track,
    /// Source section.
    pub section: &'a Section,
    /// Provider-local entity index.
    pub entity_index: u32,
    /// Accumulated hierarchical bias of the sequence node.
    pub hierarchical_bias: i32,
}

/// Supplies entities to the compiler and the ledger without the core knowing the concrete kind.
pub trait EntityProvider {
    /// Append the entities this section provides within `effective` (already clipped local time).
    fn populate_evaluation_field(
        &self,
        track: &Track,
        section: &Section,
        effective: TimeRange,
        out: &mut Vec<ProvidedEntity>,
    );

    /// Fill the component bundle of one entity.
    fn import_entity(&self, params: &ImportParams<'_>, out: &mut ImportedEntity) -> TemporaResult<()>;

    /// Local frames at which evaluation must be split.
    fn determinism_fences(&self, _section: &Section, _out: &mut Vec<FrameNumber>) {}
}

impl SectionPayload {
    /// Provider implementation of this payload kind.
    pub fn provider(&self) -> &dyn EntityProvider {
        match self {
            Self::Property(p) => p,
            Self::Event(e) => e,
            Self::Spawn(s) => s,
        }
    }
}

impl EntityProvider for PropertySection {
    fn populate_evaluation_field(
        &self,
        track: &Track,
        section: &Section,
        effective: TimeRange,
        out: &mut Vec<ProvidedEntity>,
    ) {
        if track.binding.is_none() {
            tracing::debug!(track = track.id.0, "property track has no binding, no entities");
            return;
        }
        out.push(ProvidedEntity {
            range: effective,
            entity_index: 0,
            one_shot: false,
            requires_init: section.requires_init,
        });
    }

    fn import_entity(&self, params: &ImportParams<'_>, out: &mut ImportedEntity) -> TemporaResult<()> {
        let binding = params.track.binding.ok_or_else(|| {
            TemporaError::validation(format!("track {} has no binding", params.track.id.0))
        })?;
        let section = params.section;
        out.add(ObjectBinding(binding))
            .add(PropertyBinding(Arc::from(self.property.as_str())))
            .add(FloatCurve(Arc::new(self.curve.clone())))
            .add(section.blend)
            .add(Easing {
                range: section.range,
                ease_in: section.ease_in,
                ease_out: section.ease_out,
            })
            .add(HierarchicalBias(params.hierarchical_bias))
            .add(EvalTime::default())
            .add(Weight::default())
            .add(EvaluatedValue::default())
            .add(BlendInputs::default());
        if section.blend == BlendKind::AdditiveFromBase {
            let base = self
                .base_time
                .or(section.range.start)
                .unwrap_or(FrameNumber(0));
            out.add(BaseValueTime(FrameTime::from(base)));
        }
        Ok(())
    }
}

impl EntityProvider for EventSection {
    fn populate_evaluation_field(
        &self,
        _track: &Track,
        section: &Section,
        effective: TimeRange,
        out: &mut Vec<ProvidedEntity>,
    ) {
        for (i, key) in self.keys.iter().enumerate() {
            if !effective.contains(key.frame) {
                continue;
            }
            out.push(ProvidedEntity {
                range: TimeRange::frame(key.frame),
                entity_index: i as u32,
                one_shot: true,
                requires_init: section.requires_init,
            });
        }
    }

    fn import_entity(&self, params: &ImportParams<'_>, out: &mut ImportedEntity) -> TemporaResult<()> {
        let key = self.keys.get(params.entity_index as usize).ok_or_else(|| {
            TemporaError::validation(format!(
                "event section {} has no key {}",
                params.section.id.0, params.entity_index
            ))
        })?;
        out.add(EventTrigger {
            name: Arc::from(key.name.as_str()),
            frame: key.frame,
        })
        .add_tag::<OneShot>();
        if let Some(binding) = params.track.binding {
            out.add(ObjectBinding(binding));
        }
        Ok(())
    }

    fn determinism_fences(&self, section: &Section, out: &mut Vec<FrameNumber>) {
        out.extend(
            self.keys
                .iter()
                .map(|k| k.frame)
                .filter(|f| section.range.contains(*f)),
        );
    }
}

impl EntityProvider for SpawnSection {
    fn populate_evaluation_field(
        &self,
        track: &Track,
        section: &Section,
        effective: TimeRange,
        out: &mut Vec<ProvidedEntity>,
    ) {
        if track.binding.is_none() {
            tracing::debug!(track = track.id.0, "spawn track has no binding, no entities");
            return;
        }
        out.push(ProvidedEntity {
            range: effective,
            entity_index: 0,
            one_shot: false,
            requires_init: section.requires_init,
        });
    }

    fn import_entity(&self, params: &ImportParams<'_>, out: &mut ImportedEntity) -> TemporaResult<()> {
        let binding = params.track.binding.ok_or_else(|| {
            TemporaError::validation(format!("track {} has no binding", params.track.id.0))
        })?;
        out.add(SpawnableBinding {
            binding,
            template: Arc::from(self.template.as_str()),
        });
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/model/provider.rs"]
mod tests;
