use crate::compile::data::{CompiledData, CompiledDataManager};
use crate::compile::field::FieldSegment;
use crate::compile::hierarchy::SequenceHierarchy;
use crate::ecs::components::{EntityOwner, NeedsLink, RequiresInit};
use crate::ecs::store::{EntityStore, ImportedEntity};
use crate::foundation::error::TemporaResult;
use crate::foundation::ids::{InstanceHandle, SequenceId};
use crate::foundation::time::TimeRange;
use crate::instance::context::EvaluationContext;
use crate::instance::ledger::LedgerDiff;
use crate::instance::registry::InstanceRegistry;
use crate::model::library::SequenceLibrary;
use crate::model::provider::ImportParams;
use std::collections::{BTreeMap, BTreeSet};

/// Borrowed linker state an update works on.
pub(crate) struct UpdateEnv<'a> {
    pub(crate) store: &'a mut EntityStore,
    pub(crate) instances: &'a mut InstanceRegistry,
    pub(crate) compiled: &'a mut CompiledDataManager,
    pub(crate) library: &'a SequenceLibrary,
}

/// What one update did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// The field query was served from the cached range.
    pub cache_hit: bool,
    /// Entities imported (persistent and one-shot).
    pub linked: usize,
    /// Entities scheduled for unlinking.
    pub unlinked: usize,
    /// Active sub-sequences after the update.
    pub active_sub_sequences: usize,
}

impl UpdateOutcome {
    fn add(&mut self, d: LedgerDiff) {
        self.linked += d.linked;
        self.unlinked += d.unlinked;
    }
}

/// Updater of a root sequence without sub-sequences.
#[derive(Debug, Clone, Default)]
pub struct FlatUpdater {
    cached_range: Option<TimeRange>,
}

/// Updater of a root sequence with nested sub-sequences.
#[derive(Debug, Clone, Default)]
pub struct HierarchicalUpdater {
    cached_range: Option<TimeRange>,
    active: BTreeSet<SequenceId>,
}

/// Queries the field for the current time and applies the entity diff to every ledger.
#[derive(Debug, Clone)]
pub enum SequenceUpdater {
    /// Root-only sequences.
    Flat(FlatUpdater),
    /// Sequences with sub-sequences.
    Hierarchical(HierarchicalUpdater),
}

impl SequenceUpdater {
    /// Variant suited to `hierarchy`.
    pub fn for_hierarchy(hierarchy: &SequenceHierarchy) -> Self {
        if hierarchy.is_empty() {
            Self::Flat(FlatUpdater::default())
        } else {
            Self::Hierarchical(HierarchicalUpdater::default())
        }
    }

    /// Range the last field query is valid for.
    pub fn cached_range(&self) -> Option<TimeRange> {
        match self {
            Self::Flat(f) => f.cached_range,
            Self::Hierarchical(h) => h.cached_range,
        }
    }

    /// Active sub-sequences.
    pub fn active(&self) -> Vec<SequenceId> {
        match self {
            Self::Flat(_) => Vec::new(),
            Self::Hierarchical(h) => h.active.iter().copied().collect(),
        }
    }

    /// Forget the cached query so the next update re-queries the field.
    pub fn invalidate(&mut self) {
        match self {
            Self::Flat(f) => f.cached_range = None,
            Self::Hierarchical(h) => {
                h.cached_range = None;
                h.active.clear();
            }
        }
    }

    fn set_cache(&mut self, range: Option<TimeRange>) {
        match self {
            Self::Flat(f) => f.cached_range = range,
            Self::Hierarchical(h) => h.cached_range = range,
        }
    }

    pub(crate) fn update(
        &mut self,
        root: InstanceHandle,
        ctx: &EvaluationContext,
        env: &mut UpdateEnv<'_>,
    ) -> TemporaResult<UpdateOutcome> {
        let UpdateEnv {
            store,
            instances,
            compiled,
            library,
        } = env;
        let data_id = instances.require(root)?.compiled;
        let frame = ctx.frame();
        let swept = ctx.swept();
        compiled.ensure_frame(library, data_id, frame)?;
        if compiled.require(data_id)?.has_one_shots {
            compiled.ensure_range(library, data_id, swept)?;
        }
        let data = compiled.require(data_id)?;

        if let Self::Flat(_) = self
            && !data.hierarchy.is_empty()
        {
            // Sub-sequences appeared in a lazily compiled range.
            *self = Self::Hierarchical(HierarchicalUpdater::default());
        }

        let mut outcome = UpdateOutcome {
            cache_hit: self.cached_range().is_some_and(|r| r.contains(frame)),
            ..UpdateOutcome::default()
        };

        if let Some(inst) = instances.get_mut(root) {
            inst.context = *ctx;
        }

        if !outcome.cache_hit {
            let (range, segments, active_now) = match data.field.find(frame) {
                Some((range, entry)) => (
                    Some(range),
                    group_by_sequence(entry.segments.iter().filter(|s| !s.one_shot)),
                    entry.active_sequences.iter().copied().collect::<BTreeSet<_>>(),
                ),
                None => (None, BTreeMap::new(), BTreeSet::new()),
            };
            self.set_cache(range);

            if let Self::Hierarchical(h) = self {
                for gone in h.active.difference(&active_now) {
                    if let Some(handle) = instances.sub_instance(root, *gone)
                        && let Some(inst) = instances.get_mut(handle)
                    {
                        outcome.unlinked += inst.ledger.unlink_all(store)?;
                        inst.finished = true;
                        tracing::debug!(sequence = gone.0, "sub-sequence deactivated");
                    }
                }
                h.active = active_now;
            }

            for (seq, handle) in self.targets(root, instances, data)? {
                let wanted = segments.get(&seq).map_or(&[][..], Vec::as_slice);
                let mut import = |seg: &FieldSegment| import_segment(data, handle, seg);
                let Some(inst) = instances.get_mut(handle) else {
                    continue;
                };
                outcome.add(inst.ledger.update_entities(store, wanted, &mut import)?);
            }
        }

        // Contexts of active sub-instances follow the root every update.
        for (seq, handle) in self.targets(root, instances, data)? {
            if seq.is_root() {
                continue;
            }
            let node = data.hierarchy.require(seq)?;
            let mut sub_ctx = ctx.transform(&node.root_to_sequence);
            sub_ctx.pre_roll = node.is_pre_roll(ctx.to);
            sub_ctx.post_roll = node.is_post_roll(ctx.to);
            if let Some(inst) = instances.get_mut(handle) {
                inst.context = sub_ctx;
                inst.finished = false;
            }
        }

        if data.has_one_shots {
            let mut one_shots: BTreeMap<SequenceId, Vec<FieldSegment>> = BTreeMap::new();
            for (_, entry) in data.field.overlapping(swept) {
                for s in entry.segments.iter().filter(|s| s.one_shot) {
                    one_shots.entry(s.sequence).or_default().push(*s);
                }
            }
            for (seq, handle) in self.targets(root, instances, data)? {
                let wanted = one_shots.get(&seq).map_or(&[][..], Vec::as_slice);
                let mut import = |seg: &FieldSegment| import_segment(data, handle, seg);
                let Some(inst) = instances.get_mut(handle) else {
                    continue;
                };
                outcome.add(inst.ledger.update_one_shots(store, wanted, &mut import)?);
            }
        }

        outcome.active_sub_sequences = self.active().len();
        Ok(outcome)
    }

    /// Root plus active sub-instances, creating sub-instances on first activation.
    fn targets(
        &self,
        root: InstanceHandle,
        instances: &mut InstanceRegistry,
        data: &CompiledData,
    ) -> TemporaResult<Vec<(SequenceId, InstanceHandle)>> {
        let mut out = vec![(SequenceId::ROOT, root)];
        if let Self::Hierarchical(h) = self {
            for seq in &h.active {
                data.hierarchy.require(*seq)?;
                out.push((*seq, instances.get_or_create_sub(root, *seq)?));
            }
        }
        Ok(out)
    }
}

fn group_by_sequence<'a>(
    segments: impl Iterator<Item = &'a FieldSegment>,
) -> BTreeMap<SequenceId, Vec<FieldSegment>> {
    let mut out: BTreeMap<SequenceId, Vec<FieldSegment>> = BTreeMap::new();
    for s in segments {
        out.entry(s.sequence).or_default().push(*s);
    }
    out
}

fn import_segment(
    data: &CompiledData,
    instance: InstanceHandle,
    seg: &FieldSegment,
) -> TemporaResult<Option<ImportedEntity>> {
    let Some(source) = data.source(seg.sequence) else {
        tracing::warn!(sequence = seg.sequence.0, "no source for compiled segment");
        return Ok(None);
    };
    let Some((track, section)) = source.section(seg.track, seg.section) else {
        tracing::warn!(
            track = seg.track.0,
            section = seg.section.0,
            "compiled segment no longer matches its source"
        );
        return Ok(None);
    };
    let mut bundle = ImportedEntity::new();
    section.payload.provider().import_entity(
        &ImportParams {
            instance,
            sequence: seg.sequence,
            track,
            section,
            entity_index: seg.entity_index,
            hierarchical_bias: seg.hierarchical_bias,
        },
        &mut bundle,
    )?;
    bundle
        .add(EntityOwner {
            instance,
            sequence: seg.sequence,
            track: seg.track,
            section: seg.section,
            entity_index: seg.entity_index,
        })
        .add_tag::<NeedsLink>();
    if seg.requires_init {
        bundle.add_tag::<RequiresInit>();
    }
    Ok(Some(bundle))
}

