use crate::compile::field::FieldSegment;
use crate::ecs::components::NeedsUnlink;
use crate::ecs::entity::EntityId;
use crate::ecs::store::{EntityStore, ImportedEntity};
use crate::foundation::error::TemporaResult;
use crate::foundation::ids::{SectionId, SequenceId, TrackId};
use std::collections::{BTreeMap, BTreeSet};

/// Source key of a field-provided entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    /// Sequence node that compiled the entity.
    pub sequence: SequenceId,
    /// Source track.
    pub track: TrackId,
    /// Source section.
    pub section: SectionId,
    /// Provider-local index.
    pub entity_index: u32,
}

impl From<&FieldSegment> for EntityKey {
    fn from(s: &FieldSegment) -> Self {
        Self {
            sequence: s.sequence,
            track: s.track,
            section: s.section,
            entity_index: s.entity_index,
        }
    }
}

/// Counts of one ledger update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerDiff {
    /// Entities imported.
    pub linked: usize,
    /// Entities scheduled for unlinking.
    pub unlinked: usize,
}

/// Importer used by ledger updates; `Ok(None)` skips the segment.
pub type Importer<'a> = dyn FnMut(&FieldSegment) -> TemporaResult<Option<ImportedEntity>> + 'a;

/// Per-instance mapping from entity keys to live entities; at most one entity per key.
#[derive(Debug, Default)]
pub struct EntityLedger {
    entities: BTreeMap<EntityKey, EntityId>,
    one_shots: BTreeMap<EntityKey, EntityId>,
}

fn unlink(store: &mut EntityStore, e: EntityId) -> TemporaResult<()> {
    if store.contains(e) && !store.has::<NeedsUnlink>(e) {
        // Removal happens at the next instantiation pass.
        store.add_tag::<NeedsUnlink>(e)?;
    }
    Ok(())
}

impl EntityLedger {
    /// Diff persistent entities against `wanted`: unlink the missing, import the new.
    /// One-shot segments in `wanted` are ignored.
    pub fn update_entities(
        &mut self,
        store: &mut EntityStore,
        wanted: &[FieldSegment],
        import: &mut Importer<'_>,
    ) -> TemporaResult<LedgerDiff> {
        let mut diff = LedgerDiff::default();
        let keep: BTreeSet<EntityKey> = wanted
            .iter()
            .filter(|s| !s.one_shot)
            .map(EntityKey::from)
            .collect();
        let stale: Vec<EntityKey> = self.entities.keys().filter(|k| !keep.contains(k)).copied().collect();
        for key in stale {
            if let Some(e) = self.entities.remove(&key) {
                unlink(store, e)?;
                diff.unlinked += 1;
            }
        }
        for seg in wanted.iter().filter(|s| !s.one_shot) {
            let key = EntityKey::from(seg);
            if self.entities.contains_key(&key) {
                continue;
            }
            if let Some(bundle) = import(seg)? {
                let e = store.spawn(bundle)?;
                self.entities.insert(key, e);
                diff.linked += 1;
            }
        }
        Ok(diff)
    }

    /// Replace last update's one-shots with `wanted` (one-shot segments only).
    pub fn update_one_shots(
        &mut self,
        store: &mut EntityStore,
        wanted: &[FieldSegment],
        import: &mut Importer<'_>,
    ) -> TemporaResult<LedgerDiff> {
        let mut diff = LedgerDiff {
            unlinked: self.unlink_one_shots(store)?,
            ..LedgerDiff::default()
        };
        for seg in wanted.iter().filter(|s| s.one_shot) {
            let key = EntityKey::from(seg);
            if self.one_shots.contains_key(&key) {
                continue;
            }
            if let Some(bundle) = import(seg)? {
                let e = store.spawn(bundle)?;
                self.one_shots.insert(key, e);
                diff.linked += 1;
            }
        }
        Ok(diff)
    }

    /// Unlink the one-shots of the previous update.
    pub fn unlink_one_shots(&mut self, store: &mut EntityStore) -> TemporaResult<usize> {
        let n = self.one_shots.len();
        for e in std::mem::take(&mut self.one_shots).into_values() {
            unlink(store, e)?;
        }
        Ok(n)
    }

    /// Unlink everything.
    pub fn unlink_all(&mut self, store: &mut EntityStore) -> TemporaResult<usize> {
        let mut n = self.unlink_one_shots(store)?;
        n += self.entities.len();
        for e in std::mem::take(&mut self.entities).into_values() {
            unlink(store, e)?;
        }
        Ok(n)
    }

    /// Live entity of a key.
    pub fn get(&self, key: &EntityKey) -> Option<EntityId> {
        self.entities
            .get(key)
            .or_else(|| self.one_shots.get(key))
            .copied()
    }

    /// Persistent keys, ascending.
    pub fn keys(&self) -> impl Iterator<Item = &EntityKey> {
        self.entities.keys()
    }

    /// Every mapped entity (persistent then one-shot).
    pub fn iter(&self) -> impl Iterator<Item = (&EntityKey, &EntityId)> {
        self.entities.iter().chain(self.one_shots.iter())
    }

    /// Number of mapped entities.
    pub fn len(&self) -> usize {
        self.entities.len() + self.one_shots.len()
    }

    /// Return `true` when nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "../../tests/unit/instance/ledger.rs"]
mod tests;
