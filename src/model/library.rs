use crate::foundation::error::TemporaResult;
use crate::model::sequence::{Sequence, SequenceKey};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Thread-safe sequence asset store.
///
/// Readers get an `Arc` snapshot; replacing an asset never mutates a snapshot already handed
/// out, so compiled data keeps evaluating the source it was built from until it is found stale.
#[derive(Debug, Default)]
pub struct SequenceLibrary {
    inner: RwLock<BTreeMap<SequenceKey, Arc<Sequence>>>,
}

impl SequenceLibrary {
    /// Empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and insert (or replace) a sequence, returning the previous snapshot.
    pub fn insert(&self, key: SequenceKey, sequence: Sequence) -> TemporaResult<Option<Arc<Sequence>>> {
        sequence.validate()?;
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        Ok(map.insert(key, Arc::new(sequence)))
    }

    /// Parse, validate and insert a sequence from JSON.
    pub fn insert_json(&self, key: SequenceKey, json: &str) -> TemporaResult<()> {
        self.insert(key, Sequence::from_json(json)?)?;
        Ok(())
    }

    /// Current snapshot of a sequence.
    pub fn get(&self, key: &SequenceKey) -> Option<Arc<Sequence>> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.get(key).cloned()
    }

    /// Remove a sequence.
    pub fn remove(&self, key: &SequenceKey) -> Option<Arc<Sequence>> {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.remove(key)
    }

    /// Apply an in-place edit to a stored sequence (copy-on-write).
    pub fn edit(&self, key: &SequenceKey, f: impl FnOnce(&mut Sequence)) -> TemporaResult<bool> {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let Some(current) = map.get(key) else {
            return Ok(false);
        };
        let mut next = Sequence::clone(current);
        f(&mut next);
        next.validate()?;
        map.insert(key.clone(), Arc::new(next));
        Ok(true)
    }

    /// Keys in order.
    pub fn keys(&self) -> Vec<SequenceKey> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.keys().cloned().collect()
    }
}
