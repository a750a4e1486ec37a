use serde::{Deserialize, Serialize};

/// Generation-checked entity handle.
///
/// The index addresses a slot in every component column; the generation detects reuse of a
/// freed slot by a newer entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl EntityId {
    /// Slot index.
    pub fn index(self) -> usize {
        self.index as usize
    }

    /// Slot generation.
    pub fn generation(self) -> u32 {
        self.generation
    }
}

#[derive(Debug, Default)]
pub(crate) struct EntityAllocator {
    generations: Vec<u32>,
    alive: Vec<bool>,
    free: Vec<u32>,
    live: usize,
}

impl EntityAllocator {
    pub(crate) fn allocate(&mut self) -> EntityId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let i = index as usize;
            self.alive[i] = true;
            return EntityId {
                index,
                generation: self.generations[i],
            };
        }
        let index = self.generations.len() as u32;
        self.generations.push(0);
        self.alive.push(true);
        EntityId {
            index,
            generation: 0,
        }
    }

    pub(crate) fn free(&mut self, e: EntityId) -> bool {
        if !self.is_alive(e) {
            return false;
        }
        let i = e.index();
        self.alive[i] = false;
        self.generations[i] = self.generations[i].wrapping_add(1);
        self.free.push(e.index);
        self.live -= 1;
        true
    }

    pub(crate) fn is_alive(&self, e: EntityId) -> bool {
        let i = e.index();
        i < self.alive.len() && self.alive[i] && self.generations[i] == e.generation
    }

    /// Live handle occupying `index`, if any.
    pub(crate) fn at(&self, index: usize) -> Option<EntityId> {
        (index < self.alive.len() && self.alive[index]).then(|| EntityId {
            index: index as u32,
            generation: self.generations[index],
        })
    }

    /// Reuse the lowest free slots first.
    pub(crate) fn sort_free(&mut self) {
        self.free.sort_unstable_by(|a, b| b.cmp(a));
    }

    pub(crate) fn capacity(&self) -> usize {
        self.generations.len()
    }

    pub(crate) fn live(&self) -> usize {
        self.live
    }
}
