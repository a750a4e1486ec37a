use crate::foundation::ids::ObjectKey;
use std::collections::HashMap;
use std::sync::Arc;

/// Handle grouping every contributor to one property of one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlendChannel(pub u32);

impl BlendChannel {
    /// Dense index.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Target of a blend channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlendTarget {
    /// Animated object.
    pub object: ObjectKey,
    /// Animated property.
    pub property: Arc<str>,
}

#[derive(Debug, Clone)]
struct ChannelSlot {
    target: BlendTarget,
    initial: f64,
    refs: u32,
}

/// Allocates channels per target, captures initial values and compacts released ids.
#[derive(Debug, Default)]
pub struct BlendChannelAllocator {
    by_target: HashMap<BlendTarget, BlendChannel>,
    slots: Vec<Option<ChannelSlot>>,
    version: u64,
}

impl BlendChannelAllocator {
    /// Channel of `target`, allocated on first use with `initial()` as its base value.
    pub fn acquire(&mut self, target: BlendTarget, initial: impl FnOnce() -> f64) -> BlendChannel {
        if let Some(ch) = self.by_target.get(&target) {
            if let Some(slot) = self.slots[ch.index()].as_mut() {
                slot.refs += 1;
            }
            return *ch;
        }
        let slot = ChannelSlot {
            target: target.clone(),
            initial: initial(),
            refs: 1,
        };
        let ch = match self.slots.iter().position(Option::is_none) {
            Some(i) => {
                self.slots[i] = Some(slot);
                BlendChannel(i as u32)
            }
            None => {
                self.slots.push(Some(slot));
                BlendChannel(self.slots.len() as u32 - 1)
            }
        };
        self.by_target.insert(target, ch);
        self.version += 1;
        ch
    }

    /// Drop one reference. Returns `true` when the channel was freed.
    pub fn release(&mut self, ch: BlendChannel) -> bool {
        let Some(slot) = self.slots.get_mut(ch.index()).and_then(Option::as_mut) else {
            return false;
        };
        slot.refs = slot.refs.saturating_sub(1);
        if slot.refs > 0 {
            return false;
        }
        let target = slot.target.clone();
        self.slots[ch.index()] = None;
        self.by_target.remove(&target);
        self.version += 1;
        true
    }

    /// Return `true` when released ids left holes.
    pub fn needs_compaction(&self) -> bool {
        self.slots.iter().any(Option::is_none)
    }

    /// Renumber live channels densely. `remap[old]` is the new id, `None` for freed ids.
    pub fn compact(&mut self) -> Vec<Option<BlendChannel>> {
        let mut remap = Vec::with_capacity(self.slots.len());
        let mut next = 0u32;
        for slot in &self.slots {
            if slot.is_some() {
                remap.push(Some(BlendChannel(next)));
                next += 1;
            } else {
                remap.push(None);
            }
        }
        self.slots.retain(Option::is_some);
        for ch in self.by_target.values_mut() {
            if let Some(Some(new)) = remap.get(ch.index()) {
                *ch = *new;
            }
        }
        self.version += 1;
        remap
    }

    /// Replace the captured initial value.
    pub fn recapture(&mut self, ch: BlendChannel, initial: f64) {
        if let Some(slot) = self.slots.get_mut(ch.index()).and_then(Option::as_mut) {
            slot.initial = initial;
        }
    }

    /// Captured initial value.
    pub fn initial(&self, ch: BlendChannel) -> Option<f64> {
        self.slots.get(ch.index())?.as_ref().map(|s| s.initial)
    }

    /// Target of a channel.
    pub fn target(&self, ch: BlendChannel) -> Option<&BlendTarget> {
        self.slots.get(ch.index())?.as_ref().map(|s| &s.target)
    }

    /// Channel currently assigned to `target`.
    pub fn channel_of(&self, target: &BlendTarget) -> Option<BlendChannel> {
        self.by_target.get(target).copied()
    }

    /// Number of channel ids (live or freed-but-not-compacted).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Return `true` when no channel id exists.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Bumped whenever the set of channels changes.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Live channels with their targets.
    pub fn iter(&self) -> impl Iterator<Item = (BlendChannel, &BlendTarget)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|s| (BlendChannel(i as u32), &s.target)))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/blend/channel.rs"]
mod tests;
