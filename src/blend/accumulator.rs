use crate::blend::channel::BlendChannel;
use crate::model::sequence::BlendKind;

/// Weighted sum of one blend category.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WeightedSum {
    /// Sum of `value * weight`.
    pub total: f64,
    /// Sum of weights.
    pub weight: f64,
}

impl WeightedSum {
    fn add(&mut self, value: f64, weight: f64) {
        self.total += value * weight;
        self.weight += weight;
    }
}

/// The four accumulation buckets of one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChannelAccumulator {
    /// Absolute contributors.
    pub absolute: WeightedSum,
    /// Relative contributors (offsets from the initial value).
    pub relative: WeightedSum,
    /// Additive contributors.
    pub additive: WeightedSum,
    /// Additive-from-base contributors (already relative to their base time).
    pub additive_from_base: WeightedSum,
}

impl ChannelAccumulator {
    /// Add one contribution.
    pub fn accumulate(&mut self, kind: BlendKind, value: f64, weight: f64) {
        match kind {
            BlendKind::Absolute => self.absolute.add(value, weight),
            BlendKind::Relative => self.relative.add(value, weight),
            BlendKind::Additive => self.additive.add(value, weight),
            BlendKind::AdditiveFromBase => self.additive_from_base.add(value, weight),
        }
    }

    /// Final value on top of `initial`.
    ///
    /// Absolute and relative contributions are normalized by their total weight; when that
    /// weight is below one the initial value fills the remainder. Additive buckets are added
    /// on top unconditionally. With no contributors the result is exactly `initial`.
    pub fn combine(&self, initial: f64) -> f64 {
        let w = self.absolute.weight + self.relative.weight;
        let base = if w > 0.0 {
            let sum = self.absolute.total + self.relative.total + self.relative.weight * initial;
            if w < 1.0 {
                sum + initial * (1.0 - w)
            } else {
                sum / w
            }
        } else {
            initial
        };
        base + self.additive.total + self.additive_from_base.total
    }

    /// Return `true` when nothing was accumulated.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Per-channel accumulation buffers, reset every evaluation.
///
/// Buffers are resized and zeroed when the channel layout version changes and only zeroed
/// otherwise.
#[derive(Debug, Default)]
pub struct PiecewiseBlender {
    channels: Vec<ChannelAccumulator>,
    layout_version: Option<(u64, u64)>,
}

impl PiecewiseBlender {
    /// Prepare for one evaluation over `len` channels keyed by `(store, channel)` versions.
    pub fn reset(&mut self, len: usize, store_version: u64, channel_version: u64) {
        let key = Some((store_version, channel_version));
        if self.layout_version != key || self.channels.len() != len {
            self.channels.clear();
            self.channels.resize(len, ChannelAccumulator::default());
            self.layout_version = key;
            return;
        }
        self.channels.fill(ChannelAccumulator::default());
    }

    /// Add one contribution to `ch`. Out-of-range channels are ignored.
    pub fn accumulate(&mut self, ch: BlendChannel, kind: BlendKind, value: f64, weight: f64) {
        if let Some(acc) = self.channels.get_mut(ch.index()) {
            acc.accumulate(kind, value, weight);
        }
    }

    /// Accumulator of one channel.
    pub fn channel(&self, ch: BlendChannel) -> Option<&ChannelAccumulator> {
        self.channels.get(ch.index())
    }

    /// Final value of one channel.
    pub fn combine(&self, ch: BlendChannel, initial: f64) -> f64 {
        self.channel(ch).map_or(initial, |acc| acc.combine(initial))
    }

    /// Number of channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Return `true` when there are no channels.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/blend/accumulator.rs"]
mod tests;
