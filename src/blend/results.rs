use crate::blend::accumulator::PiecewiseBlender;
use crate::blend::channel::{BlendChannel, BlendChannelAllocator, BlendTarget};
use crate::blend::decompose::{Contribution, Decomposition, DecompositionQuery, decompose};

/// Blend buffers and the final values of the last evaluation.
#[derive(Debug, Default)]
pub struct BlendState {
    pub(crate) channels: BlendChannelAllocator,
    pub(crate) blender: PiecewiseBlender,
    values: Vec<Option<f64>>,
    contributions: Vec<Vec<Contribution>>,
}

impl BlendState {
    /// Channel allocator.
    pub fn channels(&self) -> &BlendChannelAllocator {
        &self.channels
    }

    pub(crate) fn begin(&mut self, store_version: u64) {
        let len = self.channels.len();
        self.blender
            .reset(len, store_version, self.channels.version());
        self.values.clear();
        self.values.resize(len, None);
        self.contributions.resize_with(len, Vec::new);
        self.contributions.truncate(len);
        for c in &mut self.contributions {
            c.clear();
        }
    }

    pub(crate) fn record(&mut self, ch: BlendChannel, c: Contribution) {
        self.blender.accumulate(ch, c.kind, c.value, c.weight);
        if let Some(list) = self.contributions.get_mut(ch.index()) {
            list.push(c);
        }
    }

    pub(crate) fn finish(&mut self) {
        for (ch, _) in self.channels.iter() {
            let initial = self.channels.initial(ch).unwrap_or(0.0);
            if let Some(v) = self.values.get_mut(ch.index()) {
                *v = Some(self.blender.combine(ch, initial));
            }
        }
    }

    /// Final value of a channel from the last evaluation.
    pub fn value(&self, ch: BlendChannel) -> Option<f64> {
        self.values.get(ch.index()).copied().flatten()
    }

    /// Final value of a target from the last evaluation.
    pub fn value_of(&self, target: &BlendTarget) -> Option<f64> {
        self.value(self.channels.channel_of(target)?)
    }

    /// Contributions recorded for a channel in the last evaluation.
    pub fn contributions(&self, ch: BlendChannel) -> &[Contribution] {
        self.contributions
            .get(ch.index())
            .map_or(&[], Vec::as_slice)
    }

    /// Every live channel with its target and final value.
    pub fn outputs(&self) -> impl Iterator<Item = (&BlendTarget, f64)> + '_ {
        self.channels
            .iter()
            .filter_map(|(ch, t)| self.value(ch).map(|v| (t, v)))
    }

    /// Separate some contributors of one channel from the rest.
    pub fn decompose(&self, query: DecompositionQuery<'_>) -> Option<Decomposition> {
        let initial = self.channels.initial(query.channel)?;
        Some(decompose(
            self.contributions(query.channel),
            query.entities,
            initial,
        ))
    }
}
