use crate::blend::accumulator::ChannelAccumulator;
use crate::blend::channel::BlendChannel;
use crate::ecs::entity::EntityId;
use crate::model::sequence::BlendKind;

/// One weighted contribution recorded during the last blend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contribution {
    /// Contributing entity.
    pub entity: EntityId,
    /// Blend category.
    pub kind: BlendKind,
    /// Unweighted value.
    pub value: f64,
    /// Weight.
    pub weight: f64,
}

/// Which contributors of a channel to separate out.
#[derive(Debug, Clone, Copy)]
pub struct DecompositionQuery<'a> {
    /// Blended channel.
    pub channel: BlendChannel,
    /// Entities to isolate.
    pub entities: &'a [EntityId],
}

/// Result of a [`DecompositionQuery`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decomposition {
    /// Isolated contributions in recording order.
    pub isolated: Vec<Contribution>,
    /// Blend of every contributor not in the query.
    pub residual: f64,
    /// Blend of every contributor.
    pub result: f64,
}

impl Decomposition {
    /// `value * weight` of each isolated contributor.
    pub fn weighted(&self) -> impl Iterator<Item = (EntityId, f64)> + '_ {
        self.isolated.iter().map(|c| (c.entity, c.value * c.weight))
    }
}

/// Separate the queried entities' contributions from the rest of one channel's blend.
pub fn decompose(contributions: &[Contribution], entities: &[EntityId], initial: f64) -> Decomposition {
    let mut all = ChannelAccumulator::default();
    let mut rest = ChannelAccumulator::default();
    let mut isolated = Vec::new();
    for c in contributions {
        all.accumulate(c.kind, c.value, c.weight);
        if entities.contains(&c.entity) {
            isolated.push(*c);
        } else {
            rest.accumulate(c.kind, c.value, c.weight);
        }
    }
    Decomposition {
        isolated,
        residual: rest.combine(initial),
        result: all.combine(initial),
    }
}
