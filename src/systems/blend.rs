use crate::blend::channel::BlendChannel;
use crate::blend::decompose::Contribution;
use crate::ecs::components::{
    BlendInputs, BuiltinComponents, EvaluatedValue, HierarchicalBias, Weight,
};
use crate::ecs::registry::{ComponentMask, ComponentRegistry};
use crate::ecs::system::{Phase, System, SystemContext, SystemDescriptor};
use crate::foundation::error::TemporaResult;
use crate::model::sequence::BlendKind;
use std::collections::BTreeMap;

/// Piecewise blend of every property contribution into one value per channel.
///
/// Only the contributors with the highest hierarchical bias of a channel take part.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlendSystem;

impl System for BlendSystem {
    fn name(&self) -> &'static str {
        "blender"
    }

    fn phase(&self) -> Phase {
        Phase::Evaluation
    }

    fn describe(&self, registry: &ComponentRegistry) -> TemporaResult<SystemDescriptor> {
        let b = BuiltinComponents::lookup(registry)?;
        Ok(
            SystemDescriptor::relevant_to(BuiltinComponents::mask(&[b.blend_inputs, b.value]))
                .consuming(BuiltinComponents::mask(&[
                    b.blend_inputs,
                    b.value,
                    b.weight,
                    b.blend_kind,
                    b.bias,
                ])),
        )
    }

    fn run(&self, cx: &mut SystemContext<'_>) -> TemporaResult<()> {
        let b = cx.builtins;
        cx.blend.begin(cx.store.structure_version());
        let entities = cx.store.query(
            BuiltinComponents::mask(&[b.blend_inputs, b.value]),
            ComponentMask::EMPTY,
        );
        let inputs = cx.store.read::<BlendInputs>()?;
        let values = cx.store.read::<EvaluatedValue>()?;
        let weights = cx.store.read::<Weight>()?;
        let kinds = cx.store.read::<BlendKind>()?;
        let biases = cx.store.read::<HierarchicalBias>()?;

        let mut pending: Vec<(BlendChannel, i32, Contribution)> = Vec::new();
        let mut top_bias: BTreeMap<BlendChannel, i32> = BTreeMap::new();
        for e in entities {
            let Some(BlendInputs(channels)) = inputs.get(e) else {
                continue;
            };
            let contribution = Contribution {
                entity: e,
                kind: kinds.get(e).copied().unwrap_or_default(),
                value: values.get(e).map_or(0.0, |v| v.0),
                weight: weights.get(e).map_or(1.0, |w| w.0),
            };
            let bias = biases.get(e).map_or(0, |h| h.0);
            for ch in channels {
                top_bias
                    .entry(*ch)
                    .and_modify(|top| *top = (*top).max(bias))
                    .or_insert(bias);
                pending.push((*ch, bias, contribution));
            }
        }
        for (ch, bias, contribution) in pending {
            if top_bias.get(&ch) == Some(&bias) {
                cx.blend.record(ch, contribution);
            }
        }
        cx.blend.finish();
        Ok(())
    }
}
