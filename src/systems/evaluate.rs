use crate::ecs::components::{
    BaseValueTime, BuiltinComponents, Easing, EntityOwner, EvalTime, EvaluatedValue, FloatCurve,
    Weight,
};
use crate::ecs::registry::ComponentRegistry;
use crate::ecs::system::{Phase, System, SystemContext, SystemDescriptor};
use crate::foundation::error::TemporaResult;
use crate::foundation::time::FrameTime;
use crate::systems::for_each_slot;

/// Copies each owning instance's local evaluation time onto its entities.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvalTimeSystem;

impl System for EvalTimeSystem {
    fn name(&self) -> &'static str {
        "eval_time"
    }

    fn phase(&self) -> Phase {
        Phase::Evaluation
    }

    fn describe(&self, registry: &ComponentRegistry) -> TemporaResult<SystemDescriptor> {
        let b = BuiltinComponents::lookup(registry)?;
        Ok(
            SystemDescriptor::relevant_to(BuiltinComponents::mask(&[b.eval_time, b.owner]))
                .consuming(BuiltinComponents::mask(&[b.owner]))
                .producing(BuiltinComponents::mask(&[b.eval_time])),
        )
    }

    fn run(&self, cx: &mut SystemContext<'_>) -> TemporaResult<()> {
        let owners = cx.store.read::<EntityOwner>()?;
        let mut times = cx.store.write::<EvalTime>()?;
        let owners = owners.slots();
        let instances = cx.instances;
        for_each_slot(times.slots_mut(), cx.parallel, |i, t| {
            if let Some(Some(owner)) = owners.get(i)
                && let Some(inst) = instances.get(owner.instance)
            {
                *t = EvalTime(inst.context().to);
            }
        });
        Ok(())
    }
}

/// Linear ease-in/ease-out weight of a section at local time `t`.
pub fn ease_weight(easing: &Easing, t: FrameTime) -> f64 {
    let mut w = 1.0;
    if easing.ease_in > 0
        && let Some(start) = easing.range.start
    {
        w *= ((t.0 - start.0 as f64) / f64::from(easing.ease_in)).clamp(0.0, 1.0);
    }
    if easing.ease_out > 0
        && let Some(end) = easing.range.end
    {
        w *= ((end.0 as f64 - t.0) / f64::from(easing.ease_out)).clamp(0.0, 1.0);
    }
    w
}

/// Computes easing weights.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightSystem;

impl System for WeightSystem {
    fn name(&self) -> &'static str {
        "weights"
    }

    fn phase(&self) -> Phase {
        Phase::Evaluation
    }

    fn describe(&self, registry: &ComponentRegistry) -> TemporaResult<SystemDescriptor> {
        let b = BuiltinComponents::lookup(registry)?;
        Ok(
            SystemDescriptor::relevant_to(BuiltinComponents::mask(&[b.weight, b.easing]))
                .consuming(BuiltinComponents::mask(&[b.eval_time, b.easing]))
                .producing(BuiltinComponents::mask(&[b.weight])),
        )
    }

    fn run(&self, cx: &mut SystemContext<'_>) -> TemporaResult<()> {
        let easings = cx.store.read::<Easing>()?;
        let times = cx.store.read::<EvalTime>()?;
        let mut weights = cx.store.write::<Weight>()?;
        let (easings, times) = (easings.slots(), times.slots());
        for_each_slot(weights.slots_mut(), cx.parallel, |i, w| {
            *w = match (easings.get(i), times.get(i)) {
                (Some(Some(e)), Some(Some(t))) => Weight(ease_weight(e, t.0)),
                _ => Weight::default(),
            };
        });
        Ok(())
    }
}

/// Samples property curves; additive-from-base entities subtract the curve's base value.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurveSystem;

impl System for CurveSystem {
    fn name(&self) -> &'static str {
        "curves"
    }

    fn phase(&self) -> Phase {
        Phase::Evaluation
    }

    fn describe(&self, registry: &ComponentRegistry) -> TemporaResult<SystemDescriptor> {
        let b = BuiltinComponents::lookup(registry)?;
        Ok(
            SystemDescriptor::relevant_to(BuiltinComponents::mask(&[b.curve, b.value]))
                .consuming(BuiltinComponents::mask(&[b.eval_time, b.curve, b.base_time]))
                .producing(BuiltinComponents::mask(&[b.value])),
        )
    }

    fn run(&self, cx: &mut SystemContext<'_>) -> TemporaResult<()> {
        let curves = cx.store.read::<FloatCurve>()?;
        let times = cx.store.read::<EvalTime>()?;
        let bases = cx.store.read::<BaseValueTime>()?;
        let mut values = cx.store.write::<EvaluatedValue>()?;
        let (curves, times, bases) = (curves.slots(), times.slots(), bases.slots());
        for_each_slot(values.slots_mut(), cx.parallel, |i, v| {
            let (Some(Some(FloatCurve(curve))), Some(Some(t))) = (curves.get(i), times.get(i))
            else {
                return;
            };
            let mut value = curve.evaluate(t.0.0);
            if let Some(Some(base)) = bases.get(i) {
                value -= curve.evaluate(base.0.0);
            }
            *v = EvaluatedValue(value);
        });
        Ok(())
    }
}
