//! Built-in evaluation systems.

pub(crate) mod blend;
pub(crate) mod channels;
pub(crate) mod evaluate;
pub(crate) mod finalize;
pub(crate) mod spawn;

use crate::ecs::system::System;
use rayon::prelude::*;
use std::sync::Arc;

pub use blend::BlendSystem;
pub use channels::{BlendChannelSystem, BoundObjectSystem};
pub use evaluate::{CurveSystem, EvalTimeSystem, WeightSystem};
pub use finalize::{EventSystem, PropertyOutputSystem};
pub use spawn::SpawnableSystem;

/// Every built-in system, in registration order.
pub(crate) fn builtin() -> Vec<Arc<dyn System>> {
    vec![
        Arc::new(SpawnableSystem),
        Arc::new(BoundObjectSystem),
        Arc::new(BlendChannelSystem),
        Arc::new(EvalTimeSystem),
        Arc::new(WeightSystem),
        Arc::new(CurveSystem),
        Arc::new(BlendSystem),
        Arc::new(EventSystem),
        Arc::new(PropertyOutputSystem),
    ]
}

/// Apply `f` to every occupied slot, on the current rayon pool when `parallel`.
pub(crate) fn for_each_slot<T, F>(slots: &mut [Option<T>], parallel: bool, f: F)
where
    T: Send,
    F: Fn(usize, &mut T) + Send + Sync,
{
    if parallel {
        slots.par_iter_mut().enumerate().for_each(|(i, s)| {
            if let Some(v) = s {
                f(i, v);
            }
        });
    } else {
        for (i, s) in slots.iter_mut().enumerate() {
            if let Some(v) = s {
                f(i, v);
            }
        }
    }
}
