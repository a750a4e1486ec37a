//! Motion trails: read-only consumers of blended results.

use crate::blend::channel::BlendTarget;
use crate::foundation::time::FrameNumber;
use crate::view::LinkerView;
use std::collections::BTreeMap;

/// Whether a trail's cached samples are usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheState {
    /// Samples match the scene.
    Valid,
    /// Samples changed this update; redraw.
    Dirty,
    /// The trail does not use the scene.
    NotUsed,
}

/// Kind-specific trail data.
#[derive(Debug, Clone, PartialEq)]
pub enum TrailKind {
    /// Fixed value, independent of evaluation.
    Constant {
        /// Drawn value.
        value: f64,
    },
    /// Samples of one blended property over time.
    Property {
        /// Sampled property.
        target: BlendTarget,
        /// Value per sampled frame.
        samples: BTreeMap<FrameNumber, f64>,
    },
}

/// One trail.
#[derive(Debug, Clone, PartialEq)]
pub struct Trail {
    /// Trail data.
    pub kind: TrailKind,
    /// Samples farther than this many frames from the scene frame are dropped.
    pub window: i64,
}

impl Trail {
    /// Trail of a blended property.
    pub fn property(target: BlendTarget, window: i64) -> Self {
        Self {
            kind: TrailKind::Property {
                target,
                samples: BTreeMap::new(),
            },
            window,
        }
    }

    /// Trail of a fixed value.
    pub fn constant(value: f64) -> Self {
        Self {
            kind: TrailKind::Constant { value },
            window: 0,
        }
    }
}

/// Scene a trail samples from.
#[derive(Debug, Clone, Copy)]
pub struct TrailScene<'a> {
    /// Results of the last evaluation.
    pub view: LinkerView<'a>,
    /// Frame those results belong to.
    pub frame: FrameNumber,
}

/// Sample `scene` into `trail`.
pub fn update_trail(trail: &mut Trail, scene: &TrailScene<'_>) -> CacheState {
    let window = trail.window;
    match &mut trail.kind {
        TrailKind::Constant { .. } => CacheState::NotUsed,
        TrailKind::Property { target, samples } => {
            let Some(value) = scene.view.value(target.object, &target.property) else {
                return CacheState::NotUsed;
            };
            let lo = scene.frame.offset(-window);
            let hi = scene.frame.offset(window);
            let before = samples.len();
            samples.retain(|f, _| *f >= lo && *f <= hi);
            let evicted = samples.len() != before;
            match samples.insert(scene.frame, value) {
                Some(old) if old == value && !evicted => CacheState::Valid,
                _ => CacheState::Dirty,
            }
        }
    }
}
