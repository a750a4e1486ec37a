use crate::foundation::time::{FrameNumber, FrameTime, TimeRange, floor_to_frame};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Affine time mapping `t * scale + offset`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearTransform {
    /// Multiplier applied to the input time; must be positive.
    pub scale: f64,
    /// Offset added after scaling.
    pub offset: f64,
}

impl LinearTransform {
    /// The identity mapping.
    pub const IDENTITY: Self = Self {
        scale: 1.0,
        offset: 0.0,
    };

    /// Build a mapping from scale and offset.
    pub fn new(scale: f64, offset: f64) -> Self {
        Self { scale, offset }
    }

    /// Map a single time.
    pub fn apply(self, t: f64) -> f64 {
        t * self.scale + self.offset
    }

    /// Map a frame time.
    pub fn apply_time(self, t: FrameTime) -> FrameTime {
        FrameTime(self.apply(t.0))
    }

    /// Inverse mapping. Scale is never zero for validated sections.
    pub fn inverse(self) -> Self {
        let inv = if self.scale == 0.0 { 0.0 } else { 1.0 / self.scale };
        Self {
            scale: inv,
            offset: -self.offset * inv,
        }
    }

    /// `child ∘ self`: apply `self` first, then `child`.
    pub fn then(self, child: Self) -> Self {
        Self {
            scale: self.scale * child.scale,
            offset: self.offset * child.scale + child.offset,
        }
    }

    /// Map a frame range, flooring both bounds. Open bounds stay open.
    pub fn map_range(self, r: TimeRange) -> TimeRange {
        let map = |f: FrameNumber| FrameNumber(floor_to_frame(self.apply(f.0 as f64)));
        if self.scale < 0.0 {
            // Reversed mappings swap bounds; the exclusive end becomes an inclusive start.
            return TimeRange {
                start: r.end.map(|e| map(e.offset(-1))),
                end: r.start.map(|s| map(s).offset(1)),
            };
        }
        TimeRange {
            start: r.start.map(map),
            end: r.end.map(map),
        }
    }
}

impl Default for LinearTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Loop warp applied after a linear stage: `origin + rem_euclid(t - origin, period)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeWarp {
    /// Start of the looped window in the stage's output space.
    pub origin: f64,
    /// Loop period in the stage's output space.
    pub period: f64,
}

impl TimeWarp {
    fn apply(self, t: f64) -> f64 {
        if self.period <= 0.0 {
            return self.origin;
        }
        self.origin + (t - self.origin).rem_euclid(self.period)
    }

    fn loop_index(self, t: f64) -> i64 {
        if self.period <= 0.0 {
            return 0;
        }
        floor_to_frame((t - self.origin) / self.period)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
struct TransformStage {
    linear: LinearTransform,
    warp: Option<TimeWarp>,
}

/// Root-to-sequence time transform: a chain of linear stages, each optionally loop-warped.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeTransform {
    stages: SmallVec<[TransformStage; 2]>,
}

impl TimeTransform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Purely linear transform.
    pub fn linear(linear: LinearTransform) -> Self {
        let mut t = Self::default();
        t.push(linear, None);
        t
    }

    /// Linear transform followed by a loop warp.
    pub fn looping(linear: LinearTransform, warp: TimeWarp) -> Self {
        let mut t = Self::default();
        t.push(linear, Some(warp));
        t
    }

    fn push(&mut self, linear: LinearTransform, warp: Option<TimeWarp>) {
        if let Some(last) = self.stages.last_mut()
            && last.warp.is_none()
        {
            last.linear = last.linear.then(linear);
            last.warp = warp;
            return;
        }
        self.stages.push(TransformStage { linear, warp });
    }

    /// Return `true` when any stage loops.
    pub fn is_warped(&self) -> bool {
        self.stages.iter().any(|s| s.warp.is_some())
    }

    /// `child ∘ self`.
    pub fn then(&self, child: &Self) -> Self {
        let mut out = self.clone();
        for s in &child.stages {
            out.push(s.linear, s.warp);
        }
        out
    }

    /// Map a root time into sequence time.
    pub fn apply(&self, t: FrameTime) -> FrameTime {
        let mut v = t.0;
        for s in &self.stages {
            v = s.linear.apply(v);
            if let Some(w) = s.warp {
                v = w.apply(v);
            }
        }
        FrameTime(v)
    }

    /// Loop iteration of the innermost looping stage at root time `t` (0 when not looping).
    pub fn loop_index(&self, t: FrameTime) -> i64 {
        let mut v = t.0;
        let mut idx = 0;
        for s in &self.stages {
            v = s.linear.apply(v);
            if let Some(w) = s.warp {
                idx = w.loop_index(v);
                v = w.apply(v);
            }
        }
        idx
    }

    /// Linear part when the transform has no warps.
    pub fn as_linear(&self) -> Option<LinearTransform> {
        if self.is_warped() {
            return None;
        }
        Some(
            self.stages
                .iter()
                .fold(LinearTransform::IDENTITY, |acc, s| acc.then(s.linear)),
        )
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/transform.rs"]
mod tests;
