use crate::foundation::time::{FrameNumber, FrameTime, TimeRange};
use crate::foundation::transform::TimeTransform;
use serde::{Deserialize, Serialize};

/// Direction of playback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayDirection {
    /// Time increases.
    #[default]
    Forwards,
    /// Time decreases.
    Backwards,
}

/// Player state for one evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackStatus {
    /// Not playing.
    #[default]
    Stopped,
    /// Playing; one-shots over the swept range fire.
    Playing,
    /// Interactive scrubbing.
    Scrubbing,
    /// Discontinuous jump; swept one-shots are skipped.
    Jumping,
    /// Single-frame stepping.
    Stepping,
    /// Paused.
    Paused,
}

/// Time context of one instance evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationContext {
    /// Time evaluation sweeps from (exclusive).
    pub from: FrameTime,
    /// Time being evaluated.
    pub to: FrameTime,
    /// Playback direction.
    pub direction: PlayDirection,
    /// Player status.
    pub status: PlaybackStatus,
    /// The instance is pre-rolling.
    pub pre_roll: bool,
    /// The instance is post-rolling.
    pub post_roll: bool,
}

impl Default for EvaluationContext {
    fn default() -> Self {
        Self::at(FrameTime(0.0))
    }
}

impl EvaluationContext {
    /// Jump to a single time.
    pub fn at(t: FrameTime) -> Self {
        Self {
            from: t,
            to: t,
            direction: PlayDirection::Forwards,
            status: PlaybackStatus::Jumping,
            pre_roll: false,
            post_roll: false,
        }
    }

    /// Play from `from` to `to`.
    pub fn play(from: FrameTime, to: FrameTime) -> Self {
        Self {
            from,
            to,
            direction: if to.0 < from.0 {
                PlayDirection::Backwards
            } else {
                PlayDirection::Forwards
            },
            status: PlaybackStatus::Playing,
            pre_roll: false,
            post_roll: false,
        }
    }

    /// Evaluated time.
    pub fn time(&self) -> FrameTime {
        self.to
    }

    /// Evaluated frame.
    pub fn frame(&self) -> FrameNumber {
        self.to.frame()
    }

    /// Frames whose one-shots fire: the swept frames when playing, the current frame otherwise.
    pub fn swept(&self) -> TimeRange {
        let to = self.to.frame();
        if self.status != PlaybackStatus::Playing || self.from == self.to {
            return TimeRange::frame(to);
        }
        let from = self.from.frame();
        match self.direction {
            PlayDirection::Forwards => TimeRange::new(from.0 + 1, to.0 + 1),
            PlayDirection::Backwards => TimeRange::new(to.0, from.0),
        }
    }

    /// Same context over a sub-range.
    pub fn with_range(&self, from: FrameTime, to: FrameTime) -> Self {
        Self { from, to, ..*self }
    }

    /// Context mapped into a nested sequence's time space.
    pub fn transform(&self, t: &TimeTransform) -> Self {
        let to = t.apply(self.to);
        let from = if t.loop_index(self.from) == t.loop_index(self.to) {
            t.apply(self.from)
        } else {
            // Sweeping across a loop boundary restarts at the loop start.
            to
        };
        Self {
            from,
            to,
            pre_roll: false,
            post_roll: false,
            ..*self
        }
    }

    /// Split at root-time fences in `(from, to]` into consecutive sub-contexts, in time order.
    pub fn dissect(&self, fences: &[FrameNumber]) -> Vec<Self> {
        let mut out = Vec::with_capacity(fences.len() + 1);
        let mut cursor = self.from;
        let mut cuts: Vec<FrameTime> = fences
            .iter()
            .map(|f| FrameTime::from(*f))
            .filter(|f| {
                let (lo, hi) = if self.from.0 <= self.to.0 {
                    (self.from.0, self.to.0)
                } else {
                    (self.to.0, self.from.0)
                };
                f.0 > lo && f.0 < hi
            })
            .collect();
        if self.direction == PlayDirection::Backwards {
            cuts.reverse();
        }
        for cut in cuts {
            out.push(self.with_range(cursor, cut));
            cursor = cut;
        }
        out.push(self.with_range(cursor, self.to));
        out
    }
}

#[cfg(test)]
#[path = "../../tests/unit/instance/context.rs"]
mod tests;
