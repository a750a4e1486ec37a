use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Discrete frame position in some sequence's time space.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct FrameNumber(pub i64);

impl FrameNumber {
    /// Offset by `delta` frames, saturating at the representable bounds.
    pub fn offset(self, delta: i64) -> Self {
        Self(self.0.saturating_add(delta))
    }
}

/// Continuous evaluation time (frame plus sub-frame) in some sequence's time space.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct FrameTime(pub f64);

impl FrameTime {
    /// The frame this time falls inside (floor semantics).
    pub fn frame(self) -> FrameNumber {
        FrameNumber(floor_to_frame(self.0))
    }
}

impl From<FrameNumber> for FrameTime {
    fn from(f: FrameNumber) -> Self {
        Self(f.0 as f64)
    }
}

pub(crate) fn floor_to_frame(v: f64) -> i64 {
    if v.is_nan() {
        return 0;
    }
    // `as` saturates for out-of-range floats.
    v.floor() as i64
}

/// Half-open frame range `[start, end)` where either bound may be open (unbounded).
///
/// Inclusive upper bounds are represented as `end = b + 1`, so every range is stored in a single
/// canonical form and equality is structural.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    /// Inclusive lower bound, `None` when open.
    pub start: Option<FrameNumber>,
    /// Exclusive upper bound, `None` when open.
    pub end: Option<FrameNumber>, // exclusive
}

impl TimeRange {
    /// Unbounded range covering all time.
    pub const ALL: Self = Self {
        start: None,
        end: None,
    };

    /// Bounded half-open range `[start, end)`.
    pub fn new(start: i64, end: i64) -> Self {
        Self {
            start: Some(FrameNumber(start)),
            end: Some(FrameNumber(end)),
        }
    }

    /// Bounded inclusive range `[first, last]`.
    pub fn inclusive(first: i64, last: i64) -> Self {
        Self::new(first, last.saturating_add(1))
    }

    /// Single frame `[f, f]`.
    pub fn frame(f: FrameNumber) -> Self {
        Self::inclusive(f.0, f.0)
    }

    /// `[start, +inf)`.
    pub fn from_start(start: i64) -> Self {
        Self {
            start: Some(FrameNumber(start)),
            end: None,
        }
    }

    /// `(-inf, end)`.
    pub fn until(end: i64) -> Self {
        Self {
            start: None,
            end: Some(FrameNumber(end)),
        }
    }

    /// Lower bound as an ordering key (`i64::MIN` when open).
    pub fn start_key(self) -> i64 {
        self.start.map_or(i64::MIN, |f| f.0)
    }

    /// Upper bound as an ordering key (`i64::MAX` when open).
    pub fn end_key(self) -> i64 {
        self.end.map_or(i64::MAX, |f| f.0)
    }

    /// Return `true` when no frame is contained.
    pub fn is_empty(self) -> bool {
        self.start_key() >= self.end_key()
    }

    /// Return `true` when both bounds are closed.
    pub fn is_bounded(self) -> bool {
        self.start.is_some() && self.end.is_some()
    }

    /// Number of frames, `None` when unbounded.
    pub fn len_frames(self) -> Option<u64> {
        match (self.start, self.end) {
            (Some(s), Some(e)) => Some(e.0.saturating_sub(s.0).max(0) as u64),
            _ => None,
        }
    }

    /// Return `true` when `f` is inside the range.
    pub fn contains(self, f: FrameNumber) -> bool {
        self.start_key() <= f.0 && f.0 < self.end_key()
    }

    /// Return `true` when the frame containing `t` is inside the range.
    pub fn contains_time(self, t: FrameTime) -> bool {
        self.contains(t.frame())
    }

    /// Return `true` when `other` lies entirely within this range.
    pub fn contains_range(self, other: Self) -> bool {
        other.is_empty() || (self.start_key() <= other.start_key() && other.end_key() <= self.end_key())
    }

    /// Intersection of two ranges (possibly empty).
    pub fn intersect(self, other: Self) -> Self {
        let start = if self.start_key() >= other.start_key() {
            self.start
        } else {
            other.start
        };
        let end = if self.end_key() <= other.end_key() {
            self.end
        } else {
            other.end
        };
        Self { start, end }
    }

    /// Return `true` when the ranges share at least one frame.
    pub fn overlaps(self, other: Self) -> bool {
        !self.intersect(other).is_empty()
    }

    /// Smallest range containing both.
    pub fn hull(self, other: Self) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        let start = if self.start_key() <= other.start_key() {
            self.start
        } else {
            other.start
        };
        let end = if self.end_key() >= other.end_key() {
            self.end
        } else {
            other.end
        };
        Self { start, end }
    }

    /// Expand a bounded edge outward by the given frame counts.
    pub fn expand(self, before: i64, after: i64) -> Self {
        Self {
            start: self.start.map(|s| s.offset(-before)),
            end: self.end.map(|e| e.offset(after)),
        }
    }

    /// Coerce an empty bounded range `[f, f)` into the inclusive single frame `[f, f]`.
    ///
    /// Used when rounding from non-integer time scales collapses a range that still touches a
    /// frame, so that frame is not silently dropped.
    pub fn coerce_inclusive(self) -> Self {
        match (self.start, self.end) {
            (Some(s), Some(e)) if s.0 >= e.0 => Self::frame(s),
            _ => self,
        }
    }

    /// Parts of `self` not covered by any of `covered`. `covered` must be sorted by start and
    /// pairwise disjoint.
    pub fn difference(self, covered: &[Self]) -> Vec<Self> {
        let mut out = Vec::new();
        if self.is_empty() {
            return out;
        }
        let mut cursor = self.start;
        for c in covered {
            let c = c.intersect(self);
            if c.is_empty() {
                continue;
            }
            if let Some(c_start) = c.start {
                let gap = Self {
                    start: cursor,
                    end: Some(c_start),
                };
                if !gap.is_empty() {
                    out.push(gap);
                }
            }
            cursor = c.end;
            if cursor.is_none() {
                return out;
            }
        }
        let tail = Self {
            start: cursor,
            end: self.end,
        };
        if !tail.is_empty() {
            out.push(tail);
        }
        out
    }

    /// Order by lower bound then upper bound.
    pub fn cmp_bounds(self, other: Self) -> Ordering {
        self.start_key()
            .cmp(&other.start_key())
            .then(self.end_key().cmp(&other.end_key()))
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/time.rs"]
mod tests;
