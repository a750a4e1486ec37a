use crate::foundation::error::{TemporaError, TemporaResult};
use crate::foundation::hash::{Signature, signature_of};
use crate::foundation::ids::{SectionId, SubSectionId, TrackId};
use crate::foundation::time::{FrameNumber, TimeRange};
use crate::foundation::transform::{LinearTransform, TimeTransform, TimeWarp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Asset key of a sequence inside a [`SequenceLibrary`](crate::SequenceLibrary).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SequenceKey(pub String);

impl SequenceKey {
    /// Build a key from any string-like value.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

/// Host-side binding identifier, resolved to objects by the player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BindingId(pub u32);

/// How a contributor combines with others driving the same property.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendKind {
    /// Replaces the value; weighted-averaged with other absolutes.
    #[default]
    Absolute,
    /// Offset from the initial value, weighted-averaged with absolutes.
    Relative,
    /// Added on top of the normalized result.
    Additive,
    /// Added on top, relative to the curve's value at its base time.
    AdditiveFromBase,
}

/// Source description of one sequence: tracks, nested sub-sequences and fences.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    /// Display name.
    pub name: String,
    /// Valid play range in local frames.
    pub play_range: TimeRange,
    /// Tracks owned by this sequence.
    #[serde(default)]
    pub tracks: Vec<Track>,
    /// Nested sub-sequences.
    #[serde(default)]
    pub sub_sections: Vec<SubSection>,
    /// Local frames at which evaluation ranges must be split.
    #[serde(default)]
    pub determinism_fences: Vec<FrameNumber>,
    /// Source may change without notice; checked for staleness every update.
    #[serde(default)]
    pub volatile: bool,
}

impl Sequence {
    /// Empty sequence over `play_range`.
    pub fn new(name: impl Into<String>, play_range: TimeRange) -> Self {
        Self {
            name: name.into(),
            play_range,
            tracks: Vec::new(),
            sub_sections: Vec::new(),
            determinism_fences: Vec::new(),
            volatile: false,
        }
    }

    /// Builder-style track append.
    pub fn with_track(mut self, track: Track) -> Self {
        self.tracks.push(track);
        self
    }

    /// Builder-style sub-section append.
    pub fn with_sub_section(mut self, sub: SubSection) -> Self {
        self.sub_sections.push(sub);
        self
    }

    /// Look up a track.
    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// Look up a section of a track.
    pub fn section(&self, track: TrackId, section: SectionId) -> Option<(&Track, &Section)> {
        let t = self.track(track)?;
        let s = t.sections.iter().find(|s| s.id == section)?;
        Some((t, s))
    }

    /// Look up a sub-section.
    pub fn sub_section(&self, id: SubSectionId) -> Option<&SubSection> {
        self.sub_sections.iter().find(|s| s.id == id)
    }

    /// Check structural validity: unique ids, positive time scales, bounded sub-section starts.
    pub fn validate(&self) -> TemporaResult<()> {
        let mut tracks = BTreeSet::new();
        for t in &self.tracks {
            if !tracks.insert(t.id) {
                return Err(TemporaError::validation(format!(
                    "sequence '{}' has duplicate track id {}",
                    self.name, t.id.0
                )));
            }
            let mut sections = BTreeSet::new();
            for s in &t.sections {
                if !sections.insert(s.id) {
                    return Err(TemporaError::validation(format!(
                        "track {} has duplicate section id {}",
                        t.id.0, s.id.0
                    )));
                }
            }
        }
        let mut subs = BTreeSet::new();
        for s in &self.sub_sections {
            if !subs.insert(s.id) {
                return Err(TemporaError::validation(format!(
                    "sequence '{}' has duplicate sub-section id {}",
                    self.name, s.id.0
                )));
            }
            s.validate()?;
        }
        Ok(())
    }

    /// Content signature over the canonical JSON encoding.
    pub fn signature(&self) -> TemporaResult<Signature> {
        Ok(signature_of(self)?)
    }

    /// Parse and validate a sequence from JSON.
    pub fn from_json(json: &str) -> TemporaResult<Self> {
        let seq: Self = serde_json::from_str(json)?;
        seq.validate()?;
        Ok(seq)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> TemporaResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A track: sections bound to one object binding, sharing evaluation priorities.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Id unique within the sequence.
    pub id: TrackId,
    /// Object binding the sections animate, if any.
    #[serde(default)]
    pub binding: Option<BindingId>,
    /// Evaluation group priority (higher runs first).
    #[serde(default)]
    pub group_priority: i16,
    /// Evaluation priority within the group (higher runs first).
    #[serde(default)]
    pub eval_priority: i16,
    /// Sections in local time.
    #[serde(default)]
    pub sections: Vec<Section>,
}

impl Track {
    /// Empty track with default priorities.
    pub fn new(id: TrackId, binding: Option<BindingId>) -> Self {
        Self {
            id,
            binding,
            group_priority: 0,
            eval_priority: 0,
            sections: Vec::new(),
        }
    }

    /// Builder-style section append.
    pub fn with_section(mut self, section: Section) -> Self {
        self.sections.push(section);
        self
    }
}

/// Time-bounded piece of a track that provides entities.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Id unique within the track.
    pub id: SectionId,
    /// Active range in local time.
    pub range: TimeRange,
    /// Entities from this section need an initialization pass when linked.
    #[serde(default)]
    pub requires_init: bool,
    /// Blend behavior of produced values.
    #[serde(default)]
    pub blend: BlendKind,
    /// Frames over which the weight ramps 0 → 1 at the section start.
    #[serde(default)]
    pub ease_in: u32,
    /// Frames over which the weight ramps 1 → 0 at the section end.
    #[serde(default)]
    pub ease_out: u32,
    /// Kind-specific data.
    pub payload: SectionPayload,
}

impl Section {
    /// Section with default blend and no easing.
    pub fn new(id: SectionId, range: TimeRange, payload: SectionPayload) -> Self {
        Self {
            id,
            range,
            requires_init: false,
            blend: BlendKind::Absolute,
            ease_in: 0,
            ease_out: 0,
            payload,
        }
    }

    /// Builder-style blend kind.
    pub fn with_blend(mut self, blend: BlendKind) -> Self {
        self.blend = blend;
        self
    }

    /// Builder-style easing.
    pub fn with_easing(mut self, ease_in: u32, ease_out: u32) -> Self {
        self.ease_in = ease_in;
        self.ease_out = ease_out;
        self
    }
}

/// Closed set of entity-provider kinds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SectionPayload {
    /// Keyed float curve driving one named property of the bound objects.
    Property(PropertySection),
    /// One-shot triggers at key frames.
    Event(EventSection),
    /// Keeps a spawnable object alive while active.
    Spawn(SpawnSection),
}

/// Payload of [`SectionPayload::Property`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertySection {
    /// Property name on the bound object.
    pub property: String,
    /// Value curve in local time.
    pub curve: Curve,
    /// Base time for [`BlendKind::AdditiveFromBase`]; defaults to the section start.
    #[serde(default)]
    pub base_time: Option<FrameNumber>,
}

/// Payload of [`SectionPayload::Event`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventSection {
    /// Trigger keys in local time.
    pub keys: Vec<EventKey>,
}

/// One event trigger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventKey {
    /// Local frame.
    pub frame: FrameNumber,
    /// Event name handed to the player.
    pub name: String,
}

/// Payload of [`SectionPayload::Spawn`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnSection {
    /// Host-defined template to spawn from.
    pub template: String,
}

/// Piecewise-linear float curve.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    /// Keys sorted by frame.
    pub keys: Vec<CurveKey>,
    /// Value when there are no keys.
    #[serde(default)]
    pub default: f64,
}

/// One curve key.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurveKey {
    /// Local frame.
    pub frame: FrameNumber,
    /// Value at the frame.
    pub value: f64,
}

impl Curve {
    /// Curve from `(frame, value)` pairs; sorts by frame.
    pub fn from_keys(keys: &[(i64, f64)]) -> Self {
        let mut keys: Vec<CurveKey> = keys
            .iter()
            .map(|&(f, v)| CurveKey {
                frame: FrameNumber(f),
                value: v,
            })
            .collect();
        keys.sort_by_key(|k| k.frame);
        Self { keys, default: 0.0 }
    }

    /// Constant curve.
    pub fn constant(value: f64) -> Self {
        Self {
            keys: Vec::new(),
            default: value,
        }
    }

    /// Evaluate at local time `t` (held flat outside the key span).
    pub fn evaluate(&self, t: f64) -> f64 {
        let Some(first) = self.keys.first() else {
            return self.default;
        };
        if t <= first.frame.0 as f64 {
            return first.value;
        }
        let next = self.keys.partition_point(|k| (k.frame.0 as f64) <= t);
        if next >= self.keys.len() {
            return self.keys[self.keys.len() - 1].value;
        }
        let a = self.keys[next - 1];
        let b = self.keys[next];
        let span = (b.frame.0 - a.frame.0) as f64;
        if span <= 0.0 {
            return b.value;
        }
        let alpha = (t - a.frame.0 as f64) / span;
        a.value + (b.value - a.value) * alpha
    }
}

/// Nested sub-sequence placed inside a parent sequence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubSection {
    /// Id unique within the parent sequence.
    pub id: SubSectionId,
    /// Asset key of the nested sequence.
    pub sequence: SequenceKey,
    /// Range in parent-local time. The start must be bounded.
    pub range: TimeRange,
    /// Inner frames advanced per parent frame.
    #[serde(default = "default_timescale")]
    pub timescale: f64,
    /// Frames trimmed from the inner play range start.
    #[serde(default)]
    pub start_frame_offset: i64,
    /// Frames trimmed from the inner play range end.
    #[serde(default)]
    pub end_frame_offset: i64,
    /// Inner offset at which the first loop starts.
    #[serde(default)]
    pub first_loop_start_frame_offset: i64,
    /// Repeat the inner window until the section ends.
    #[serde(default)]
    pub can_loop: bool,
    /// Added to the parent's hierarchical bias.
    #[serde(default)]
    pub hierarchical_bias: i32,
    /// Parent frames before the section in which the sub-sequence is pre-rolling.
    #[serde(default)]
    pub pre_roll_frames: i64,
    /// Parent frames after the section in which the sub-sequence is post-rolling.
    #[serde(default)]
    pub post_roll_frames: i64,
}

fn default_timescale() -> f64 {
    1.0
}

impl SubSection {
    /// Non-looping sub-section at time scale 1.
    pub fn new(id: SubSectionId, sequence: SequenceKey, range: TimeRange) -> Self {
        Self {
            id,
            sequence,
            range,
            timescale: 1.0,
            start_frame_offset: 0,
            end_frame_offset: 0,
            first_loop_start_frame_offset: 0,
            can_loop: false,
            hierarchical_bias: 0,
            pre_roll_frames: 0,
            post_roll_frames: 0,
        }
    }

    /// Builder-style time scale.
    pub fn with_timescale(mut self, timescale: f64) -> Self {
        self.timescale = timescale;
        self
    }

    /// Builder-style looping with a first-loop offset.
    pub fn looping(mut self, first_loop_start_frame_offset: i64) -> Self {
        self.can_loop = true;
        self.first_loop_start_frame_offset = first_loop_start_frame_offset;
        self
    }

    /// Builder-style hierarchical bias.
    pub fn with_bias(mut self, bias: i32) -> Self {
        self.hierarchical_bias = bias;
        self
    }

    fn validate(&self) -> TemporaResult<()> {
        if !(self.timescale.is_finite() && self.timescale > 0.0) {
            return Err(TemporaError::validation(format!(
                "sub-section {} timescale must be finite and > 0",
                self.id.0
            )));
        }
        if self.range.start.is_none() {
            return Err(TemporaError::validation(format!(
                "sub-section {} range must have a bounded start",
                self.id.0
            )));
        }
        if self.pre_roll_frames < 0 || self.post_roll_frames < 0 {
            return Err(TemporaError::validation(format!(
                "sub-section {} pre/post-roll must be >= 0",
                self.id.0
            )));
        }
        Ok(())
    }

    fn section_start(&self) -> f64 {
        self.range.start.map_or(0.0, |s| s.0 as f64)
    }

    /// Inner play window after start/end trimming, in inner-local time.
    pub fn inner_window(&self, inner_play: TimeRange) -> TimeRange {
        TimeRange {
            start: inner_play.start.map(|s| s.offset(self.start_frame_offset)),
            end: inner_play.end.map(|e| e.offset(-self.end_frame_offset)),
        }
    }

    /// Inner window length, `None` when open-ended or empty.
    pub fn loop_length(&self, inner_play: TimeRange) -> Option<i64> {
        let len = self.inner_window(inner_play).len_frames()?;
        (len > 0).then_some(len as i64)
    }

    /// Parent-local → inner-local mapping for a non-looping section.
    pub fn outer_to_inner(&self, inner_play: TimeRange) -> LinearTransform {
        let origin = self.inner_window(inner_play).start.map_or(0.0, |s| s.0 as f64);
        LinearTransform::new(
            self.timescale,
            origin - self.section_start() * self.timescale,
        )
    }

    /// Parent-local → unwrapped loop time `u`, where loop `k` covers `u ∈ [k·L, (k+1)·L)`.
    pub fn outer_to_unwrapped(&self) -> LinearTransform {
        LinearTransform::new(
            self.timescale,
            self.first_loop_start_frame_offset as f64 - self.section_start() * self.timescale,
        )
    }

    /// Parent-local → inner-local mapping valid during loop iteration `k`.
    pub fn loop_transform(&self, inner_play: TimeRange, len: i64, k: i64) -> LinearTransform {
        let origin = self.inner_window(inner_play).start.map_or(0.0, |s| s.0 as f64);
        self.outer_to_unwrapped()
            .then(LinearTransform::new(1.0, origin - (k * len) as f64))
    }

    /// Parent-local window covered by loop iteration `k` (unclipped).
    pub fn loop_window(&self, len: i64, k: i64) -> TimeRange {
        let first = (k * len).max(self.first_loop_start_frame_offset.min(len - 1).max(0));
        let unwrapped = TimeRange::new(first, (k + 1) * len);
        self.outer_to_unwrapped().inverse().map_range(unwrapped)
    }

    /// Root→inner transform for the hierarchy node, with loop warping when looping.
    pub fn node_transform(&self, inner_play: TimeRange) -> TimeTransform {
        match (self.can_loop, self.loop_length(inner_play)) {
            (true, Some(len)) => {
                let origin = self.inner_window(inner_play).start.map_or(0.0, |s| s.0 as f64);
                TimeTransform::looping(
                    self.outer_to_unwrapped()
                        .then(LinearTransform::new(1.0, origin)),
                    TimeWarp {
                        origin,
                        period: len as f64,
                    },
                )
            }
            _ => TimeTransform::linear(self.outer_to_inner(inner_play)),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/model/sequence.rs"]
mod tests;
