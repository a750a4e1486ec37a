use crate::foundation::error::{TemporaError, TemporaResult};
use crate::foundation::ids::{SectionId, SequenceId, TrackId};
use crate::foundation::time::{FrameNumber, TimeRange};
use smallvec::SmallVec;
use std::cmp::{Ordering, Reverse};

/// One active track segment inside a field entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldSegment {
    /// Sequence node that compiled the segment.
    pub sequence: SequenceId,
    /// Source track.
    pub track: TrackId,
    /// Source section.
    pub section: SectionId,
    /// Provider-local entity index.
    pub entity_index: u32,
    /// Track group priority (higher first).
    pub group_priority: i16,
    /// Accumulated hierarchical bias (lower first).
    pub hierarchical_bias: i32,
    /// Track evaluation priority (higher first).
    pub eval_priority: i16,
    /// Needs an initialization pass when linked.
    pub requires_init: bool,
    /// Lives for a single update.
    pub one_shot: bool,
}

impl FieldSegment {
    /// Evaluation order: group desc, bias asc, eval desc, then source ids ascending.
    pub fn priority_cmp(&self, other: &Self) -> Ordering {
        let key = |s: &Self| {
            (
                Reverse(s.group_priority),
                s.hierarchical_bias,
                Reverse(s.eval_priority),
                s.sequence,
                s.track,
                s.section,
                s.entity_index,
            )
        };
        key(self).cmp(&key(other))
    }
}

/// Contents of one field range: sorted segments and active sub-sequence ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldEntry {
    /// Segments in evaluation order.
    pub segments: Vec<FieldSegment>,
    /// Active sub-sequences (never contains the root), ascending.
    pub active_sequences: SmallVec<[SequenceId; 4]>,
}

impl FieldEntry {
    /// Return `true` for an explicitly recorded empty range.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty() && self.active_sequences.is_empty()
    }

    /// Return `true` when any segment is one-shot.
    pub fn has_one_shots(&self) -> bool {
        self.segments.iter().any(|s| s.one_shot)
    }
}

/// Ordered, non-overlapping mapping from root-time ranges to field entries.
///
/// Ranges that were compiled but hold nothing are kept as empty entries, so a missing range
/// always means "not compiled yet".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationField {
    ranges: Vec<TimeRange>,
    entries: Vec<FieldEntry>,
}

impl EvaluationField {
    /// Number of ranges.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Return `true` when nothing was compiled.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Compiled ranges in ascending order.
    pub fn ranges(&self) -> &[TimeRange] {
        &self.ranges
    }

    /// Ranges with entries in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (TimeRange, &FieldEntry)> {
        self.ranges.iter().copied().zip(self.entries.iter())
    }

    /// Binary-search the range containing `f`.
    pub fn find(&self, f: FrameNumber) -> Option<(TimeRange, &FieldEntry)> {
        let i = self.ranges.partition_point(|r| r.end_key() <= f.0);
        let r = *self.ranges.get(i)?;
        r.contains(f).then(|| (r, &self.entries[i]))
    }

    /// Entries overlapping `range`, in order.
    pub fn overlapping(&self, range: TimeRange) -> impl Iterator<Item = (TimeRange, &FieldEntry)> {
        let first = self.ranges.partition_point(|r| r.end_key() <= range.start_key());
        self.ranges[first..]
            .iter()
            .copied()
            .zip(self.entries[first..].iter())
            .take_while(move |(r, _)| r.start_key() < range.end_key())
            .filter(move |(r, _)| r.overlaps(range))
    }

    /// Parts of `range` not compiled yet.
    pub fn gaps(&self, range: TimeRange) -> Vec<TimeRange> {
        range.difference(&self.ranges)
    }

    /// Return `true` when every frame of `range` is compiled.
    pub fn covers(&self, range: TimeRange) -> bool {
        self.gaps(range).is_empty()
    }

    /// Insert freshly compiled entries; they must not overlap anything already present.
    pub(crate) fn insert(&mut self, range: TimeRange, entry: FieldEntry) -> TemporaResult<()> {
        if range.is_empty() {
            return Ok(());
        }
        let i = self.ranges.partition_point(|r| r.end_key() <= range.start_key());
        if let Some(next) = self.ranges.get(i)
            && next.overlaps(range)
        {
            return Err(TemporaError::compile(format!(
                "field range {range:?} overlaps compiled range {next:?}"
            )));
        }
        self.ranges.insert(i, range);
        self.entries.insert(i, entry);
        Ok(())
    }
}

/// Build the partition of `span` from root-time segment and active-sequence records.
///
/// Every boundary of a clipped record starts a new elementary range; equal neighbours are
/// merged. The result covers `span` exactly with no overlaps.
pub(crate) fn build_partition(
    span: TimeRange,
    segments: &[(TimeRange, FieldSegment)],
    sequences: &[(TimeRange, SequenceId)],
) -> Vec<(TimeRange, FieldEntry)> {
    if span.is_empty() {
        return Vec::new();
    }
    enum Item {
        Segment(FieldSegment),
        Sequence(SequenceId),
    }
    let mut items: Vec<(TimeRange, Item)> = segments
        .iter()
        .map(|(r, s)| (r.intersect(span), Item::Segment(*s)))
        .chain(
            sequences
                .iter()
                .map(|(r, id)| (r.intersect(span), Item::Sequence(*id))),
        )
        .filter(|(r, _)| !r.is_empty())
        .collect();
    items.sort_by(|a, b| a.0.cmp_bounds(b.0));

    let mut bounds: Vec<i64> = vec![span.start_key(), span.end_key()];
    for (r, _) in &items {
        bounds.push(r.start_key());
        bounds.push(r.end_key());
    }
    bounds.sort_unstable();
    bounds.dedup();

    let to_range = |a: i64, b: i64| TimeRange {
        start: (a != i64::MIN).then_some(FrameNumber(a)),
        end: (b != i64::MAX).then_some(FrameNumber(b)),
    };

    let mut out: Vec<(TimeRange, FieldEntry)> = Vec::new();
    let mut next = 0usize;
    let mut active: Vec<usize> = Vec::new();
    for w in bounds.windows(2) {
        let (a, b) = (w[0], w[1]);
        while next < items.len() && items[next].0.start_key() <= a {
            active.push(next);
            next += 1;
        }
        active.retain(|&i| items[i].0.end_key() > a);

        let mut entry = FieldEntry::default();
        for &i in &active {
            match &items[i].1 {
                Item::Segment(s) => entry.segments.push(*s),
                Item::Sequence(id) => entry.active_sequences.push(*id),
            }
        }
        entry.segments.sort_by(FieldSegment::priority_cmp);
        entry.segments.dedup();
        entry.active_sequences.sort_unstable();
        entry.active_sequences.dedup();

        let range = to_range(a, b);
        if let Some((prev_range, prev)) = out.last_mut()
            && *prev == entry
        {
            prev_range.end = range.end;
            continue;
        }
        out.push((range, entry));
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/compile/field.rs"]
mod tests;
