use crate::foundation::error::{TemporaError, TemporaResult};
use crate::foundation::ids::{SequenceId, SubSectionId};
use crate::foundation::time::{FrameTime, TimeRange};
use crate::foundation::transform::TimeTransform;
use crate::model::sequence::SequenceKey;
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Compiled description of one nested sequence instance.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceHierarchyNode {
    /// Parent node ([`SequenceId::ROOT`] for top-level sub-sequences).
    pub parent: SequenceId,
    /// Asset key of the nested sequence.
    pub sequence: SequenceKey,
    /// Sub-section of the parent that spawned this node.
    pub sub_section: SubSectionId,
    /// Root time → sequence-local time.
    pub root_to_sequence: TimeTransform,
    /// Accumulated hierarchical bias.
    pub hierarchical_bias: i32,
    /// Valid play window in local time.
    pub play_range: TimeRange,
    /// Span of the sub-section in root time (clamped by all parents). Inside a looping parent
    /// this is the hull of every iteration's span.
    pub root_range: TimeRange,
    /// Root-time pre-roll spans, one per parent iteration, sorted.
    pub pre_roll_ranges: SmallVec<[TimeRange; 2]>,
    /// Root-time post-roll spans, one per parent iteration, sorted.
    pub post_roll_ranges: SmallVec<[TimeRange; 2]>,
    /// The sub-section loops its inner window.
    pub is_looping: bool,
    /// The asset was missing when compiled; the node evaluates as empty.
    pub missing: bool,
}

impl SequenceHierarchyNode {
    /// Return `true` when `t` falls in the pre-roll span.
    pub fn is_pre_roll(&self, t: FrameTime) -> bool {
        self.pre_roll_ranges.iter().any(|r| r.contains_time(t))
    }

    /// Return `true` when `t` falls in the post-roll span.
    pub fn is_post_roll(&self, t: FrameTime) -> bool {
        self.post_roll_ranges.iter().any(|r| r.contains_time(t))
    }

    /// Everything but the root-time spans matches: both describe the same nested instance.
    fn same_instance(&self, other: &Self) -> bool {
        self.parent == other.parent
            && self.sequence == other.sequence
            && self.sub_section == other.sub_section
            && self.root_to_sequence == other.root_to_sequence
            && self.hierarchical_bias == other.hierarchical_bias
            && self.play_range == other.play_range
            && self.is_looping == other.is_looping
            && self.missing == other.missing
    }

    /// Fold the root-time spans of another visit of the same instance into this node.
    fn merge_spans(&mut self, other: SequenceHierarchyNode) {
        self.root_range = self.root_range.hull(other.root_range);
        merge_ranges(&mut self.pre_roll_ranges, other.pre_roll_ranges);
        merge_ranges(&mut self.post_roll_ranges, other.post_roll_ranges);
    }
}

fn merge_ranges(into: &mut SmallVec<[TimeRange; 2]>, from: SmallVec<[TimeRange; 2]>) {
    for r in from {
        if !r.is_empty() && !into.contains(&r) {
            into.push(r);
        }
    }
    into.sort_by(|a, b| a.cmp_bounds(*b));
}

/// Tree of compiled sequence nodes, keyed by deterministic [`SequenceId`].
///
/// Nodes are never edited in place: a stale hierarchy is dropped and rebuilt wholesale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequenceHierarchy {
    nodes: BTreeMap<SequenceId, SequenceHierarchyNode>,
}

impl SequenceHierarchy {
    /// Node of a sub-sequence. The root has no node.
    pub fn node(&self, id: SequenceId) -> Option<&SequenceHierarchyNode> {
        self.nodes.get(&id)
    }

    /// Node of a sub-sequence, or a compile error naming the dangling id.
    pub fn require(&self, id: SequenceId) -> TemporaResult<&SequenceHierarchyNode> {
        self.node(id).ok_or_else(|| {
            TemporaError::compile(format!("sequence {} is not in the compiled hierarchy", id.0))
        })
    }

    /// Add a node. Revisiting the same instance (another loop iteration of a parent, another
    /// compiled gap) merges its root-time spans into the existing node.
    pub(crate) fn add(&mut self, id: SequenceId, node: SequenceHierarchyNode) -> TemporaResult<()> {
        if id.is_root() {
            return Err(TemporaError::compile("the root sequence cannot be a hierarchy node"));
        }
        match self.nodes.get_mut(&id) {
            Some(existing) if existing.same_instance(&node) => {
                existing.merge_spans(node);
                Ok(())
            }
            Some(existing) => Err(TemporaError::compile(format!(
                "sequence id {} collides: '{}' vs '{}'",
                id.0, existing.sequence.0, node.sequence.0
            ))),
            None => {
                self.nodes.insert(id, node);
                Ok(())
            }
        }
    }

    /// Direct children of `parent`, in id order.
    pub fn children(&self, parent: SequenceId) -> impl Iterator<Item = SequenceId> + '_ {
        self.nodes
            .iter()
            .filter(move |(_, n)| n.parent == parent)
            .map(|(id, _)| *id)
    }

    /// All nodes in id order.
    pub fn iter(&self) -> impl Iterator<Item = (SequenceId, &SequenceHierarchyNode)> {
        self.nodes.iter().map(|(id, n)| (*id, n))
    }

    /// Number of sub-sequence nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Return `true` for a flat (root-only) hierarchy.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check every parent link resolves and the tree has no cycles.
    pub fn validate(&self) -> TemporaResult<()> {
        for (id, node) in &self.nodes {
            let mut cursor = node.parent;
            let mut steps = 0usize;
            while !cursor.is_root() {
                let Some(parent) = self.nodes.get(&cursor) else {
                    return Err(TemporaError::compile(format!(
                        "sequence {} references missing parent {}",
                        id.0, cursor.0
                    )));
                };
                steps += 1;
                if steps > self.nodes.len() {
                    return Err(TemporaError::compile(format!(
                        "sequence {} has a cyclic parent chain",
                        id.0
                    )));
                }
                cursor = parent.parent;
            }
        }
        Ok(())
    }

    /// Depth of a node (1 for direct children of the root).
    pub fn depth(&self, id: SequenceId) -> usize {
        let mut depth = 0;
        let mut cursor = id;
        while let Some(n) = self.nodes.get(&cursor) {
            depth += 1;
            cursor = n.parent;
            if depth > self.nodes.len() {
                break;
            }
        }
        depth
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compile/hierarchy.rs"]
mod tests;
