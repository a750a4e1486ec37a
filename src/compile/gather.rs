use crate::foundation::ids::SequenceId;
use crate::foundation::time::{FrameNumber, TimeRange, floor_to_frame};
use crate::foundation::transform::{LinearTransform, TimeTransform};

/// Recursion frame of the compiler.
///
/// `compile` ranges are a hint of how much to produce; `clamp` ranges are hard bounds and win
/// whenever rounding makes the two disagree.
#[derive(Debug, Clone)]
pub(crate) struct GatherParameters {
    pub(crate) sequence_id: SequenceId,
    /// Root → local mapping valid inside this frame (one loop iteration when looping).
    pub(crate) root_to_local: LinearTransform,
    /// Root → local mapping including loop warps, stored on hierarchy nodes.
    pub(crate) node_transform: TimeTransform,
    pub(crate) hierarchical_bias: i32,
    pub(crate) root_compile_range: TimeRange,
    pub(crate) root_clamp_range: TimeRange,
    pub(crate) local_compile_range: TimeRange,
    pub(crate) local_clamp_range: TimeRange,
    pub(crate) depth: u32,
}

impl GatherParameters {
    pub(crate) fn root(compile_range: TimeRange) -> Self {
        Self {
            sequence_id: SequenceId::ROOT,
            root_to_local: LinearTransform::IDENTITY,
            node_transform: TimeTransform::identity(),
            hierarchical_bias: 0,
            root_compile_range: compile_range,
            root_clamp_range: TimeRange::ALL,
            local_compile_range: compile_range,
            local_clamp_range: TimeRange::ALL,
            depth: 0,
        }
    }

    /// Frame for a nested sequence whose section covers `root_clamp` (root time) and whose
    /// content is limited to `inner_window` (child-local time). `None` when nothing of the
    /// requested compile range falls inside the section.
    pub(crate) fn child(
        &self,
        sequence_id: SequenceId,
        parent_to_child: LinearTransform,
        node_transform: TimeTransform,
        root_clamp: TimeRange,
        inner_window: TimeRange,
        bias: i32,
    ) -> Option<Self> {
        let root_clamp_range = self.root_clamp_range.intersect(root_clamp);
        let root_compile_range = self.root_compile_range.intersect(root_clamp_range);
        if root_compile_range.is_empty() {
            return None;
        }
        let root_to_local = self.root_to_local.then(parent_to_child);
        let local_clamp_range = root_to_local
            .map_range(root_clamp_range)
            .coerce_inclusive()
            .intersect(inner_window);
        let mapped = root_to_local.map_range(root_compile_range);
        let local_compile_range = if mapped.is_empty() || !mapped.overlaps(local_clamp_range) {
            local_clamp_range.coerce_inclusive()
        } else {
            mapped.intersect(local_clamp_range)
        };
        Some(Self {
            sequence_id,
            root_to_local,
            node_transform,
            hierarchical_bias: self.hierarchical_bias + bias,
            root_compile_range,
            root_clamp_range,
            local_compile_range,
            local_clamp_range,
            depth: self.depth + 1,
        })
    }

    /// Local range → root range, clamped. Single frames that floor away are kept inclusive.
    pub(crate) fn local_to_root(&self, local: TimeRange) -> TimeRange {
        if local.is_empty() {
            return TimeRange::default();
        }
        self.root_to_local
            .inverse()
            .map_range(local)
            .coerce_inclusive()
            .intersect(self.root_clamp_range)
    }

    /// Local frame → root frame when it lies in the clamp range.
    pub(crate) fn local_frame_to_root(&self, f: FrameNumber) -> Option<FrameNumber> {
        let root = FrameNumber(floor_to_frame(
            self.root_to_local.inverse().apply(f.0 as f64),
        ));
        self.root_clamp_range.contains(root).then_some(root)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compile/gather.rs"]
mod tests;
