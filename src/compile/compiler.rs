use crate::compile::data::{CompiledData, Snapshot};
use crate::compile::field::{FieldSegment, build_partition};
use crate::compile::gather::GatherParameters;
use crate::compile::hierarchy::SequenceHierarchyNode;
use crate::foundation::error::{TemporaError, TemporaResult};
use crate::foundation::ids::SequenceId;
use crate::foundation::time::{FrameNumber, TimeRange};
use crate::foundation::transform::TimeTransform;
use crate::model::library::SequenceLibrary;
use crate::model::provider::ProvidedEntity;
use crate::model::sequence::{Sequence, SequenceKey, SubSection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Compiler limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOpts {
    /// Upper bound on loop iterations enumerated by one compile call.
    pub max_loop_iterations: u32,
    /// Upper bound on sub-sequence nesting (catches self-referencing sequences).
    pub max_hierarchy_depth: u32,
    /// Half-width in frames of the window compiled on demand around an uncompiled frame.
    pub lazy_compile_window: i64,
}

impl Default for CompilerOpts {
    fn default() -> Self {
        Self {
            max_loop_iterations: 100_000,
            max_hierarchy_depth: 64,
            lazy_compile_window: 600,
        }
    }
}

impl CompilerOpts {
    pub(crate) fn validate(&self) -> TemporaResult<()> {
        if self.max_hierarchy_depth == 0 || self.lazy_compile_window <= 0 {
            return Err(TemporaError::validation(
                "compiler max_hierarchy_depth and lazy_compile_window must be > 0",
            ));
        }
        Ok(())
    }
}

/// Diagnostics of one or more compile calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompileReport {
    /// Root-time window of every loop iteration that was recursed into.
    pub loop_windows: Vec<(SequenceId, TimeRange)>,
    /// Looping sub-sequences skipped because enumeration would be unbounded.
    pub skipped_open_loops: Vec<SequenceId>,
    /// Sub-sequence assets that could not be found.
    pub missing_assets: Vec<SequenceKey>,
}

impl CompileReport {
    pub(crate) fn merge(&mut self, other: &Self) {
        self.loop_windows.extend_from_slice(&other.loop_windows);
        self.skipped_open_loops.extend_from_slice(&other.skipped_open_loops);
        for key in &other.missing_assets {
            if !self.missing_assets.contains(key) {
                self.missing_assets.push(key.clone());
            }
        }
    }
}

struct GatherState<'d> {
    snapshots: &'d mut BTreeMap<SequenceKey, Snapshot>,
    segments: Vec<(TimeRange, FieldSegment)>,
    sequences: Vec<(TimeRange, SequenceId)>,
    fences: Vec<FrameNumber>,
    nodes: Vec<(SequenceId, SequenceHierarchyNode)>,
    sources: Vec<(SequenceId, Arc<Sequence>)>,
    report: CompileReport,
    loop_iterations: u32,
}

/// Turns a sequence tree into an [`EvaluationField`](crate::EvaluationField).
pub struct Compiler<'a> {
    library: &'a SequenceLibrary,
    opts: CompilerOpts,
}

impl<'a> Compiler<'a> {
    /// Compiler reading assets from `library`.
    pub fn new(library: &'a SequenceLibrary, opts: CompilerOpts) -> Self {
        Self { library, opts }
    }

    /// Compile `root` over `compile_range` from scratch.
    #[tracing::instrument(skip(self), fields(root = %root.0))]
    pub fn compile(&self, root: &SequenceKey, compile_range: TimeRange) -> TemporaResult<CompiledData> {
        self.opts.validate()?;
        let sequence = self.library.get(root).ok_or_else(|| {
            TemporaError::validation(format!("unknown root sequence '{}'", root.0))
        })?;
        let mut data = CompiledData::new(root.clone(), sequence)?;
        self.compile_range(&mut data, compile_range)?;
        Ok(data)
    }

    /// Fill the uncompiled parts of `range`. Already compiled ranges are left untouched, so
    /// repeating a call is a no-op.
    #[tracing::instrument(skip(self, data), fields(root = %data.root.0))]
    pub fn compile_range(&self, data: &mut CompiledData, range: TimeRange) -> TemporaResult<CompileReport> {
        let mut report = CompileReport::default();
        let root = data.root_source()?;
        for gap in data.field.gaps(range) {
            let mut st = GatherState {
                snapshots: &mut data.snapshots,
                segments: Vec::new(),
                sequences: Vec::new(),
                fences: Vec::new(),
                nodes: Vec::new(),
                sources: Vec::new(),
                report: CompileReport::default(),
                loop_iterations: 0,
            };
            self.gather(&GatherParameters::root(gap), &root, &mut st)?;

            let GatherState {
                segments,
                sequences,
                fences,
                nodes,
                sources,
                report: gap_report,
                ..
            } = st;
            for (id, node) in nodes {
                data.hierarchy.add(id, node)?;
            }
            data.hierarchy.validate()?;
            for (id, seq) in sources {
                data.sources.entry(id).or_insert(seq);
            }
            for (r, entry) in build_partition(gap, &segments, &sequences) {
                data.has_one_shots |= entry.has_one_shots();
                data.field.insert(r, entry)?;
            }
            data.fences.extend(fences);
            data.fences.sort_unstable();
            data.fences.dedup();
            tracing::debug!(
                gap = ?gap,
                segments = segments.len(),
                sub_sequences = data.hierarchy.len(),
                "compiled field gap"
            );
            report.merge(&gap_report);
        }
        data.report.merge(&report);
        Ok(report)
    }

    fn resolve(&self, key: &SequenceKey, st: &mut GatherState<'_>) -> TemporaResult<Option<Arc<Sequence>>> {
        if let Some(s) = st.snapshots.get(key) {
            return Ok(s.sequence.clone());
        }
        let sequence = self.library.get(key);
        let signature = sequence.as_deref().map(Sequence::signature).transpose()?;
        st.snapshots.insert(
            key.clone(),
            Snapshot {
                sequence: sequence.clone(),
                signature,
            },
        );
        Ok(sequence)
    }

    fn push_fence(params: &GatherParameters, f: FrameNumber, st: &mut GatherState<'_>) {
        if !params.local_compile_range.intersect(params.local_clamp_range).contains(f) {
            return;
        }
        if let Some(root) = params.local_frame_to_root(f)
            && params.root_compile_range.contains(root)
        {
            st.fences.push(root);
        }
    }

    fn gather(&self, params: &GatherParameters, seq: &Arc<Sequence>, st: &mut GatherState<'_>) -> TemporaResult<()> {
        if params.depth > self.opts.max_hierarchy_depth {
            return Err(TemporaError::compile(format!(
                "sequence '{}' nested deeper than {} levels (recursive sub-sequence?)",
                seq.name, self.opts.max_hierarchy_depth
            )));
        }
        st.sources.push((params.sequence_id, Arc::clone(seq)));

        for f in &seq.determinism_fences {
            Self::push_fence(params, *f, st);
        }

        let mut provided: Vec<ProvidedEntity> = Vec::new();
        let mut fences: Vec<FrameNumber> = Vec::new();
        for track in &seq.tracks {
            for section in &track.sections {
                let effective = section
                    .range
                    .intersect(params.local_clamp_range)
                    .intersect(params.local_compile_range);
                if effective.is_empty() {
                    continue;
                }
                let provider = section.payload.provider();
                provided.clear();
                provider.populate_evaluation_field(track, section, effective, &mut provided);
                for p in &provided {
                    let root = params.local_to_root(p.range.intersect(effective));
                    if root.is_empty() {
                        continue;
                    }
                    st.segments.push((
                        root,
                        FieldSegment {
                            sequence: params.sequence_id,
                            track: track.id,
                            section: section.id,
                            entity_index: p.entity_index,
                            group_priority: track.group_priority,
                            hierarchical_bias: params.hierarchical_bias,
                            eval_priority: track.eval_priority,
                            requires_init: p.requires_init,
                            one_shot: p.one_shot,
                        },
                    ));
                }
                fences.clear();
                provider.determinism_fences(section, &mut fences);
                for f in &fences {
                    Self::push_fence(params, *f, st);
                }
            }
        }

        for sub in &seq.sub_sections {
            self.gather_sub(params, sub, st)?;
        }
        Ok(())
    }

    fn gather_sub(&self, params: &GatherParameters, sub: &SubSection, st: &mut GatherState<'_>) -> TemporaResult<()> {
        let child_id = params.sequence_id.accumulate(sub.id);
        let section_local = sub.range.intersect(params.local_clamp_range);
        if section_local.is_empty() {
            return Ok(());
        }
        let section_root = params.local_to_root(section_local);
        let pre_roll = match sub.range.start {
            Some(s) if sub.pre_roll_frames > 0 => params.local_to_root(TimeRange {
                start: Some(s.offset(-sub.pre_roll_frames)),
                end: Some(s),
            }),
            _ => TimeRange::default(),
        };
        let post_roll = match sub.range.end {
            Some(e) if sub.post_roll_frames > 0 => params.local_to_root(TimeRange {
                start: Some(e),
                end: Some(e.offset(sub.post_roll_frames)),
            }),
            _ => TimeRange::default(),
        };

        let child = self.resolve(&sub.sequence, st)?;
        let inner_play = child
            .as_ref()
            .map_or(TimeRange::from_start(0), |c| c.play_range);
        let len = sub.loop_length(inner_play);
        let looping = sub.can_loop && len.is_some();
        let node_transform = params.node_transform.then(&sub.node_transform(inner_play));

        st.nodes.push((
            child_id,
            SequenceHierarchyNode {
                parent: params.sequence_id,
                sequence: sub.sequence.clone(),
                sub_section: sub.id,
                root_to_sequence: node_transform.clone(),
                hierarchical_bias: params.hierarchical_bias + sub.hierarchical_bias,
                play_range: sub.inner_window(inner_play),
                root_range: section_root,
                pre_roll_ranges: [pre_roll].into_iter().filter(|r| !r.is_empty()).collect(),
                post_roll_ranges: [post_roll].into_iter().filter(|r| !r.is_empty()).collect(),
                is_looping: looping,
                missing: child.is_none(),
            },
        ));
        for r in [pre_roll, post_roll] {
            if !r.is_empty() {
                st.sequences.push((r, child_id));
            }
        }

        let Some(child) = child else {
            tracing::warn!(
                sequence = %sub.sequence.0,
                sub_section = sub.id.0,
                "sub-sequence asset missing, evaluating as empty"
            );
            if !st.report.missing_assets.contains(&sub.sequence) {
                st.report.missing_assets.push(sub.sequence.clone());
            }
            st.sequences.push((section_root, child_id));
            return Ok(());
        };

        match (sub.can_loop, len) {
            (true, Some(len)) => self.gather_loops(
                params,
                sub,
                &child,
                child_id,
                &node_transform,
                len,
                section_local,
                st,
            ),
            _ => {
                if sub.can_loop {
                    tracing::warn!(
                        sub_section = sub.id.0,
                        "looping sub-section has an open or empty inner window, playing once"
                    );
                }
                st.sequences.push((section_root, child_id));
                if let Some(cp) = params.child(
                    child_id,
                    sub.outer_to_inner(inner_play),
                    node_transform,
                    section_root,
                    sub.inner_window(inner_play),
                    sub.hierarchical_bias,
                ) {
                    self.gather(&cp, &child, st)?;
                }
                Ok(())
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn gather_loops(
        &self,
        params: &GatherParameters,
        sub: &SubSection,
        child: &Arc<Sequence>,
        child_id: SequenceId,
        node_transform: &TimeTransform,
        len: i64,
        section_local: TimeRange,
        st: &mut GatherState<'_>,
    ) -> TemporaResult<()> {
        let requested = section_local.intersect(params.local_compile_range);
        if requested.is_empty() {
            return Ok(());
        }
        if !requested.is_bounded() {
            tracing::warn!(
                sub_section = sub.id.0,
                "open-ended looping sub-sequence skipped: loop count is unbounded"
            );
            st.report.skipped_open_loops.push(child_id);
            return Ok(());
        }
        let inner_play = child.play_range;
        let inner_window = sub.inner_window(inner_play);
        let unwrapped = sub.outer_to_unwrapped().map_range(requested);
        let mut k = unwrapped.start_key().div_euclid(len).max(0);
        loop {
            let window = sub.loop_window(len, k).intersect(section_local);
            if window.start_key() >= requested.end_key() {
                break;
            }
            st.loop_iterations += 1;
            if st.loop_iterations > self.opts.max_loop_iterations {
                return Err(TemporaError::runaway(format!(
                    "more than {} loop iterations while compiling sub-section {}",
                    self.opts.max_loop_iterations, sub.id.0
                )));
            }
            if window.overlaps(requested) {
                let window_root = params.local_to_root(window);
                st.report.loop_windows.push((child_id, window_root));
                st.sequences.push((window_root, child_id));
                if let Some(cp) = params.child(
                    child_id,
                    sub.loop_transform(inner_play, len, k),
                    node_transform.clone(),
                    window_root,
                    inner_window,
                    sub.hierarchical_bias,
                ) {
                    self.gather(&cp, child, st)?;
                }
            }
            k += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compile/compiler.rs"]
mod tests;
