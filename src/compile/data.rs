use crate::compile::compiler::{CompileReport, Compiler, CompilerOpts};
use crate::compile::field::EvaluationField;
use crate::compile::hierarchy::SequenceHierarchy;
use crate::foundation::error::{TemporaError, TemporaResult};
use crate::foundation::hash::{Signature, StableHasher};
use crate::foundation::ids::SequenceId;
use crate::foundation::time::{FrameNumber, TimeRange};
use crate::model::library::SequenceLibrary;
use crate::model::sequence::{Sequence, SequenceKey};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Source snapshot a compile was built from.
#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    pub(crate) sequence: Option<Arc<Sequence>>,
    pub(crate) signature: Option<Signature>,
}

/// Compiled field, hierarchy and fences of one root sequence.
///
/// A derived cache: valid while the signatures of every sequence it was built from match the
/// library, rebuilt wholesale otherwise.
#[derive(Debug, Clone)]
pub struct CompiledData {
    pub(crate) root: SequenceKey,
    pub(crate) hierarchy: SequenceHierarchy,
    pub(crate) field: EvaluationField,
    pub(crate) fences: Vec<FrameNumber>,
    pub(crate) sources: BTreeMap<SequenceId, Arc<Sequence>>,
    pub(crate) snapshots: BTreeMap<SequenceKey, Snapshot>,
    pub(crate) report: CompileReport,
    pub(crate) has_one_shots: bool,
    pub(crate) generation: u64,
}

impl CompiledData {
    pub(crate) fn new(root: SequenceKey, sequence: Arc<Sequence>) -> TemporaResult<Self> {
        let signature = sequence.signature()?;
        let mut snapshots = BTreeMap::new();
        snapshots.insert(
            root.clone(),
            Snapshot {
                sequence: Some(Arc::clone(&sequence)),
                signature: Some(signature),
            },
        );
        let mut sources = BTreeMap::new();
        sources.insert(SequenceId::ROOT, sequence);
        Ok(Self {
            root,
            hierarchy: SequenceHierarchy::default(),
            field: EvaluationField::default(),
            fences: Vec::new(),
            sources,
            snapshots,
            report: CompileReport::default(),
            has_one_shots: false,
            generation: 0,
        })
    }

    pub(crate) fn root_source(&self) -> TemporaResult<Arc<Sequence>> {
        self.sources
            .get(&SequenceId::ROOT)
            .cloned()
            .ok_or_else(|| TemporaError::compile("compiled data lost its root source"))
    }

    /// Root sequence key.
    pub fn root(&self) -> &SequenceKey {
        &self.root
    }

    /// Combined signature of every source snapshot, in key order.
    pub fn signature(&self) -> Signature {
        let mut h = StableHasher::new();
        for (key, snap) in &self.snapshots {
            h.write_str(&key.0);
            match snap.signature {
                Some(s) => {
                    h.write_u64(s.hi);
                    h.write_u64(s.lo);
                }
                None => h.write_u32(0),
            }
        }
        h.finish()
    }

    /// Compiled hierarchy.
    pub fn hierarchy(&self) -> &SequenceHierarchy {
        &self.hierarchy
    }

    /// Compiled field.
    pub fn field(&self) -> &EvaluationField {
        &self.field
    }

    /// Root-time determinism fences, ascending.
    pub fn fences(&self) -> &[FrameNumber] {
        &self.fences
    }

    /// Number of wholesale rebuilds since first compiled. Every root sharing the data compares
    /// it against the generation its entities were linked from.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Accumulated compile diagnostics.
    pub fn report(&self) -> &CompileReport {
        &self.report
    }

    /// Source snapshot of a compiled node.
    pub fn source(&self, id: SequenceId) -> Option<&Arc<Sequence>> {
        self.sources.get(&id)
    }

    /// Return `true` when any source is marked volatile.
    pub fn is_volatile(&self) -> bool {
        self.snapshots
            .values()
            .any(|s| s.sequence.as_ref().is_some_and(|q| q.volatile))
    }

    /// Return `true` when any source changed (or appeared/disappeared) in `library`.
    pub fn is_stale(&self, library: &SequenceLibrary) -> TemporaResult<bool> {
        for (key, snap) in &self.snapshots {
            let current = library.get(key).map(|s| s.signature()).transpose()?;
            if current != snap.signature {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Fences strictly inside `(from, to]`, ascending.
    pub fn fences_between(&self, from: FrameNumber, to: FrameNumber) -> &[FrameNumber] {
        let lo = self.fences.partition_point(|f| *f <= from);
        let hi = self.fences.partition_point(|f| *f <= to);
        &self.fences[lo..hi.max(lo)]
    }
}

/// Handle of compiled data inside a [`CompiledDataManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompiledDataId(pub u32);

/// Cache of compiled data per root sequence key.
#[derive(Debug, Default)]
pub struct CompiledDataManager {
    entries: Vec<CompiledData>,
    by_key: HashMap<SequenceKey, CompiledDataId>,
    opts: CompilerOpts,
}

impl CompiledDataManager {
    /// Empty manager.
    pub fn new(opts: CompilerOpts) -> Self {
        Self {
            entries: Vec::new(),
            by_key: HashMap::new(),
            opts,
        }
    }

    /// Compiler options.
    pub fn opts(&self) -> &CompilerOpts {
        &self.opts
    }

    fn initial_range(sequence: &Sequence) -> TimeRange {
        if sequence.play_range.is_bounded() {
            sequence.play_range
        } else {
            TimeRange::default()
        }
    }

    /// Id of the compiled data for `key`, compiling its play range on first use.
    pub fn get_or_compile(&mut self, library: &SequenceLibrary, key: &SequenceKey) -> TemporaResult<CompiledDataId> {
        if let Some(id) = self.by_key.get(key) {
            return Ok(*id);
        }
        let data = self.compile_fresh(library, key)?;
        let id = CompiledDataId(self.entries.len() as u32);
        self.entries.push(data);
        self.by_key.insert(key.clone(), id);
        Ok(id)
    }

    fn compile_fresh(&self, library: &SequenceLibrary, key: &SequenceKey) -> TemporaResult<CompiledData> {
        let sequence = library.get(key).ok_or_else(|| {
            TemporaError::validation(format!("unknown root sequence '{}'", key.0))
        })?;
        Compiler::new(library, self.opts).compile(key, Self::initial_range(&sequence))
    }

    /// Compiled data by id.
    pub fn get(&self, id: CompiledDataId) -> Option<&CompiledData> {
        self.entries.get(id.0 as usize)
    }

    /// Compiled data by id, or a precondition error.
    pub fn require(&self, id: CompiledDataId) -> TemporaResult<&CompiledData> {
        self.get(id).ok_or_else(|| {
            TemporaError::precondition(format!("compiled data {} does not exist", id.0))
        })
    }

    fn require_mut(&mut self, id: CompiledDataId) -> TemporaResult<&mut CompiledData> {
        self.entries.get_mut(id.0 as usize).ok_or_else(|| {
            TemporaError::precondition(format!("compiled data {} does not exist", id.0))
        })
    }

    /// Make sure `range` is compiled.
    pub fn ensure_range(&mut self, library: &SequenceLibrary, id: CompiledDataId, range: TimeRange) -> TemporaResult<()> {
        let opts = self.opts;
        let data = self.require_mut(id)?;
        if data.field.covers(range) {
            return Ok(());
        }
        Compiler::new(library, opts).compile_range(data, range)?;
        Ok(())
    }

    /// Make sure the frame `f` is compiled, compiling a window around it on demand.
    pub fn ensure_frame(&mut self, library: &SequenceLibrary, id: CompiledDataId, f: FrameNumber) -> TemporaResult<()> {
        let w = self.opts.lazy_compile_window;
        let window = TimeRange {
            start: Some(f.offset(-w)),
            end: Some(f.offset(w)),
        };
        if self.require(id)?.field.find(f).is_some() {
            return Ok(());
        }
        self.ensure_range(library, id, window)
    }

    /// Rebuild `id` wholesale from the current library contents.
    pub fn recompile(&mut self, library: &SequenceLibrary, id: CompiledDataId) -> TemporaResult<()> {
        let key = self.require(id)?.root.clone();
        let mut fresh = self.compile_fresh(library, &key)?;
        let data = self.require_mut(id)?;
        fresh.generation = data.generation + 1;
        *data = fresh;
        tracing::debug!(root = %key.0, "recompiled stale sequence");
        Ok(())
    }

    /// Rebuild `id` when any source signature changed. Returns `true` when rebuilt.
    pub fn recompile_if_stale(&mut self, library: &SequenceLibrary, id: CompiledDataId) -> TemporaResult<bool> {
        if !self.require(id)?.is_stale(library)? {
            return Ok(false);
        }
        self.recompile(library, id)?;
        Ok(true)
    }
}
