use crate::ecs::linker::Linker;
use crate::ecs::registry::ComponentMask;
use crate::ecs::system::{Phase, SystemContext};
use crate::foundation::error::{TemporaError, TemporaResult};
use crate::foundation::ids::InstanceHandle;
use crate::instance::context::{EvaluationContext, PlaybackStatus};
use crate::instance::registry::update_root;
use crate::model::sequence::SequenceKey;
use crate::player::PlaybackContext;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Options controlling [`Runner::flush`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerOpts {
    /// Upper bound on drain iterations of one flush (requeue guard).
    pub max_flush_iterations: u32,
    /// Upper bound on sub-ranges one queued update may be dissected into.
    pub max_dissections: u32,
    /// Upper bound on nested flushes started from event handlers.
    pub max_reentrancy_depth: u32,
    /// Run phases on a dedicated rayon thread pool.
    pub parallel: bool,
    /// Override the number of rayon worker threads. `None` uses rayon defaults.
    pub threads: Option<usize>,
}

impl Default for RunnerOpts {
    fn default() -> Self {
        Self {
            max_flush_iterations: 64,
            max_dissections: 1024,
            max_reentrancy_depth: 4,
            parallel: false,
            threads: None,
        }
    }
}

impl RunnerOpts {
    fn validate(&self) -> TemporaResult<()> {
        if self.max_flush_iterations == 0 || self.max_dissections == 0 {
            return Err(TemporaError::validation(
                "runner max_flush_iterations and max_dissections must be >= 1",
            ));
        }
        Ok(())
    }
}

fn build_thread_pool(threads: Option<usize>) -> TemporaResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(TemporaError::validation(
            "runner 'threads' must be >= 1 when set",
        ));
    }
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| TemporaError::precondition(format!("failed to build rayon thread pool: {e}")))
}

/// Phase the runner is currently in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerState {
    /// Between cycles.
    #[default]
    None,
    /// Spawn phase.
    Spawn,
    /// Instantiation phase.
    Instantiation,
    /// Evaluation phase.
    Evaluation,
    /// Finalization phase.
    Finalization,
}

impl From<Phase> for RunnerState {
    fn from(p: Phase) -> Self {
        match p {
            Phase::Spawn => Self::Spawn,
            Phase::Instantiation => Self::Instantiation,
            Phase::Evaluation => Self::Evaluation,
            Phase::Finalization => Self::Finalization,
        }
    }
}

/// Statistics of one flush.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Drain iterations.
    pub iterations: u32,
    /// Phase cycles run.
    pub cycles: u32,
    /// Extra sub-ranges created by fence dissection.
    pub dissections: u32,
    /// Entities imported.
    pub linked: usize,
    /// Entities scheduled for unlinking.
    pub unlinked: usize,
    /// Events dispatched to the player.
    pub events: usize,
    /// Nested flushes run from event handlers.
    pub nested_flushes: u32,
}

type Round = Vec<(InstanceHandle, EvaluationContext)>;

/// Drives queued instance updates through the evaluation phases of a [`Linker`].
#[derive(Debug)]
pub struct Runner {
    opts: RunnerOpts,
    pool: Option<Arc<rayon::ThreadPool>>,
    queue: Vec<(InstanceHandle, EvaluationContext)>,
    state: RunnerState,
    depth: u32,
}

impl Runner {
    /// Runner with validated options.
    pub fn new(opts: RunnerOpts) -> TemporaResult<Self> {
        opts.validate()?;
        let pool = if opts.parallel {
            Some(Arc::new(build_thread_pool(opts.threads)?))
        } else {
            None
        };
        Ok(Self {
            opts,
            pool,
            queue: Vec::new(),
            state: RunnerState::None,
            depth: 0,
        })
    }

    fn nested(&self) -> Self {
        Self {
            opts: self.opts,
            pool: self.pool.clone(),
            queue: Vec::new(),
            state: RunnerState::None,
            depth: self.depth + 1,
        }
    }

    /// Options.
    pub fn opts(&self) -> &RunnerOpts {
        &self.opts
    }

    /// Current phase.
    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// Number of queued updates.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Return `true` when an update for `instance` is queued.
    pub fn has_queued(&self, instance: InstanceHandle) -> bool {
        self.queue.iter().any(|(h, _)| *h == instance)
    }

    /// Queue an update of a root instance to `ctx`.
    pub fn queue_update(&mut self, instance: InstanceHandle, ctx: EvaluationContext) {
        self.queue.push((instance, ctx));
    }

    /// Drain the queue, including work queued while draining.
    #[tracing::instrument(skip_all, fields(depth = self.depth, queued = self.queue.len()))]
    pub fn flush(&mut self, linker: &mut Linker, player: &mut dyn PlaybackContext) -> TemporaResult<FlushReport> {
        if linker.evaluating && linker.open_windows == 0 {
            tracing::warn!("flush rejected: linker is evaluating and no re-entrancy window is open");
            return Err(TemporaError::reentrancy(
                "a runner is already evaluating this linker",
            ));
        }
        let mut report = FlushReport::default();
        while !self.queue.is_empty() || linker.pending_structural {
            report.iterations += 1;
            if report.iterations > self.opts.max_flush_iterations {
                return Err(TemporaError::runaway(format!(
                    "flush did not settle after {} iterations; updates keep being requeued",
                    self.opts.max_flush_iterations
                )));
            }
            let batch = std::mem::take(&mut self.queue);
            let rounds = self.dissect(linker, batch, &mut report)?;
            if rounds.is_empty() {
                self.run_cycle(linker, player, &[], &mut report)?;
            }
            for round in rounds {
                self.run_cycle(linker, player, &round, &mut report)?;
            }
        }
        Ok(report)
    }

    /// Finish a root instance: its entities are unlinked and released at the next flush.
    /// Queued updates of the instance are flushed first.
    pub fn finish_instance(
        &mut self,
        linker: &mut Linker,
        player: &mut dyn PlaybackContext,
        instance: InstanceHandle,
    ) -> TemporaResult<()> {
        if self.has_queued(instance) {
            self.flush(linker, player)?;
        }
        linker.instances.finish_root(instance, &mut linker.store)?;
        linker.pending_structural = true;
        Ok(())
    }

    /// Split queued updates at determinism fences and arrange them in rounds: round `i` holds
    /// the `i`-th sub-range of every instance, so sub-ranges run in ascending time order.
    fn dissect(&self, linker: &Linker, batch: Round, report: &mut FlushReport) -> TemporaResult<Vec<Round>> {
        let mut per_instance: BTreeMap<InstanceHandle, Vec<EvaluationContext>> = BTreeMap::new();
        for (h, ctx) in batch {
            let compiled = linker.instances.require(h)?.compiled;
            let pieces = match linker.compiled.get(compiled) {
                Some(data) if ctx.status == PlaybackStatus::Playing => {
                    let (a, b) = (ctx.from.frame(), ctx.to.frame());
                    ctx.dissect(data.fences_between(a.min(b), a.max(b)))
                }
                _ => vec![ctx],
            };
            if pieces.len() > self.opts.max_dissections as usize {
                return Err(TemporaError::runaway(format!(
                    "update of instance {} dissected into {} ranges (max {})",
                    h.0,
                    pieces.len(),
                    self.opts.max_dissections
                )));
            }
            report.dissections += pieces.len().saturating_sub(1) as u32;
            per_instance.entry(h).or_default().extend(pieces);
        }
        let rounds = per_instance.values().map(Vec::len).max().unwrap_or(0);
        Ok((0..rounds)
            .map(|i| {
                per_instance
                    .iter()
                    .filter_map(|(h, v)| v.get(i).map(|c| (*h, *c)))
                    .collect()
            })
            .collect())
    }

    fn run_cycle(
        &mut self,
        linker: &mut Linker,
        player: &mut dyn PlaybackContext,
        round: &[(InstanceHandle, EvaluationContext)],
        report: &mut FlushReport,
    ) -> TemporaResult<()> {
        let was_evaluating = std::mem::replace(&mut linker.evaluating, true);
        let mut result = self.run_phases(linker, player, round, report);
        linker.store.unlock();
        self.state = RunnerState::None;
        if result.is_ok() {
            result = self.dispatch_events(linker, player, report);
        }
        linker.evaluating = was_evaluating;
        result
    }

    fn run_phases(
        &mut self,
        linker: &mut Linker,
        player: &mut dyn PlaybackContext,
        round: &[(InstanceHandle, EvaluationContext)],
        report: &mut FlushReport,
    ) -> TemporaResult<()> {
        report.cycles += 1;
        {
            let mut env = linker.update_env();
            for (h, ctx) in round {
                let outcome = update_root(*h, ctx, &mut env)?;
                report.linked += outcome.linked;
                report.unlinked += outcome.unlinked;
            }
        }
        let touched = self.touched_instances(linker, round);
        for h in &touched {
            player.pre_evaluation(*h);
        }
        linker.pending_structural = false;

        for phase in Phase::ALL {
            self.state = phase.into();
            if matches!(phase, Phase::Spawn | Phase::Evaluation) {
                linker.systems.update_links(&linker.store)?;
            }
            if phase == Phase::Evaluation {
                linker.store.lock();
            }
            self.run_phase(linker, player, phase)?;
            match phase {
                Phase::Instantiation => release_unlinked(linker),
                Phase::Evaluation => linker.store.unlock(),
                _ => {}
            }
        }

        for h in &touched {
            player.post_evaluation(*h);
        }
        Ok(())
    }

    fn touched_instances(&self, linker: &Linker, round: &[(InstanceHandle, EvaluationContext)]) -> Vec<InstanceHandle> {
        let mut out = Vec::new();
        for (root, _) in round {
            out.push(*root);
            out.extend(
                linker
                    .instances
                    .children(*root)
                    .into_iter()
                    .filter(|h| linker.instances.get(*h).is_some_and(|i| !i.is_finished())),
            );
        }
        out
    }

    fn run_phase(&self, linker: &mut Linker, player: &mut dyn PlaybackContext, phase: Phase) -> TemporaResult<()> {
        let Linker {
            builtins,
            store,
            systems,
            instances,
            blend,
            spawns,
            events,
            ..
        } = linker;
        let mut cx = SystemContext {
            store,
            player,
            instances,
            blend,
            events,
            spawns,
            builtins: *builtins,
            phase,
            parallel: self.pool.is_some(),
        };
        tracing::debug!(?phase, depth = self.depth, "phase");
        match &self.pool {
            Some(pool) => pool.install(|| systems.run_phase(&mut cx)),
            None => systems.run_phase(&mut cx),
        }
    }

    fn dispatch_events(
        &mut self,
        linker: &mut Linker,
        player: &mut dyn PlaybackContext,
        report: &mut FlushReport,
    ) -> TemporaResult<()> {
        if linker.events.is_empty() {
            return Ok(());
        }
        let events = std::mem::take(&mut linker.events);
        report.events += events.len();
        linker.open_windows += 1;
        let mut scope = EventScope {
            runner: self.nested(),
            linker,
            nested_flushes: 0,
        };
        let result = player.handle_events(&events, &mut scope);
        let EventScope {
            runner,
            linker,
            nested_flushes,
        } = scope;
        linker.open_windows -= 1;
        report.nested_flushes += nested_flushes;
        // Work queued by handlers but not flushed by them runs in this flush.
        self.queue.extend(runner.queue);
        result
    }
}

/// Free entities tagged for unlinking and clear link tags; runs after the instantiation systems.
fn release_unlinked(linker: &mut Linker) {
    let b = linker.builtins;
    let store = &mut linker.store;
    let unlinked = store.query(ComponentMask::EMPTY.with(b.needs_unlink), ComponentMask::EMPTY);
    for e in &unlinked {
        store.despawn(*e);
    }
    for e in store.query(ComponentMask::EMPTY.with(b.needs_link), ComponentMask::EMPTY) {
        store.remove_type(e, b.needs_link);
    }
    if !unlinked.is_empty() {
        store.compact();
        tracing::debug!(freed = unlinked.len(), "released unlinked entities");
    }
}

/// Re-entrancy window handed to [`PlaybackContext::handle_events`].
///
/// Handlers may start sequences, queue updates and flush them recursively, up to
/// [`RunnerOpts::max_reentrancy_depth`] levels deep.
pub struct EventScope<'a> {
    runner: Runner,
    linker: &'a mut Linker,
    nested_flushes: u32,
}

impl EventScope<'_> {
    /// The linker being evaluated.
    pub fn linker(&self) -> &Linker {
        self.linker
    }

    /// Nesting depth of flushes started from this scope.
    pub fn depth(&self) -> u32 {
        self.runner.depth
    }

    /// Create a root instance.
    pub fn play(&mut self, key: &SequenceKey) -> TemporaResult<InstanceHandle> {
        self.linker.play(key)
    }

    /// Queue an update; it runs at the next nested flush or after the handler returns.
    pub fn queue_update(&mut self, instance: InstanceHandle, ctx: EvaluationContext) {
        self.runner.queue_update(instance, ctx);
    }

    /// Finish a root instance.
    pub fn finish(&mut self, player: &mut dyn PlaybackContext, instance: InstanceHandle) -> TemporaResult<()> {
        self.runner.finish_instance(self.linker, player, instance)
    }

    /// Flush queued work recursively inside the open window.
    pub fn flush(&mut self, player: &mut dyn PlaybackContext) -> TemporaResult<FlushReport> {
        if self.runner.depth > self.runner.opts.max_reentrancy_depth {
            tracing::warn!(
                depth = self.runner.depth,
                max = self.runner.opts.max_reentrancy_depth,
                "nested flush rejected"
            );
            return Err(TemporaError::reentrancy(format!(
                "nested flush depth {} exceeds {}",
                self.runner.depth, self.runner.opts.max_reentrancy_depth
            )));
        }
        self.nested_flushes += 1;
        self.runner.flush(self.linker, player)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/ecs/runner.rs"]
mod tests;
