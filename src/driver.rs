//! The analysis driver: schedules compilation events across a worker pool,
//! fans each event out to every analyzer, and merges the run's diagnostics
//! into the aggregated results.
//!
//! The driver is the sole consumer of the event stream. The terminal
//! `Completed` event is withheld until the queue is drained and every
//! analyzer has fully processed the preceding events, so compilation-end
//! actions always observe a finished compilation. Cancellation aborts claimed
//! action sets resumably: a later `run` on the same driver picks up from the
//! unexecuted remainder instead of starting over.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crossbeam::channel;
use dashmap::DashMap;
use log::{debug, info};
use parking_lot::Mutex;
use rayon::prelude::*;

use crate::analyzer::{Analyzer, AnalyzerId};
use crate::cancellation::{CancellationToken, Interrupted};
use crate::context::ExecutionContext;
use crate::diagnostics::{engine_fault, DiagnosticSink, Locality, SuppressionOracle};
use crate::events::CompilationEvent;
use crate::executor::{Executor, SymbolEndOutcome};
use crate::model::{FileId, SemanticOracle, Symbol};
use crate::registry::actions::ActionIdSource;
use crate::registry::{ActionRegistry, GroupedAnalyzerActions};
use crate::results::{AnalysisReport, ResultAggregator};
use crate::scope::AnalysisScope;
use crate::state::{AnalysisState, Entity};
use crate::telemetry::ExecutionTimes;

#[derive(Clone, Debug)]
pub struct AnalysisOptions {
    /// Run analyzers across a worker pool. Serial execution still honors
    /// every claim and ordering rule, so results are identical.
    pub concurrent: bool,
    /// Worker threads for concurrent runs; defaults to the logical CPU count.
    pub worker_count: Option<usize>,
    /// Record per-analyzer callback wall time.
    pub track_timing: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        AnalysisOptions {
            concurrent: true,
            worker_count: None,
            track_timing: false,
        }
    }
}

impl AnalysisOptions {
    pub fn serial() -> Self {
        AnalysisOptions {
            concurrent: false,
            worker_count: Some(1),
            track_timing: false,
        }
    }

    fn effective_workers(&self) -> usize {
        if !self.concurrent {
            return 1;
        }
        self.worker_count.unwrap_or_else(num_cpus::get).max(1)
    }
}

/// How a run ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Cancelled,
}

pub struct AnalyzerDriver {
    analyzers: Vec<Arc<dyn Analyzer>>,
    oracle: Arc<dyn SemanticOracle>,
    options: AnalysisOptions,
    ids: ActionIdSource,
    sink: DiagnosticSink,
    registry: once_cell::sync::OnceCell<ActionRegistry>,
    state: AnalysisState,
    context: ExecutionContext,
    results: ResultAggregator,
    times: ExecutionTimes,
    gates: Vec<Option<Arc<Mutex<()>>>>,
    faults: DashMap<(AnalyzerId, String), ()>,
    /// Whether any run has started; later runs resume prior claim state and
    /// therefore merge results append-only.
    has_run: bool,
}

impl AnalyzerDriver {
    pub fn new(
        analyzers: Vec<Arc<dyn Analyzer>>,
        oracle: Arc<dyn SemanticOracle>,
        options: AnalysisOptions,
    ) -> Self {
        let count = analyzers.len();
        let gates = analyzers
            .iter()
            .map(|analyzer| {
                if analyzer.concurrency_safe() {
                    None
                } else {
                    Some(Arc::new(Mutex::new(())))
                }
            })
            .collect();
        let track_timing = options.track_timing;
        AnalyzerDriver {
            analyzers,
            oracle,
            options,
            ids: ActionIdSource::default(),
            sink: DiagnosticSink::new(),
            registry: once_cell::sync::OnceCell::new(),
            state: AnalysisState::new(count),
            context: ExecutionContext::new(count),
            results: ResultAggregator::new(count),
            times: ExecutionTimes::new(track_timing),
            gates,
            faults: DashMap::new(),
            has_run: false,
        }
    }

    pub fn analyzer_count(&self) -> usize {
        self.analyzers.len()
    }

    pub fn execution_time(&self, analyzer: AnalyzerId) -> std::time::Duration {
        self.times.get(analyzer)
    }

    pub fn results(&self) -> &ResultAggregator {
        &self.results
    }

    /// Aggregated diagnostics of every analyzer, suppression applied.
    pub fn report(&self, suppression: &dyn SuppressionOracle) -> AnalysisReport {
        let names: Vec<&str> = self.analyzers.iter().map(|a| a.name()).collect();
        self.results.report(&names, suppression, |analyzer| {
            if self.times.is_enabled() {
                Some(self.times.get(analyzer).as_nanos() as u64)
            } else {
                None
            }
        })
    }

    /// Drives the event stream to completion (or cancellation) for the given
    /// scope, then merges this run's diagnostics into the stored results.
    pub fn run(
        &mut self,
        events: Vec<CompilationEvent>,
        scope: AnalysisScope,
        cancel: &CancellationToken,
    ) -> RunStatus {
        let registry = self
            .registry
            .get_or_init(|| ActionRegistry::build(&self.analyzers, &self.ids, &self.sink));
        let files = self.oracle.files();
        let has_terminal = events.contains(&CompilationEvent::Completed);
        let pending: Vec<CompilationEvent> = events
            .into_iter()
            .filter(|event| *event != CompilationEvent::Completed)
            .collect();

        let executor = Executor {
            analyzers: &self.analyzers,
            registry,
            state: &self.state,
            context: &self.context,
            oracle: self.oracle.as_ref(),
            sink: &self.sink,
            gates: &self.gates,
            times: &self.times,
            cancel,
            scope: &scope,
            ids: &self.ids,
            faults: &self.faults,
        };

        info!(
            "analysis run: {} analyzers, {} events, {} workers",
            self.analyzers.len(),
            pending.len(),
            self.options.effective_workers()
        );

        let sessions = match build_sessions(&executor, self.analyzers.len()) {
            Ok(sessions) => sessions,
            Err(Interrupted) => {
                self.merge_run(&scope, &files, false);
                return RunStatus::Cancelled;
            }
        };

        run_passes(
            &executor,
            &sessions,
            &files,
            &pending,
            self.options.effective_workers(),
        );

        if cancel.is_cancelled() {
            self.merge_run(&scope, &files, false);
            info!("analysis run cancelled");
            return RunStatus::Cancelled;
        }

        // Terminal phase: every non-terminal event is fully processed, so
        // compilation-end actions observe a finished compilation.
        if has_terminal && scope.is_full_compilation() {
            for index in 0..sessions.len() {
                let analyzer = AnalyzerId(index as u32);
                executor.execute_compilation_end(analyzer, &sessions[index]);
            }
            if !cancel.is_cancelled() {
                debug_assert!(
                    !self.context.has_pending_dependencies(),
                    "deferred symbol-end actions survived a completed run"
                );
                debug_assert!(
                    !self.state.any_pending_work(),
                    "claimed or resumable entities survived a completed run"
                );
            }
        }

        let completed = !cancel.is_cancelled();
        self.merge_run(&scope, &files, completed);
        if completed {
            info!(
                "analysis run complete: {} diagnostics stored",
                self.results.diagnostic_count()
            );
            RunStatus::Completed
        } else {
            RunStatus::Cancelled
        }
    }

    fn merge_run(&mut self, scope: &AnalysisScope, files: &[FileId], completed: bool) {
        let first_run = !self.has_run;
        self.has_run = true;
        let entries = self.sink.drain();
        debug!("merging {} sink entries (completed: {completed})", entries.len());
        self.results.merge(entries, scope, files, completed, first_run);
    }
}

fn build_sessions(
    executor: &Executor<'_>,
    analyzer_count: usize,
) -> Result<Vec<Arc<GroupedAnalyzerActions>>, Interrupted> {
    (0..analyzer_count)
        .map(|index| {
            let analyzer = AnalyzerId(index as u32);
            executor
                .context
                .session_actions(analyzer, || executor.compute_session_actions(analyzer))
        })
        .collect()
}

/// File-level syntax actions need no semantic events; they run as one bulk
/// pass over the in-scope files.
fn run_syntax_pass(
    executor: &Executor<'_>,
    sessions: &[Arc<GroupedAnalyzerActions>],
    files: &[FileId],
    concurrent: bool,
) {
    let analyze = |&file: &FileId| {
        if !executor.scope.includes_file(file) {
            return;
        }
        for (index, session) in sessions.iter().enumerate() {
            if executor.cancel.is_cancelled() {
                return;
            }
            executor.execute_syntax_tree(AnalyzerId(index as u32), file, session);
        }
    };
    if concurrent {
        files.par_iter().for_each(analyze);
    } else {
        files.iter().for_each(analyze);
    }
}

/// Runs the syntax pass and the event loop. Serial runs execute them in
/// order; concurrent runs spawn the syntax pass alongside the event workers,
/// since file-level syntax actions depend on no semantic event.
fn run_passes(
    executor: &Executor<'_>,
    sessions: &[Arc<GroupedAnalyzerActions>],
    files: &[FileId],
    events: &[CompilationEvent],
    workers: usize,
) {
    if workers <= 1 {
        run_syntax_pass(executor, sessions, files, false);
        for &event in events {
            if executor.cancel.is_cancelled() {
                return;
            }
            process_event_all(executor, sessions, event);
        }
        return;
    }

    let (tx, rx) = channel::unbounded::<CompilationEvent>();
    std::thread::scope(|scope| {
        scope.spawn(|| run_syntax_pass(executor, sessions, files, true));
        for _ in 0..workers {
            let rx = rx.clone();
            scope.spawn(move || {
                while let Ok(event) = rx.recv() {
                    if executor.cancel.is_cancelled() {
                        return;
                    }
                    process_event_all(executor, sessions, event);
                }
            });
        }
        for &event in events {
            if executor.cancel.is_cancelled() {
                break;
            }
            if tx.send(event).is_err() {
                break;
            }
        }
        drop(tx);
    });
}

/// Fans one event out to every analyzer. Each analyzer's dispatch runs under
/// its own engine-fault guard so a scheduling bug in one analyzer's path
/// cannot take down the others.
fn process_event_all(
    executor: &Executor<'_>,
    sessions: &[Arc<GroupedAnalyzerActions>],
    event: CompilationEvent,
) {
    for (index, session) in sessions.iter().enumerate() {
        if session.actions.is_empty() {
            continue;
        }
        let analyzer = AnalyzerId(index as u32);
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            process_event(executor, analyzer, session, event)
        }));
        match outcome {
            Ok(Ok(())) | Ok(Err(Interrupted)) => {}
            Err(payload) => {
                let context = format!("event dispatch ({})", event.description());
                let message = crate::registry::panic_message(&*payload);
                let key = (analyzer, format!("{context}: {message}"));
                if executor.faults.insert(key, ()).is_none() {
                    log::error!("engine fault during {context}: {message}");
                    executor
                        .sink
                        .push(analyzer, Locality::NonLocal, engine_fault(&context, &message));
                }
            }
        }
    }
}

fn process_event(
    executor: &Executor<'_>,
    analyzer: AnalyzerId,
    session: &GroupedAnalyzerActions,
    event: CompilationEvent,
) -> Result<(), Interrupted> {
    match event {
        // Compilation-start actions already ran while building the session.
        CompilationEvent::Started => Ok(()),
        CompilationEvent::SymbolDeclared { symbol } => {
            let symbol = executor.oracle.symbol(symbol);
            process_symbol(executor, analyzer, session, symbol, event)
        }
        CompilationEvent::FileCompleted { file } => {
            if executor.scope.includes_file(file) {
                executor.execute_semantic_model(analyzer, file, session);
            }
            Ok(())
        }
        CompilationEvent::Completed => Ok(()),
    }
}

fn process_symbol(
    executor: &Executor<'_>,
    analyzer: AnalyzerId,
    session: &GroupedAnalyzerActions,
    symbol: &Symbol,
    event: CompilationEvent,
) -> Result<(), Interrupted> {
    if symbol.is_synthesized || !executor.scope.should_analyze_symbol(symbol) {
        return Ok(());
    }

    let per_symbol = executor.per_symbol_actions(analyzer, symbol, session)?;
    executor.execute_symbol_actions(analyzer, symbol, session);

    for index in 0..symbol.declarations.len() as u32 {
        if !executor
            .scope
            .includes_declaration(&symbol.declarations[index as usize])
        {
            continue;
        }
        executor.execute_declaration(analyzer, symbol, index, &per_symbol, session);
    }

    let declarations_done = (0..symbol.declarations.len() as u32).all(|index| {
        executor
            .state
            .is_complete(analyzer, Entity::Declaration(symbol.id, index))
    });
    let symbol_done = executor
        .state
        .is_complete(analyzer, Entity::Symbol(symbol.id));
    if declarations_done && symbol_done {
        match executor.try_execute_symbol_end(analyzer, symbol, &per_symbol, event) {
            SymbolEndOutcome::Done => on_symbol_processed(executor, analyzer, symbol)?,
            SymbolEndOutcome::Deferred | SymbolEndOutcome::OwnedElsewhere => {}
            SymbolEndOutcome::Interrupted => return Err(Interrupted),
        }
    }
    executor.check()
}

/// Called when a symbol may have become fully processed: removes it from its
/// containers' pending member sets and runs any end-action set the removal
/// released, walking outward while containers keep completing.
fn on_symbol_processed(
    executor: &Executor<'_>,
    analyzer: AnalyzerId,
    symbol: &Symbol,
) -> Result<(), Interrupted> {
    if !executor.state.symbol_fully_processed(analyzer, symbol) {
        return Ok(());
    }
    release_symbol_cache(executor, analyzer, symbol);

    let containers = executor.oracle.containers(symbol.id);
    let released = executor
        .context
        .on_member_complete(analyzer, symbol.id, &containers);
    for pending in released {
        if executor.execute_deferred_end(analyzer, &pending).is_done() {
            let container = executor.oracle.symbol(pending.symbol);
            on_symbol_processed(executor, analyzer, container)?;
        }
    }
    // Containers that finished their own analysis earlier (no end actions to
    // defer behind members) become evictable once their last member completes.
    for &container in &containers {
        let container_symbol = executor.oracle.symbol(container);
        if executor
            .state
            .symbol_fully_processed(analyzer, container_symbol)
        {
            release_symbol_cache(executor, analyzer, container_symbol);
        }
    }
    executor.check()
}

/// Drops a symbol's cached derived actions only once nothing can still
/// inherit from them: members look up their container's scope when they are
/// processed, so the cache must outlive every member.
fn release_symbol_cache(executor: &Executor<'_>, analyzer: AnalyzerId, symbol: &Symbol) {
    let members_done = executor
        .oracle
        .transitive_members(symbol.id)
        .into_iter()
        .all(|member| {
            executor
                .state
                .symbol_fully_processed(analyzer, executor.oracle.symbol(member))
        });
    if members_done {
        executor.context.forget_symbol(analyzer, symbol.id);
    }
}
