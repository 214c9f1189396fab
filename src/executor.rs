//! Executes one analyzer's action set against one event/entity.
//!
//! Every set runs under a claim from [`AnalysisState`]: a failed claim means
//! "already complete" or "owned elsewhere" and has no side effects. Each
//! action is recorded processed immediately after it returns, so partial
//! progress is durable across faults and cancellation. Callback faults
//! (panics and `Err` returns alike) become one descriptor-tagged diagnostic
//! and never propagate.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use log::warn;
use parking_lot::Mutex;

use crate::analyzer::{Analyzer, AnalyzerId};
use crate::cancellation::{CancellationToken, Interrupted};
use crate::context::{ExecutionContext, PendingEnd};
use crate::diagnostics::{analyzer_fault, Diagnostic, DiagnosticSink, Locality};
use crate::events::CompilationEvent;
use crate::model::{FileId, SemanticOracle, Span, Symbol};
use crate::registry::actions::{
    ActionIdSource, AnalyzerActions, CodeBlockStartAction, NodeAction, OperationAction,
    OperationBlockStartAction,
};
use crate::registry::contexts::{
    CodeBlockContext, CodeBlockStartContext, CompilationContext, CompilationStartContext,
    ContextCore, NodeContext, OperationBlockContext, OperationBlockStartContext, OperationContext,
    RegistrationContext, ReportBuffer, SemanticModelContext, SymbolContext, SymbolStartContext,
    SyntaxTreeContext,
};
use crate::registry::{ActionRegistry, GroupedAnalyzerActions};
use crate::scope::AnalysisScope;
use crate::state::{AnalysisState, ClaimOutcome, Entity, StateData};
use crate::telemetry::ExecutionTimes;

/// Result of attempting one claimed action set.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum SetOutcome {
    Completed,
    AlreadyDone,
    OwnedElsewhere,
    Interrupted,
}

impl SetOutcome {
    pub(crate) fn is_done(self) -> bool {
        matches!(self, SetOutcome::Completed | SetOutcome::AlreadyDone)
    }
}

/// Result of a symbol-end attempt, which may defer behind pending members.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum SymbolEndOutcome {
    Done,
    Deferred,
    OwnedElsewhere,
    Interrupted,
}

pub(crate) struct Executor<'a> {
    pub(crate) analyzers: &'a [Arc<dyn Analyzer>],
    pub(crate) registry: &'a ActionRegistry,
    pub(crate) state: &'a AnalysisState,
    pub(crate) context: &'a ExecutionContext,
    pub(crate) oracle: &'a dyn SemanticOracle,
    pub(crate) sink: &'a DiagnosticSink,
    /// One exclusivity gate per non-concurrency-safe analyzer.
    pub(crate) gates: &'a [Option<Arc<Mutex<()>>>],
    pub(crate) times: &'a ExecutionTimes,
    pub(crate) cancel: &'a CancellationToken,
    pub(crate) scope: &'a AnalysisScope,
    pub(crate) ids: &'a ActionIdSource,
    /// Distinct faults already reported, for de-duplication.
    pub(crate) faults: &'a DashMap<(AnalyzerId, String), ()>,
}

impl<'a> Executor<'a> {
    pub(crate) fn check(&self) -> Result<(), Interrupted> {
        if self.cancel.is_cancelled() {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }

    fn core(&self) -> ContextCore<'a> {
        ContextCore::new(self.oracle, self.cancel)
    }

    /// Claims the entity, runs the body, and completes or aborts the claim.
    fn run_claimed(
        &self,
        analyzer: AnalyzerId,
        entity: Entity,
        body: impl FnOnce(&mut StateData) -> Result<(), Interrupted>,
    ) -> SetOutcome {
        match self.state.try_claim(analyzer, entity) {
            ClaimOutcome::AlreadyDone => SetOutcome::AlreadyDone,
            ClaimOutcome::OwnedElsewhere => SetOutcome::OwnedElsewhere,
            ClaimOutcome::Claimed(mut data) => match body(&mut data) {
                Ok(()) => {
                    self.state.complete(analyzer, entity, data);
                    SetOutcome::Completed
                }
                Err(Interrupted) => {
                    self.state.abort(analyzer, entity, data);
                    SetOutcome::Interrupted
                }
            },
        }
    }

    /// Invokes one callback under fault isolation, the analyzer's gate, and
    /// timing instrumentation, then routes its reported diagnostics.
    fn invoke<C, F>(
        &self,
        analyzer: AnalyzerId,
        call_context: &str,
        ctx: &mut C,
        callback: &F,
        local_spans: &[Span],
    ) where
        C: ReportBuffer,
        F: Fn(&mut C) -> anyhow::Result<()> + ?Sized,
    {
        let _gate = self.gates[analyzer.index()].as_ref().map(|gate| gate.lock());
        let started = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| callback(&mut *ctx)));
        self.times.record(analyzer, started.elapsed());

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(error)) => self.report_fault(analyzer, call_context, &format!("{error:#}")),
            Err(payload) => self.report_fault(
                analyzer,
                call_context,
                &crate::registry::panic_message(&*payload),
            ),
        }
        for diagnostic in ctx.take_reported() {
            self.route(analyzer, local_spans, diagnostic);
        }
    }

    /// Local if the diagnostic's location intersects the span currently
    /// under analysis, non-local otherwise.
    fn route(&self, analyzer: AnalyzerId, local_spans: &[Span], diagnostic: Diagnostic) {
        let locality = match diagnostic.location {
            Some(location) if local_spans.iter().any(|span| span.intersects(&location)) => {
                Locality::Local(location.file)
            }
            _ => Locality::NonLocal,
        };
        self.sink.push(analyzer, locality, diagnostic);
    }

    fn report_fault(&self, analyzer: AnalyzerId, call_context: &str, message: &str) {
        let key = (analyzer, format!("{call_context}: {message}"));
        if self.faults.insert(key, ()).is_some() {
            return;
        }
        let name = self.analyzers[analyzer.index()].name();
        warn!("analyzer '{name}' faulted during {call_context}: {message}");
        self.sink.push(
            analyzer,
            Locality::NonLocal,
            analyzer_fault(name, call_context, message),
        );
    }

    /// The analyzer's effective actions for this run: base registrations
    /// merged with nested actions collected by its compilation-start phase.
    /// The start phase is claimed and resumable like any other action set.
    pub(crate) fn compute_session_actions(
        &self,
        analyzer: AnalyzerId,
    ) -> Result<GroupedAnalyzerActions, Interrupted> {
        let base = self.registry.analyzer_actions(analyzer);
        let mut merged = base.actions.clone();

        if base.actions.compilation_start.is_empty() {
            self.state.mark_complete(analyzer, Entity::CompilationStart);
            return Ok(GroupedAnalyzerActions::new(merged));
        }

        let mut collected = AnalyzerActions::default();
        let outcome = self.run_claimed(analyzer, Entity::CompilationStart, |data| {
            for action in &base.actions.compilation_start {
                self.check()?;
                if data.is_processed(action.id) {
                    continue;
                }
                let mut scratch = AnalyzerActions::default();
                let registrar = RegistrationContext {
                    analyzer,
                    ids: self.ids,
                    actions: &mut scratch,
                };
                let mut ctx = CompilationStartContext::new(self.core(), registrar);
                self.invoke(
                    analyzer,
                    "compilation start action",
                    &mut ctx,
                    &*action.callback,
                    &[],
                );
                data.nested.extend(&scratch);
                data.mark_processed(action.id);
            }
            collected = data.nested.clone();
            Ok(())
        });

        match outcome {
            SetOutcome::Completed => merged.extend(&collected),
            SetOutcome::AlreadyDone => {
                // Unreachable: the session cache lives as long as the driver
                // and the first successful compute populates it.
                debug_assert!(false, "session recomputed after completion");
            }
            SetOutcome::OwnedElsewhere | SetOutcome::Interrupted => return Err(Interrupted),
        }
        // The start phase is consumed here; it never re-runs via the session.
        merged.compilation_start.clear();
        Ok(GroupedAnalyzerActions::new(merged))
    }

    /// Actions derived from symbol-start callbacks for this symbol, plus
    /// declaration actions inherited from its containers' start scopes.
    /// Registers the container's pending member set when end actions exist.
    pub(crate) fn compute_per_symbol_actions(
        &self,
        analyzer: AnalyzerId,
        symbol: &Symbol,
        session: &GroupedAnalyzerActions,
    ) -> Result<AnalyzerActions, Interrupted> {
        let mut result = AnalyzerActions::default();
        if let Some(container) = symbol.container {
            let container_symbol = self.oracle.symbol(container);
            let inherited = self.context.per_symbol_actions(analyzer, container, || {
                self.compute_per_symbol_actions(analyzer, container_symbol, session)
            })?;
            result.extend(&inherited.inheritable());
        }

        let starts = session.symbol_start_actions(symbol.kind);
        if starts.is_empty() {
            self.state
                .mark_complete(analyzer, Entity::SymbolStart(symbol.id));
            return Ok(result);
        }

        let mut collected = AnalyzerActions::default();
        let outcome = self.run_claimed(analyzer, Entity::SymbolStart(symbol.id), |data| {
            for action in starts {
                self.check()?;
                if data.is_processed(action.id) {
                    continue;
                }
                let mut scratch = AnalyzerActions::default();
                let mut ctx = SymbolStartContext::new(
                    self.core(),
                    symbol,
                    analyzer,
                    self.ids,
                    &mut scratch,
                );
                self.invoke(
                    analyzer,
                    "symbol start action",
                    &mut ctx,
                    &*action.callback,
                    &[],
                );
                data.nested.extend(&scratch);
                data.mark_processed(action.id);
            }
            collected = data.nested.clone();
            Ok(())
        });

        match outcome {
            SetOutcome::Completed => result.extend(&collected),
            SetOutcome::AlreadyDone => {
                // The start phase ran in an earlier pass and its collected
                // actions were released with the evicted cache. Eviction
                // waits for the symbol and all its members to complete, so
                // everything the dropped actions could drive is already done
                // and the inherited remainder suffices.
            }
            SetOutcome::OwnedElsewhere | SetOutcome::Interrupted => return Err(Interrupted),
        }

        if !result.symbol_end.is_empty() && symbol.kind.is_container() {
            let members = self.oracle.transitive_members(symbol.id);
            self.context
                .register_pending_members(analyzer, symbol.id, members, |member| {
                    self.state
                        .symbol_fully_processed(analyzer, self.oracle.symbol(member))
                });
        }
        Ok(result)
    }

    /// Memoized wrapper around [`Self::compute_per_symbol_actions`].
    pub(crate) fn per_symbol_actions(
        &self,
        analyzer: AnalyzerId,
        symbol: &Symbol,
        session: &GroupedAnalyzerActions,
    ) -> Result<Arc<AnalyzerActions>, Interrupted> {
        if session.actions.symbol_start.is_empty() {
            self.state
                .mark_complete(analyzer, Entity::SymbolStart(symbol.id));
            return Ok(Arc::new(AnalyzerActions::default()));
        }
        self.context.per_symbol_actions(analyzer, symbol.id, || {
            self.compute_per_symbol_actions(analyzer, symbol, session)
        })
    }

    pub(crate) fn execute_symbol_actions(
        &self,
        analyzer: AnalyzerId,
        symbol: &Symbol,
        session: &GroupedAnalyzerActions,
    ) -> SetOutcome {
        let actions = session.symbol_actions(symbol.kind);
        if actions.is_empty() {
            self.state.mark_complete(analyzer, Entity::Symbol(symbol.id));
            return SetOutcome::Completed;
        }
        let local_spans: Vec<Span> = symbol.declarations.iter().map(|d| d.span).collect();
        self.run_claimed(analyzer, Entity::Symbol(symbol.id), |data| {
            for action in actions {
                self.check()?;
                if data.is_processed(action.id) {
                    continue;
                }
                let mut ctx = SymbolContext::new(self.core(), symbol);
                self.invoke(analyzer, "symbol action", &mut ctx, &*action.callback, &local_spans);
                data.mark_processed(action.id);
            }
            Ok(())
        })
    }

    /// Runs node/operation/code-block analysis against one declaring
    /// reference. Start actions execute first and register nested actions
    /// into the claim's scoped collector, merged with nested actions from a
    /// prior, now-resumed partial run.
    pub(crate) fn execute_declaration(
        &self,
        analyzer: AnalyzerId,
        symbol: &Symbol,
        index: u32,
        per_symbol: &AnalyzerActions,
        session: &GroupedAnalyzerActions,
    ) -> SetOutcome {
        let entity = Entity::Declaration(symbol.id, index);
        if !session.actions.has_declaration_actions() && !per_symbol.has_declaration_actions() {
            self.state.mark_complete(analyzer, entity);
            return SetOutcome::Completed;
        }

        let decl = symbol.declarations[index as usize];
        let filter = self.scope.filter_span(decl.file);
        let local_spans = [decl.span];

        self.run_claimed(analyzer, entity, |data| {
            let topmost = self.oracle.topmost_node(symbol.id, index as usize);
            let blocks = self.oracle.operation_blocks(symbol.id, index as usize);

            // Start phase: collect nested registrations.
            if symbol.kind.has_code_block() {
                let starts: Vec<CodeBlockStartAction> = session
                    .actions
                    .code_block_start
                    .iter()
                    .chain(per_symbol.code_block_start.iter())
                    .cloned()
                    .collect();
                for action in starts {
                    self.check()?;
                    if data.is_processed(action.id) {
                        continue;
                    }
                    let mut scratch = AnalyzerActions::default();
                    let mut ctx = CodeBlockStartContext::new(
                        self.core(),
                        symbol,
                        &topmost,
                        analyzer,
                        self.ids,
                        &mut scratch,
                    );
                    self.invoke(
                        analyzer,
                        "code block start action",
                        &mut ctx,
                        &*action.callback,
                        &local_spans,
                    );
                    data.nested.extend(&scratch);
                    data.mark_processed(action.id);
                }
            }
            if !blocks.is_empty() {
                let starts: Vec<OperationBlockStartAction> = session
                    .actions
                    .operation_block_start
                    .iter()
                    .chain(per_symbol.operation_block_start.iter())
                    .cloned()
                    .collect();
                for action in starts {
                    self.check()?;
                    if data.is_processed(action.id) {
                        continue;
                    }
                    let mut scratch = AnalyzerActions::default();
                    let mut ctx = OperationBlockStartContext::new(
                        self.core(),
                        symbol,
                        &blocks,
                        analyzer,
                        self.ids,
                        &mut scratch,
                    );
                    self.invoke(
                        analyzer,
                        "operation block start action",
                        &mut ctx,
                        &*action.callback,
                        &local_spans,
                    );
                    data.nested.extend(&scratch);
                    data.mark_processed(action.id);
                }
            }

            // Node phase over the declaration's topmost node.
            let node_actions: Vec<NodeAction> = session
                .actions
                .node
                .iter()
                .chain(per_symbol.node.iter())
                .chain(data.nested.node.iter())
                .cloned()
                .collect();
            for action in node_actions {
                self.check()?;
                if data.is_processed(action.id) {
                    continue;
                }
                for node in topmost.descendants() {
                    if !action.kinds.contains(&node.kind) {
                        continue;
                    }
                    if let Some(filter) = filter {
                        if !node.span.intersects(&filter) {
                            continue;
                        }
                    }
                    let mut ctx = NodeContext::new(self.core(), node, symbol);
                    self.invoke(analyzer, "node action", &mut ctx, &*action.callback, &local_spans);
                }
                data.mark_processed(action.id);
            }

            // Operation phase over the declaration's lowered blocks.
            let operation_actions: Vec<OperationAction> = session
                .actions
                .operation
                .iter()
                .chain(per_symbol.operation.iter())
                .chain(data.nested.operation.iter())
                .cloned()
                .collect();
            for action in operation_actions {
                self.check()?;
                if data.is_processed(action.id) {
                    continue;
                }
                for operation in blocks.iter().flat_map(|block| block.operations.iter()) {
                    if !action.kinds.contains(&operation.kind) {
                        continue;
                    }
                    if let Some(filter) = filter {
                        if !operation.span.intersects(&filter) {
                            continue;
                        }
                    }
                    let mut ctx = OperationContext::new(self.core(), operation, symbol);
                    self.invoke(
                        analyzer,
                        "operation action",
                        &mut ctx,
                        &*action.callback,
                        &local_spans,
                    );
                }
                data.mark_processed(action.id);
            }

            // End phase.
            if symbol.kind.has_code_block() {
                let ends = session
                    .actions
                    .code_block_end
                    .iter()
                    .chain(per_symbol.code_block_end.iter())
                    .chain(data.nested.code_block_end.iter())
                    .cloned()
                    .collect::<Vec<_>>();
                for action in ends {
                    self.check()?;
                    if data.is_processed(action.id) {
                        continue;
                    }
                    let mut ctx = CodeBlockContext::new(self.core(), symbol, &topmost);
                    self.invoke(
                        analyzer,
                        "code block end action",
                        &mut ctx,
                        &*action.callback,
                        &local_spans,
                    );
                    data.mark_processed(action.id);
                }
            }
            if !blocks.is_empty() {
                let ends = session
                    .actions
                    .operation_block_end
                    .iter()
                    .chain(per_symbol.operation_block_end.iter())
                    .chain(data.nested.operation_block_end.iter())
                    .cloned()
                    .collect::<Vec<_>>();
                for action in ends {
                    self.check()?;
                    if data.is_processed(action.id) {
                        continue;
                    }
                    let mut ctx = OperationBlockContext::new(self.core(), symbol, &blocks);
                    self.invoke(
                        analyzer,
                        "operation block end action",
                        &mut ctx,
                        &*action.callback,
                        &local_spans,
                    );
                    data.mark_processed(action.id);
                }
            }
            Ok(())
        })
    }

    /// Attempts the symbol's end actions. If members are still pending, the
    /// set is recorded for the last member completion to release instead.
    pub(crate) fn try_execute_symbol_end(
        &self,
        analyzer: AnalyzerId,
        symbol: &Symbol,
        per_symbol: &Arc<AnalyzerActions>,
        event: CompilationEvent,
    ) -> SymbolEndOutcome {
        if per_symbol.symbol_end.is_empty() {
            self.state
                .mark_complete(analyzer, Entity::SymbolEnd(symbol.id));
            return SymbolEndOutcome::Done;
        }
        let deferred = self
            .context
            .defer_end_if_members_pending(analyzer, symbol.id, || PendingEnd {
                symbol: symbol.id,
                actions: Arc::clone(per_symbol),
                event,
            });
        if deferred {
            return SymbolEndOutcome::Deferred;
        }
        match self.execute_symbol_end_set(analyzer, symbol, per_symbol) {
            outcome if outcome.is_done() => SymbolEndOutcome::Done,
            SetOutcome::OwnedElsewhere => SymbolEndOutcome::OwnedElsewhere,
            _ => SymbolEndOutcome::Interrupted,
        }
    }

    /// Runs a deferred end-action set released by its last member.
    pub(crate) fn execute_deferred_end(&self, analyzer: AnalyzerId, pending: &PendingEnd) -> SetOutcome {
        log::debug!(
            "releasing deferred symbol-end actions ({})",
            pending.event.description()
        );
        let symbol = self.oracle.symbol(pending.symbol);
        self.execute_symbol_end_set(analyzer, symbol, &pending.actions)
    }

    fn execute_symbol_end_set(
        &self,
        analyzer: AnalyzerId,
        symbol: &Symbol,
        per_symbol: &AnalyzerActions,
    ) -> SetOutcome {
        let local_spans: Vec<Span> = symbol.declarations.iter().map(|d| d.span).collect();
        self.run_claimed(analyzer, Entity::SymbolEnd(symbol.id), |data| {
            for action in &per_symbol.symbol_end {
                self.check()?;
                if data.is_processed(action.id) {
                    continue;
                }
                let mut ctx = SymbolContext::new(self.core(), symbol);
                self.invoke(
                    analyzer,
                    "symbol end action",
                    &mut ctx,
                    &*action.callback,
                    &local_spans,
                );
                data.mark_processed(action.id);
            }
            Ok(())
        })
    }

    pub(crate) fn execute_syntax_tree(
        &self,
        analyzer: AnalyzerId,
        file: FileId,
        session: &GroupedAnalyzerActions,
    ) -> SetOutcome {
        if session.actions.syntax_tree.is_empty() {
            self.state.mark_complete(analyzer, Entity::SyntaxFile(file));
            return SetOutcome::Completed;
        }
        let local_spans = [Span::new(file, 0, u32::MAX)];
        self.run_claimed(analyzer, Entity::SyntaxFile(file), |data| {
            let tree = self.oracle.syntax_tree(file);
            for action in &session.actions.syntax_tree {
                self.check()?;
                if data.is_processed(action.id) {
                    continue;
                }
                let mut ctx = SyntaxTreeContext::new(self.core(), tree);
                self.invoke(
                    analyzer,
                    "syntax tree action",
                    &mut ctx,
                    &*action.callback,
                    &local_spans,
                );
                data.mark_processed(action.id);
            }
            Ok(())
        })
    }

    pub(crate) fn execute_semantic_model(
        &self,
        analyzer: AnalyzerId,
        file: FileId,
        session: &GroupedAnalyzerActions,
    ) -> SetOutcome {
        if session.actions.semantic_model.is_empty() {
            self.state
                .mark_complete(analyzer, Entity::SemanticFile(file));
            return SetOutcome::Completed;
        }
        let local_spans = [Span::new(file, 0, u32::MAX)];
        self.run_claimed(analyzer, Entity::SemanticFile(file), |data| {
            for action in &session.actions.semantic_model {
                self.check()?;
                if data.is_processed(action.id) {
                    continue;
                }
                let mut ctx = SemanticModelContext::new(self.core(), file);
                self.invoke(
                    analyzer,
                    "semantic model action",
                    &mut ctx,
                    &*action.callback,
                    &local_spans,
                );
                data.mark_processed(action.id);
            }
            Ok(())
        })
    }

    /// Compilation-end actions, run only after every other event is fully
    /// processed.
    pub(crate) fn execute_compilation_end(
        &self,
        analyzer: AnalyzerId,
        session: &GroupedAnalyzerActions,
    ) -> SetOutcome {
        if session.actions.compilation_end.is_empty() {
            self.state.mark_complete(analyzer, Entity::CompilationEnd);
            return SetOutcome::Completed;
        }
        self.run_claimed(analyzer, Entity::CompilationEnd, |data| {
            for action in &session.actions.compilation_end {
                self.check()?;
                if data.is_processed(action.id) {
                    continue;
                }
                let mut ctx = CompilationContext::new(self.core());
                self.invoke(
                    analyzer,
                    "compilation end action",
                    &mut ctx,
                    &*action.callback,
                    &[],
                );
                data.mark_processed(action.id);
            }
            Ok(())
        })
    }
}
