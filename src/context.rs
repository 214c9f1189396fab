//! Per-analyzer execution context: memoized derived action scopes and the
//! container→member dependency tracker pairing symbol start/end actions.
//!
//! Both caches are single-flight: the first requester computes, concurrent
//! requesters await the same in-flight computation. Dependency tracking is
//! guarded by one lock per analyzer, like the completion maps.

use std::collections::{HashMap, HashSet};

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::analyzer::AnalyzerId;
use crate::cancellation::Interrupted;
use crate::events::CompilationEvent;
use crate::model::SymbolId;
use crate::registry::actions::AnalyzerActions;
use crate::registry::GroupedAnalyzerActions;

/// A symbol-end action set that was attempted while members were still
/// pending, held until the last member completes.
#[derive(Clone)]
pub struct PendingEnd {
    pub symbol: SymbolId,
    /// The per-symbol action set whose `symbol_end` slice is to run.
    pub actions: Arc<AnalyzerActions>,
    /// The SymbolDeclared event whose processing was deferred.
    pub event: CompilationEvent,
}

#[derive(Default)]
struct DependencyTracker {
    /// Container → members not yet fully analyzed. Created lazily when the
    /// container's start actions execute and it registered an end action.
    pending_members: HashMap<SymbolId, HashSet<SymbolId>>,
    /// Container → deferred end-action set, recorded at most once.
    pending_ends: HashMap<SymbolId, PendingEnd>,
}

pub struct ExecutionContext {
    session: Vec<OnceCell<Arc<GroupedAnalyzerActions>>>,
    per_symbol: DashMap<(SymbolId, AnalyzerId), Arc<OnceCell<Arc<AnalyzerActions>>>>,
    deps: Vec<Mutex<DependencyTracker>>,
}

impl ExecutionContext {
    pub fn new(analyzer_count: usize) -> Self {
        ExecutionContext {
            session: (0..analyzer_count).map(|_| OnceCell::new()).collect(),
            per_symbol: DashMap::new(),
            deps: (0..analyzer_count)
                .map(|_| Mutex::new(DependencyTracker::default()))
                .collect(),
        }
    }

    /// The analyzer's effective action set for this run: base registrations
    /// merged with nested actions from its compilation-start phase. Computed
    /// once; a compute interrupted by cancellation is not cached.
    pub fn session_actions(
        &self,
        analyzer: AnalyzerId,
        compute: impl FnOnce() -> Result<GroupedAnalyzerActions, Interrupted>,
    ) -> Result<Arc<GroupedAnalyzerActions>, Interrupted> {
        self.session[analyzer.index()]
            .get_or_try_init(|| compute().map(Arc::new))
            .cloned()
    }

    /// Actions derived from the symbol's (and its containers') symbol-start
    /// callbacks, computed once per (symbol, analyzer).
    pub fn per_symbol_actions(
        &self,
        analyzer: AnalyzerId,
        symbol: SymbolId,
        compute: impl FnOnce() -> Result<AnalyzerActions, Interrupted>,
    ) -> Result<Arc<AnalyzerActions>, Interrupted> {
        let cell = self
            .per_symbol
            .entry((symbol, analyzer))
            .or_default()
            .clone();
        cell.get_or_try_init(|| compute().map(Arc::new)).cloned()
    }

    /// Drops the cached per-symbol actions. Callers must ensure the symbol
    /// and every member that could inherit from it are fully analyzed.
    pub fn forget_symbol(&self, analyzer: AnalyzerId, symbol: SymbolId) {
        self.per_symbol.remove(&(symbol, analyzer));
    }

    /// Records the container's not-yet-complete member set, built on first
    /// execution of its start actions. `is_done` is evaluated under the
    /// dependency lock so a concurrently completing member is either filtered
    /// here or removed by its own completion walk, never lost.
    pub fn register_pending_members(
        &self,
        analyzer: AnalyzerId,
        container: SymbolId,
        members: impl IntoIterator<Item = SymbolId>,
        is_done: impl Fn(SymbolId) -> bool,
    ) {
        let mut deps = self.deps[analyzer.index()].lock();
        if deps.pending_members.contains_key(&container) {
            return;
        }
        let pending: HashSet<SymbolId> =
            members.into_iter().filter(|&member| !is_done(member)).collect();
        deps.pending_members.insert(container, pending);
    }

    /// Atomically checks the container's pending set; a non-empty set records
    /// the end actions for later and returns true. An empty or absent set
    /// clears the tracking entry and returns false: run the end actions now.
    pub fn defer_end_if_members_pending(
        &self,
        analyzer: AnalyzerId,
        container: SymbolId,
        pending_end: impl FnOnce() -> PendingEnd,
    ) -> bool {
        let mut deps = self.deps[analyzer.index()].lock();
        match deps.pending_members.get(&container) {
            Some(set) if !set.is_empty() => {
                deps.pending_ends
                    .entry(container)
                    .or_insert_with(pending_end);
                true
            }
            Some(_) => {
                deps.pending_members.remove(&container);
                false
            }
            None => false,
        }
    }

    /// Removes a completed member from every ancestor container's pending
    /// set (`containers` is the chain walking outward). Emptying a set with
    /// a recorded end-action set takes that record, at most once.
    pub fn on_member_complete(
        &self,
        analyzer: AnalyzerId,
        member: SymbolId,
        containers: &[SymbolId],
    ) -> Vec<PendingEnd> {
        let mut ready = Vec::new();
        let mut deps = self.deps[analyzer.index()].lock();
        for container in containers {
            if let Some(set) = deps.pending_members.get_mut(container) {
                set.remove(&member);
                if set.is_empty() && deps.pending_ends.contains_key(container) {
                    deps.pending_members.remove(container);
                    if let Some(end) = deps.pending_ends.remove(container) {
                        ready.push(end);
                    }
                }
            }
        }
        ready
    }

    /// Invariant check: after a completed full-compilation run no pending
    /// member sets or deferred end actions may remain.
    pub fn has_pending_dependencies(&self) -> bool {
        self.deps.iter().any(|tracker| {
            let deps = tracker.lock();
            deps.pending_members.values().any(|set| !set.is_empty())
                || !deps.pending_ends.is_empty()
        })
    }
}
