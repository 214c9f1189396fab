//! Analysis completion tracking across analyzers.
//!
//! Answers, per analyzer, "is entity E already fully analyzed?" and "let me
//! claim E" without races, so overlapping requests never duplicate work and a
//! cancelled claim can be resumed. One lock per analyzer keeps contention
//! independent of worker count.

pub mod per_analyzer;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::analyzer::AnalyzerId;
use crate::model::{FileId, Symbol, SymbolId};
pub use per_analyzer::{ClaimOutcome, PerAnalyzerState, StateData};

/// The granularity of partial-completion tracking.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Entity {
    CompilationStart,
    CompilationEnd,
    /// Symbol actions for one declared symbol.
    Symbol(SymbolId),
    /// The symbol-start phase deriving per-symbol nested actions.
    SymbolStart(SymbolId),
    /// The paired symbol-end action set.
    SymbolEnd(SymbolId),
    /// Declaration analysis of one declaring reference.
    Declaration(SymbolId, u32),
    /// Semantic-model actions for one completed file.
    SemanticFile(FileId),
    /// File-level syntax actions, not tied to any semantic event.
    SyntaxFile(FileId),
}

pub struct AnalysisState {
    per_analyzer: Vec<Mutex<PerAnalyzerState>>,
}

impl AnalysisState {
    pub fn new(analyzer_count: usize) -> Self {
        AnalysisState {
            per_analyzer: (0..analyzer_count)
                .map(|_| Mutex::new(PerAnalyzerState::default()))
                .collect(),
        }
    }

    pub fn try_claim(&self, analyzer: AnalyzerId, entity: Entity) -> ClaimOutcome {
        self.per_analyzer[analyzer.index()].lock().try_claim(entity)
    }

    pub fn complete(&self, analyzer: AnalyzerId, entity: Entity, data: Box<StateData>) {
        self.per_analyzer[analyzer.index()]
            .lock()
            .complete(entity, data);
    }

    pub fn abort(&self, analyzer: AnalyzerId, entity: Entity, data: Box<StateData>) {
        self.per_analyzer[analyzer.index()]
            .lock()
            .abort(entity, data);
    }

    pub fn mark_complete(&self, analyzer: AnalyzerId, entity: Entity) {
        self.per_analyzer[analyzer.index()]
            .lock()
            .mark_complete(entity);
    }

    pub fn is_complete(&self, analyzer: AnalyzerId, entity: Entity) -> bool {
        self.per_analyzer[analyzer.index()].lock().is_complete(entity)
    }

    /// Whether a SymbolDeclared event is fully processed for one analyzer:
    /// symbol actions, the symbol-start phase, every declaring reference, and
    /// the symbol-end set must all report complete.
    pub fn symbol_fully_processed(&self, analyzer: AnalyzerId, symbol: &Symbol) -> bool {
        let state = self.per_analyzer[analyzer.index()].lock();
        if !state.is_complete(Entity::Symbol(symbol.id))
            || !state.is_complete(Entity::SymbolStart(symbol.id))
            || !state.is_complete(Entity::SymbolEnd(symbol.id))
        {
            return false;
        }
        (0..symbol.declarations.len() as u32)
            .all(|index| state.is_complete(Entity::Declaration(symbol.id, index)))
    }

    /// Whether any entity for this analyzer is claimed or resumable.
    pub fn has_pending_work(&self, analyzer: AnalyzerId) -> bool {
        self.per_analyzer[analyzer.index()].lock().has_pending()
    }

    pub fn any_pending_work(&self) -> bool {
        (0..self.per_analyzer.len() as u32).any(|a| self.has_pending_work(AnalyzerId(a)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn concurrent_claims_have_exactly_one_winner() {
        let state = AnalysisState::new(1);
        let winners = AtomicUsize::new(0);
        let losers = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| match state.try_claim(AnalyzerId(0), Entity::CompilationStart) {
                    ClaimOutcome::Claimed(_) => {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                    ClaimOutcome::OwnedElsewhere => {
                        losers.fetch_add(1, Ordering::SeqCst);
                    }
                    ClaimOutcome::AlreadyDone => panic!("nothing completed this entity"),
                });
            }
        });

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert_eq!(losers.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn claim_after_complete_fails_without_side_effects() {
        let state = AnalysisState::new(1);
        let entity = Entity::SemanticFile(FileId(0));
        let data = match state.try_claim(AnalyzerId(0), entity) {
            ClaimOutcome::Claimed(data) => data,
            _ => panic!(),
        };
        state.complete(AnalyzerId(0), entity, data);

        for _ in 0..3 {
            assert!(matches!(
                state.try_claim(AnalyzerId(0), entity),
                ClaimOutcome::AlreadyDone
            ));
        }
        assert!(!state.has_pending_work(AnalyzerId(0)));
    }

    #[test]
    fn analyzers_are_tracked_independently() {
        let state = AnalysisState::new(2);
        let entity = Entity::Symbol(SymbolId(1));
        let data = match state.try_claim(AnalyzerId(0), entity) {
            ClaimOutcome::Claimed(data) => data,
            _ => panic!(),
        };
        assert!(matches!(
            state.try_claim(AnalyzerId(1), entity),
            ClaimOutcome::Claimed(_)
        ));
        state.complete(AnalyzerId(0), entity, data);
        assert!(state.is_complete(AnalyzerId(0), entity));
        assert!(!state.is_complete(AnalyzerId(1), entity));
    }

    #[test]
    fn symbol_event_completion_requires_all_parts() {
        use crate::model::{DeclRef, Span, SymbolKind};

        let state = AnalysisState::new(1);
        let a = AnalyzerId(0);
        let file = FileId(0);
        let symbol = Symbol {
            id: SymbolId(3),
            name: "T".into(),
            kind: SymbolKind::Type,
            container: None,
            is_synthesized: false,
            declarations: vec![
                DeclRef {
                    file,
                    span: Span::new(file, 0, 10),
                },
                DeclRef {
                    file,
                    span: Span::new(file, 20, 30),
                },
            ],
        };

        state.mark_complete(a, Entity::Symbol(symbol.id));
        state.mark_complete(a, Entity::SymbolStart(symbol.id));
        state.mark_complete(a, Entity::SymbolEnd(symbol.id));
        state.mark_complete(a, Entity::Declaration(symbol.id, 0));
        assert!(!state.symbol_fully_processed(a, &symbol));

        state.mark_complete(a, Entity::Declaration(symbol.id, 1));
        assert!(state.symbol_fully_processed(a, &symbol));
    }
}
