//! The action registry: built once per analyzer set by invoking each
//! analyzer's registration callback under fault isolation, then grouped into
//! kind-indexed lookup tables.

pub mod actions;
pub mod contexts;

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use log::debug;

use crate::analyzer::{Analyzer, AnalyzerId};
use crate::diagnostics::{analyzer_fault, DiagnosticSink, Locality};
use crate::model::SymbolKind;
use actions::{ActionIdSource, AnalyzerActions, SymbolAction, SymbolStartAction};
use contexts::RegistrationContext;

/// One analyzer's actions with per-kind lookup tables, built once after
/// registration (and rebuilt per run when compilation-start actions add
/// nested registrations).
#[derive(Clone, Default)]
pub struct GroupedAnalyzerActions {
    pub actions: AnalyzerActions,
    symbol_by_kind: HashMap<SymbolKind, Vec<SymbolAction>>,
    symbol_start_by_kind: HashMap<SymbolKind, Vec<SymbolStartAction>>,
}

impl GroupedAnalyzerActions {
    pub fn new(actions: AnalyzerActions) -> Self {
        let mut symbol_by_kind: HashMap<SymbolKind, Vec<SymbolAction>> = HashMap::new();
        for action in &actions.symbol {
            for &kind in &action.kinds {
                symbol_by_kind.entry(kind).or_default().push(action.clone());
            }
        }
        let mut symbol_start_by_kind: HashMap<SymbolKind, Vec<SymbolStartAction>> = HashMap::new();
        for action in &actions.symbol_start {
            for &kind in &action.kinds {
                symbol_start_by_kind
                    .entry(kind)
                    .or_default()
                    .push(action.clone());
            }
        }
        GroupedAnalyzerActions {
            actions,
            symbol_by_kind,
            symbol_start_by_kind,
        }
    }

    pub fn symbol_actions(&self, kind: SymbolKind) -> &[SymbolAction] {
        self.symbol_by_kind.get(&kind).map_or(&[], |v| v.as_slice())
    }

    pub fn symbol_start_actions(&self, kind: SymbolKind) -> &[SymbolStartAction] {
        self.symbol_start_by_kind
            .get(&kind)
            .map_or(&[], |v| v.as_slice())
    }
}

/// Per-analyzer action tables for one analyzer set.
pub struct ActionRegistry {
    per_analyzer: Vec<Arc<GroupedAnalyzerActions>>,
}

impl ActionRegistry {
    /// Invokes every analyzer's registration callback exactly once, each
    /// under fault isolation: a panicking `register` yields one analyzer
    /// fault diagnostic and keeps whatever it registered before the fault.
    pub fn build(
        analyzers: &[Arc<dyn Analyzer>],
        ids: &ActionIdSource,
        sink: &DiagnosticSink,
    ) -> Self {
        let mut per_analyzer = Vec::with_capacity(analyzers.len());
        for (index, analyzer) in analyzers.iter().enumerate() {
            let id = AnalyzerId(index as u32);
            let mut actions = AnalyzerActions::default();
            let mut registrar = RegistrationContext {
                analyzer: id,
                ids,
                actions: &mut actions,
            };
            let outcome = catch_unwind(AssertUnwindSafe(|| analyzer.register(&mut registrar)));
            if let Err(payload) = outcome {
                sink.push(
                    id,
                    Locality::NonLocal,
                    analyzer_fault(analyzer.name(), "registration", &panic_message(&*payload)),
                );
            }
            debug!(
                "analyzer '{}' registered {} actions",
                analyzer.name(),
                actions.counts().total()
            );
            per_analyzer.push(Arc::new(GroupedAnalyzerActions::new(actions)));
        }
        ActionRegistry { per_analyzer }
    }

    pub fn analyzer_actions(&self, analyzer: AnalyzerId) -> &Arc<GroupedAnalyzerActions> {
        &self.per_analyzer[analyzer.index()]
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ANALYZER_FAULT_ID;
    use crate::model::SymbolKind;

    struct Registers;

    impl Analyzer for Registers {
        fn name(&self) -> &str {
            "registers"
        }

        fn register(&self, registrar: &mut RegistrationContext<'_>) {
            registrar.register_symbol_action(&[SymbolKind::Type, SymbolKind::Method], |_| Ok(()));
            registrar.register_compilation_end_action(|_| Ok(()));
        }
    }

    struct PanicsDuringRegister;

    impl Analyzer for PanicsDuringRegister {
        fn name(&self) -> &str {
            "panics"
        }

        fn register(&self, registrar: &mut RegistrationContext<'_>) {
            registrar.register_syntax_tree_action(|_| Ok(()));
            panic!("registration exploded");
        }
    }

    #[test]
    fn build_groups_actions_by_kind() {
        let analyzers: Vec<Arc<dyn Analyzer>> = vec![Arc::new(Registers)];
        let ids = ActionIdSource::default();
        let sink = DiagnosticSink::new();
        let registry = ActionRegistry::build(&analyzers, &ids, &sink);

        let grouped = registry.analyzer_actions(AnalyzerId(0));
        assert_eq!(grouped.symbol_actions(SymbolKind::Type).len(), 1);
        assert_eq!(grouped.symbol_actions(SymbolKind::Method).len(), 1);
        assert!(grouped.symbol_actions(SymbolKind::Field).is_empty());
        assert_eq!(grouped.actions.compilation_end.len(), 1);
        assert!(sink.is_empty());
    }

    #[test]
    fn faulting_registration_yields_one_diagnostic_and_keeps_prior_actions() {
        let analyzers: Vec<Arc<dyn Analyzer>> = vec![Arc::new(PanicsDuringRegister)];
        let ids = ActionIdSource::default();
        let sink = DiagnosticSink::new();
        let registry = ActionRegistry::build(&analyzers, &ids, &sink);

        let faults = sink.drain();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].diagnostic.rule, ANALYZER_FAULT_ID);
        assert!(faults[0].diagnostic.message.contains("registration exploded"));
        assert_eq!(
            registry
                .analyzer_actions(AnalyzerId(0))
                .actions
                .syntax_tree
                .len(),
            1
        );
    }
}
