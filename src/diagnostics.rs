//! Diagnostics, fault diagnostics, suppression, and the append-only sink.

use crossbeam::queue::SegQueue;
use serde::{Deserialize, Serialize};

use crate::analyzer::AnalyzerId;
use crate::model::{FileId, Span};

/// Descriptor id of the diagnostic reporting an analyzer callback fault.
pub const ANALYZER_FAULT_ID: &str = "LD0001";
/// Descriptor id of the diagnostic reporting an engine fault.
pub const ENGINE_FAULT_ID: &str = "LD0002";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Rule/descriptor identifier, e.g. "LD0001" or an analyzer's own id.
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    pub location: Option<Span>,
}

impl Diagnostic {
    pub fn new(rule: &str, severity: Severity, message: impl Into<String>) -> Self {
        Diagnostic {
            rule: rule.to_string(),
            severity,
            message: message.into(),
            location: None,
        }
    }

    pub fn warning(rule: &str, message: impl Into<String>) -> Self {
        Self::new(rule, Severity::Warning, message)
    }

    pub fn with_location(mut self, span: Span) -> Self {
        self.location = Some(span);
        self
    }

    /// Identity used for append-with-dedup merging of partial reruns.
    pub fn identity(&self) -> (&str, Option<Span>, &str) {
        (&self.rule, self.location, &self.message)
    }
}

/// Diagnostic reporting that an analyzer callback faulted. The run continues;
/// the fault never propagates past the executor.
pub fn analyzer_fault(analyzer_name: &str, context: &str, message: &str) -> Diagnostic {
    Diagnostic::new(
        ANALYZER_FAULT_ID,
        Severity::Warning,
        format!("analyzer '{analyzer_name}' threw during {context}: {message}"),
    )
}

/// Diagnostic reporting an internal engine fault. Reported once, then the run
/// continues best-effort.
pub fn engine_fault(context: &str, message: &str) -> Diagnostic {
    Diagnostic::new(
        ENGINE_FAULT_ID,
        Severity::Warning,
        format!("analysis engine fault during {context}: {message}"),
    )
}

/// Consulted just before diagnostics are externally surfaced. The textual
/// suppression parser behind this lives outside the engine.
pub trait SuppressionOracle: Send + Sync {
    fn is_suppressed(&self, diagnostic: &Diagnostic) -> bool;
}

/// Default oracle: nothing is suppressed.
pub struct NoSuppression;

impl SuppressionOracle for NoSuppression {
    fn is_suppressed(&self, _diagnostic: &Diagnostic) -> bool {
        false
    }
}

/// Whether a diagnostic is attributable to the span currently under analysis.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Locality {
    /// Attributable to a specific file; merged into per-file buckets.
    Local(FileId),
    /// Compilation-wide, or outside the analyzed span.
    NonLocal,
}

#[derive(Clone, Debug)]
pub struct SinkEntry {
    pub analyzer: AnalyzerId,
    pub locality: Locality,
    pub diagnostic: Diagnostic,
}

/// Thread-safe append-only diagnostic queue shared by all workers. Drained by
/// the driver into the result aggregator when a run finishes or is cancelled.
#[derive(Default)]
pub struct DiagnosticSink {
    entries: SegQueue<SinkEntry>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, analyzer: AnalyzerId, locality: Locality, diagnostic: Diagnostic) {
        self.entries.push(SinkEntry {
            analyzer,
            locality,
            diagnostic,
        });
    }

    pub fn drain(&self) -> Vec<SinkEntry> {
        let mut out = Vec::new();
        while let Some(entry) = self.entries.pop() {
            out.push(entry);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_preserves_entries_across_threads() {
        let sink = DiagnosticSink::new();
        std::thread::scope(|scope| {
            for i in 0..4 {
                let sink = &sink;
                scope.spawn(move || {
                    sink.push(
                        AnalyzerId(i),
                        Locality::NonLocal,
                        Diagnostic::warning("T01", format!("from {i}")),
                    );
                });
            }
        });
        assert_eq!(sink.drain().len(), 4);
        assert!(sink.is_empty());
    }

    #[test]
    fn fault_diagnostics_carry_descriptor_ids() {
        let fault = analyzer_fault("demo", "symbol action", "boom");
        assert_eq!(fault.rule, ANALYZER_FAULT_ID);
        assert!(fault.message.contains("demo"));
        assert!(fault.message.contains("symbol action"));

        let fault = engine_fault("event dispatch", "unexpected state");
        assert_eq!(fault.rule, ENGINE_FAULT_ID);
    }
}
