//! Concurrent, incremental execution engine for pluggable source analyzers.
//!
//! An [`AnalyzerDriver`] consumes the ordered [`CompilationEvent`] stream of
//! a compilation and fans each event out to every registered [`Analyzer`],
//! invoking the callbacks the analyzer registered for symbols, syntax nodes,
//! operations, code blocks, files, and the compilation itself. Work is
//! tracked per (analyzer, entity) so overlapping or repeated requests never
//! duplicate an invocation, faulting analyzers are isolated into diagnostics
//! instead of taking down the run, and a cancelled run resumes from the
//! unexecuted remainder.

pub mod analyzer;
pub mod cancellation;
pub(crate) mod context;
pub mod diagnostics;
pub mod driver;
pub mod events;
pub(crate) mod executor;
pub mod model;
pub mod registry;
pub mod results;
pub mod scope;
pub(crate) mod state;
pub(crate) mod telemetry;

pub use crate::analyzer::{Analyzer, AnalyzerId};
pub use crate::cancellation::CancellationToken;
pub use crate::diagnostics::{
    Diagnostic, NoSuppression, Severity, SuppressionOracle, ANALYZER_FAULT_ID, ENGINE_FAULT_ID,
};
pub use crate::driver::{AnalysisOptions, AnalyzerDriver, RunStatus};
pub use crate::events::CompilationEvent;
pub use crate::model::memory::{CompilationModel, ModelBuilder};
pub use crate::model::{
    FileId, OperationKind, SemanticOracle, Span, Symbol, SymbolId, SymbolKind, SyntaxKind,
};
pub use crate::registry::contexts::RegistrationContext;
pub use crate::results::{AnalysisReport, AnalyzerReport, ResultAggregator};
pub use crate::scope::AnalysisScope;
