//! Compilation events, the unit of work handed to the scheduler.

use serde::{Deserialize, Serialize};

use crate::model::{FileId, SymbolId};

/// One unit of compiler-produced structural progress. Events are produced in
/// order by the front end, consumed once, and discarded once every interested
/// analyzer has fully processed them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompilationEvent {
    /// The compilation began; triggers compilation-start actions.
    Started,
    /// A source symbol was declared; fans out to symbol actions and
    /// per-declaration node/operation/code-block analysis.
    SymbolDeclared { symbol: SymbolId },
    /// All declarations in one file were produced; triggers semantic-model
    /// actions for that file.
    FileCompleted { file: FileId },
    /// Terminal event, withheld until every other event is fully processed.
    Completed,
}

impl CompilationEvent {
    pub fn description(&self) -> String {
        match self {
            CompilationEvent::Started => "compilation started".to_string(),
            CompilationEvent::SymbolDeclared { symbol } => {
                format!("symbol {} declared", symbol.0)
            }
            CompilationEvent::FileCompleted { file } => format!("file {} completed", file.0),
            CompilationEvent::Completed => "compilation completed".to_string(),
        }
    }
}
