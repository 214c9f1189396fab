//! Analysis scopes: the whole compilation, one file, or one span within a
//! file for interactive partial analysis.

use serde::{Deserialize, Serialize};

use crate::model::{DeclRef, FileId, Span, Symbol};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
enum ScopeKind {
    Compilation,
    File(FileId),
    Span(Span),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisScope {
    kind: ScopeKind,
}

impl AnalysisScope {
    pub fn compilation() -> Self {
        AnalysisScope {
            kind: ScopeKind::Compilation,
        }
    }

    pub fn file(file: FileId) -> Self {
        AnalysisScope {
            kind: ScopeKind::File(file),
        }
    }

    pub fn span(span: Span) -> Self {
        AnalysisScope {
            kind: ScopeKind::Span(span),
        }
    }

    pub fn is_full_compilation(&self) -> bool {
        matches!(self.kind, ScopeKind::Compilation)
    }

    /// Whether this scope covers the named file in full. Determines the
    /// overwrite-vs-append merge policy for that file's diagnostics.
    pub fn is_full_file(&self, file: FileId) -> bool {
        match self.kind {
            ScopeKind::Compilation => true,
            ScopeKind::File(f) => f == file,
            ScopeKind::Span(_) => false,
        }
    }

    pub fn includes_file(&self, file: FileId) -> bool {
        match self.kind {
            ScopeKind::Compilation => true,
            ScopeKind::File(f) => f == file,
            ScopeKind::Span(span) => span.file == file,
        }
    }

    pub fn includes_declaration(&self, decl: &DeclRef) -> bool {
        match self.kind {
            ScopeKind::Compilation => true,
            ScopeKind::File(f) => f == decl.file,
            ScopeKind::Span(span) => span.intersects(&decl.span),
        }
    }

    /// Whether any declaring reference of the symbol falls inside the scope.
    pub fn should_analyze_symbol(&self, symbol: &Symbol) -> bool {
        symbol
            .declarations
            .iter()
            .any(|decl| self.includes_declaration(decl))
    }

    /// The span restricting node/operation dispatch within `file`, if this
    /// is a span-limited request.
    pub fn filter_span(&self, file: FileId) -> Option<Span> {
        match self.kind {
            ScopeKind::Span(span) if span.file == file => Some(span),
            _ => None,
        }
    }
}
