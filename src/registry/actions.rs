//! Action descriptors: one record per trigger kind, carrying a callback
//! handle and, where applicable, a kind filter.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::Result;

use crate::analyzer::AnalyzerId;
use crate::model::{OperationKind, SymbolKind, SyntaxKind};
use crate::registry::contexts::{
    CodeBlockContext, CodeBlockStartContext, CompilationContext, CompilationStartContext,
    NodeContext, OperationBlockContext, OperationBlockStartContext, OperationContext,
    SemanticModelContext, SymbolContext, SymbolStartContext, SyntaxTreeContext,
};

/// Engine-wide unique identity of one registered action. Completion tracking
/// records processed actions by id, so ids must stay stable for the lifetime
/// of the driver that allocated them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(pub u32);

/// Allocates [`ActionId`]s for base and nested registrations alike.
#[derive(Debug, Default)]
pub struct ActionIdSource(AtomicU32);

impl ActionIdSource {
    pub fn next(&self) -> ActionId {
        ActionId(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

pub type CompilationStartCallback =
    Arc<dyn Fn(&mut CompilationStartContext<'_>) -> Result<()> + Send + Sync>;
pub type CompilationCallback = Arc<dyn Fn(&mut CompilationContext<'_>) -> Result<()> + Send + Sync>;
pub type SymbolCallback = Arc<dyn Fn(&mut SymbolContext<'_>) -> Result<()> + Send + Sync>;
pub type SymbolStartCallback =
    Arc<dyn Fn(&mut SymbolStartContext<'_>) -> Result<()> + Send + Sync>;
pub type SyntaxTreeCallback = Arc<dyn Fn(&mut SyntaxTreeContext<'_>) -> Result<()> + Send + Sync>;
pub type SemanticModelCallback =
    Arc<dyn Fn(&mut SemanticModelContext<'_>) -> Result<()> + Send + Sync>;
pub type NodeCallback = Arc<dyn Fn(&mut NodeContext<'_>) -> Result<()> + Send + Sync>;
pub type OperationCallback = Arc<dyn Fn(&mut OperationContext<'_>) -> Result<()> + Send + Sync>;
pub type CodeBlockStartCallback =
    Arc<dyn Fn(&mut CodeBlockStartContext<'_>) -> Result<()> + Send + Sync>;
pub type CodeBlockCallback = Arc<dyn Fn(&mut CodeBlockContext<'_>) -> Result<()> + Send + Sync>;
pub type OperationBlockStartCallback =
    Arc<dyn Fn(&mut OperationBlockStartContext<'_>) -> Result<()> + Send + Sync>;
pub type OperationBlockCallback =
    Arc<dyn Fn(&mut OperationBlockContext<'_>) -> Result<()> + Send + Sync>;

#[derive(Clone)]
pub struct CompilationStartAction {
    pub id: ActionId,
    pub analyzer: AnalyzerId,
    pub callback: CompilationStartCallback,
}

#[derive(Clone)]
pub struct CompilationEndAction {
    pub id: ActionId,
    pub analyzer: AnalyzerId,
    pub callback: CompilationCallback,
}

#[derive(Clone)]
pub struct SymbolAction {
    pub id: ActionId,
    pub analyzer: AnalyzerId,
    pub kinds: Vec<SymbolKind>,
    pub callback: SymbolCallback,
}

#[derive(Clone)]
pub struct SymbolStartAction {
    pub id: ActionId,
    pub analyzer: AnalyzerId,
    pub kinds: Vec<SymbolKind>,
    pub callback: SymbolStartCallback,
}

#[derive(Clone)]
pub struct SymbolEndAction {
    pub id: ActionId,
    pub analyzer: AnalyzerId,
    pub callback: SymbolCallback,
}

#[derive(Clone)]
pub struct SyntaxTreeAction {
    pub id: ActionId,
    pub analyzer: AnalyzerId,
    pub callback: SyntaxTreeCallback,
}

#[derive(Clone)]
pub struct SemanticModelAction {
    pub id: ActionId,
    pub analyzer: AnalyzerId,
    pub callback: SemanticModelCallback,
}

#[derive(Clone)]
pub struct NodeAction {
    pub id: ActionId,
    pub analyzer: AnalyzerId,
    pub kinds: Vec<SyntaxKind>,
    pub callback: NodeCallback,
}

#[derive(Clone)]
pub struct OperationAction {
    pub id: ActionId,
    pub analyzer: AnalyzerId,
    pub kinds: Vec<OperationKind>,
    pub callback: OperationCallback,
}

#[derive(Clone)]
pub struct CodeBlockStartAction {
    pub id: ActionId,
    pub analyzer: AnalyzerId,
    pub callback: CodeBlockStartCallback,
}

#[derive(Clone)]
pub struct CodeBlockEndAction {
    pub id: ActionId,
    pub analyzer: AnalyzerId,
    pub callback: CodeBlockCallback,
}

#[derive(Clone)]
pub struct OperationBlockStartAction {
    pub id: ActionId,
    pub analyzer: AnalyzerId,
    pub callback: OperationBlockStartCallback,
}

#[derive(Clone)]
pub struct OperationBlockEndAction {
    pub id: ActionId,
    pub analyzer: AnalyzerId,
    pub callback: OperationBlockCallback,
}

/// All actions of one analyzer, flat by trigger kind. Also used for nested
/// action sets collected by start-phase callbacks.
#[derive(Clone, Default)]
pub struct AnalyzerActions {
    pub compilation_start: Vec<CompilationStartAction>,
    pub compilation_end: Vec<CompilationEndAction>,
    pub symbol: Vec<SymbolAction>,
    pub symbol_start: Vec<SymbolStartAction>,
    pub symbol_end: Vec<SymbolEndAction>,
    pub syntax_tree: Vec<SyntaxTreeAction>,
    pub semantic_model: Vec<SemanticModelAction>,
    pub node: Vec<NodeAction>,
    pub operation: Vec<OperationAction>,
    pub code_block_start: Vec<CodeBlockStartAction>,
    pub code_block_end: Vec<CodeBlockEndAction>,
    pub operation_block_start: Vec<OperationBlockStartAction>,
    pub operation_block_end: Vec<OperationBlockEndAction>,
}

impl AnalyzerActions {
    /// Merges another set into this one. Callback handles are shared.
    pub fn extend(&mut self, other: &AnalyzerActions) {
        self.compilation_start
            .extend(other.compilation_start.iter().cloned());
        self.compilation_end
            .extend(other.compilation_end.iter().cloned());
        self.symbol.extend(other.symbol.iter().cloned());
        self.symbol_start.extend(other.symbol_start.iter().cloned());
        self.symbol_end.extend(other.symbol_end.iter().cloned());
        self.syntax_tree.extend(other.syntax_tree.iter().cloned());
        self.semantic_model
            .extend(other.semantic_model.iter().cloned());
        self.node.extend(other.node.iter().cloned());
        self.operation.extend(other.operation.iter().cloned());
        self.code_block_start
            .extend(other.code_block_start.iter().cloned());
        self.code_block_end
            .extend(other.code_block_end.iter().cloned());
        self.operation_block_start
            .extend(other.operation_block_start.iter().cloned());
        self.operation_block_end
            .extend(other.operation_block_end.iter().cloned());
    }

    /// Actions inheritable by member symbols from a container's symbol-start
    /// scope: everything that applies to declarations, but not the
    /// container's own end actions.
    pub fn inheritable(&self) -> AnalyzerActions {
        AnalyzerActions {
            node: self.node.clone(),
            operation: self.operation.clone(),
            code_block_start: self.code_block_start.clone(),
            code_block_end: self.code_block_end.clone(),
            operation_block_start: self.operation_block_start.clone(),
            operation_block_end: self.operation_block_end.clone(),
            ..AnalyzerActions::default()
        }
    }

    pub fn counts(&self) -> ActionCounts {
        ActionCounts {
            compilation_start: self.compilation_start.len(),
            compilation_end: self.compilation_end.len(),
            symbol: self.symbol.len(),
            symbol_start: self.symbol_start.len(),
            symbol_end: self.symbol_end.len(),
            syntax_tree: self.syntax_tree.len(),
            semantic_model: self.semantic_model.len(),
            node: self.node.len(),
            operation: self.operation.len(),
            code_block: self.code_block_start.len() + self.code_block_end.len(),
            operation_block: self.operation_block_start.len() + self.operation_block_end.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts().total() == 0
    }

    /// Whether any registered action can respond to declaration analysis
    /// (node, operation, or block actions).
    pub fn has_declaration_actions(&self) -> bool {
        !self.node.is_empty()
            || !self.operation.is_empty()
            || !self.code_block_start.is_empty()
            || !self.code_block_end.is_empty()
            || !self.operation_block_start.is_empty()
            || !self.operation_block_end.is_empty()
    }
}

/// Per-analyzer action totals, surfaced for logging and the driver's no-op
/// fast path.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ActionCounts {
    pub compilation_start: usize,
    pub compilation_end: usize,
    pub symbol: usize,
    pub symbol_start: usize,
    pub symbol_end: usize,
    pub syntax_tree: usize,
    pub semantic_model: usize,
    pub node: usize,
    pub operation: usize,
    pub code_block: usize,
    pub operation_block: usize,
}

impl ActionCounts {
    pub fn total(&self) -> usize {
        self.compilation_start
            + self.compilation_end
            + self.symbol
            + self.symbol_start
            + self.symbol_end
            + self.syntax_tree
            + self.semantic_model
            + self.node
            + self.operation
            + self.code_block
            + self.operation_block
    }
}
