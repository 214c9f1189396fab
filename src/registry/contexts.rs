//! Contexts handed to analyzer callbacks.
//!
//! Registration contexts collect action descriptors; execution contexts give
//! a callback its entity, oracle access, and a diagnostic reporter. Start
//! contexts are both: they execute against an entity and collect nested
//! registrations into a scoped collector owned by the executor.

use std::sync::Arc;

use anyhow::Result;

use crate::analyzer::AnalyzerId;
use crate::cancellation::CancellationToken;
use crate::diagnostics::Diagnostic;
use crate::model::{
    FileId, Operation, OperationBlock, OperationKind, SemanticOracle, Symbol, SymbolKind,
    SyntaxKind, SyntaxNode, SyntaxTree,
};
use crate::registry::actions::{
    ActionIdSource, AnalyzerActions, CodeBlockEndAction, CodeBlockStartAction,
    CompilationEndAction, CompilationStartAction, NodeAction, OperationAction,
    OperationBlockEndAction, OperationBlockStartAction, SemanticModelAction, SymbolAction,
    SymbolEndAction, SymbolStartAction, SyntaxTreeAction,
};

pub(crate) struct ContextCore<'a> {
    pub(crate) oracle: &'a dyn SemanticOracle,
    pub(crate) cancel: &'a CancellationToken,
    pub(crate) reported: Vec<Diagnostic>,
}

impl<'a> ContextCore<'a> {
    pub(crate) fn new(oracle: &'a dyn SemanticOracle, cancel: &'a CancellationToken) -> Self {
        ContextCore {
            oracle,
            cancel,
            reported: Vec::new(),
        }
    }
}

/// Executor-side access to the diagnostics a callback reported.
pub(crate) trait ReportBuffer {
    fn take_reported(&mut self) -> Vec<Diagnostic>;
}

macro_rules! context_common {
    ($($ty:ident),+ $(,)?) => {$(
        impl<'a> $ty<'a> {
            /// Reports a diagnostic attributed to the invoking analyzer.
            pub fn report(&mut self, diagnostic: Diagnostic) {
                self.core.reported.push(diagnostic);
            }

            pub fn oracle(&self) -> &'a dyn SemanticOracle {
                self.core.oracle
            }

            /// Long-running callbacks should poll this and return early.
            pub fn is_cancelled(&self) -> bool {
                self.core.cancel.is_cancelled()
            }
        }

        impl<'a> ReportBuffer for $ty<'a> {
            fn take_reported(&mut self) -> Vec<Diagnostic> {
                std::mem::take(&mut self.core.reported)
            }
        }
    )+};
}

context_common!(
    CompilationStartContext,
    CompilationContext,
    SymbolContext,
    SymbolStartContext,
    SyntaxTreeContext,
    SemanticModelContext,
    NodeContext,
    OperationContext,
    CodeBlockStartContext,
    CodeBlockContext,
    OperationBlockStartContext,
    OperationBlockContext,
);

/// Collects an analyzer's base registrations, passed to
/// [`Analyzer::register`](crate::analyzer::Analyzer::register) exactly once.
pub struct RegistrationContext<'a> {
    pub(crate) analyzer: AnalyzerId,
    pub(crate) ids: &'a ActionIdSource,
    pub(crate) actions: &'a mut AnalyzerActions,
}

impl<'a> RegistrationContext<'a> {
    pub fn register_compilation_start_action(
        &mut self,
        callback: impl Fn(&mut CompilationStartContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.actions.compilation_start.push(CompilationStartAction {
            id: self.ids.next(),
            analyzer: self.analyzer,
            callback: Arc::new(callback),
        });
    }

    pub fn register_compilation_end_action(
        &mut self,
        callback: impl Fn(&mut CompilationContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.actions.compilation_end.push(CompilationEndAction {
            id: self.ids.next(),
            analyzer: self.analyzer,
            callback: Arc::new(callback),
        });
    }

    pub fn register_symbol_action(
        &mut self,
        kinds: &[SymbolKind],
        callback: impl Fn(&mut SymbolContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.actions.symbol.push(SymbolAction {
            id: self.ids.next(),
            analyzer: self.analyzer,
            kinds: kinds.to_vec(),
            callback: Arc::new(callback),
        });
    }

    pub fn register_symbol_start_action(
        &mut self,
        kinds: &[SymbolKind],
        callback: impl Fn(&mut SymbolStartContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.actions.symbol_start.push(SymbolStartAction {
            id: self.ids.next(),
            analyzer: self.analyzer,
            kinds: kinds.to_vec(),
            callback: Arc::new(callback),
        });
    }

    pub fn register_syntax_tree_action(
        &mut self,
        callback: impl Fn(&mut SyntaxTreeContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.actions.syntax_tree.push(SyntaxTreeAction {
            id: self.ids.next(),
            analyzer: self.analyzer,
            callback: Arc::new(callback),
        });
    }

    pub fn register_semantic_model_action(
        &mut self,
        callback: impl Fn(&mut SemanticModelContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.actions.semantic_model.push(SemanticModelAction {
            id: self.ids.next(),
            analyzer: self.analyzer,
            callback: Arc::new(callback),
        });
    }

    pub fn register_node_action(
        &mut self,
        kinds: &[SyntaxKind],
        callback: impl Fn(&mut NodeContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.actions.node.push(NodeAction {
            id: self.ids.next(),
            analyzer: self.analyzer,
            kinds: kinds.to_vec(),
            callback: Arc::new(callback),
        });
    }

    pub fn register_operation_action(
        &mut self,
        kinds: &[OperationKind],
        callback: impl Fn(&mut OperationContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.actions.operation.push(OperationAction {
            id: self.ids.next(),
            analyzer: self.analyzer,
            kinds: kinds.to_vec(),
            callback: Arc::new(callback),
        });
    }

    pub fn register_code_block_start_action(
        &mut self,
        callback: impl Fn(&mut CodeBlockStartContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.actions.code_block_start.push(CodeBlockStartAction {
            id: self.ids.next(),
            analyzer: self.analyzer,
            callback: Arc::new(callback),
        });
    }

    pub fn register_code_block_end_action(
        &mut self,
        callback: impl Fn(&mut CodeBlockContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.actions.code_block_end.push(CodeBlockEndAction {
            id: self.ids.next(),
            analyzer: self.analyzer,
            callback: Arc::new(callback),
        });
    }

    pub fn register_operation_block_start_action(
        &mut self,
        callback: impl Fn(&mut OperationBlockStartContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.actions
            .operation_block_start
            .push(OperationBlockStartAction {
                id: self.ids.next(),
                analyzer: self.analyzer,
                callback: Arc::new(callback),
            });
    }

    pub fn register_operation_block_end_action(
        &mut self,
        callback: impl Fn(&mut OperationBlockContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.actions
            .operation_block_end
            .push(OperationBlockEndAction {
                id: self.ids.next(),
                analyzer: self.analyzer,
                callback: Arc::new(callback),
            });
    }
}

/// Context of a compilation-start action. Nested registrations land in a
/// scoped collector merged with any prior, now-resumed partial run.
pub struct CompilationStartContext<'a> {
    pub(crate) core: ContextCore<'a>,
    pub(crate) registrar: RegistrationContext<'a>,
}

impl<'a> CompilationStartContext<'a> {
    pub(crate) fn new(core: ContextCore<'a>, registrar: RegistrationContext<'a>) -> Self {
        CompilationStartContext { core, registrar }
    }

    // Nested registrations scoped to this compilation run. Everything except
    // another compilation-start action can be registered here.

    pub fn register_compilation_end_action(
        &mut self,
        callback: impl Fn(&mut CompilationContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.registrar.register_compilation_end_action(callback);
    }

    pub fn register_symbol_action(
        &mut self,
        kinds: &[SymbolKind],
        callback: impl Fn(&mut SymbolContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.registrar.register_symbol_action(kinds, callback);
    }

    pub fn register_symbol_start_action(
        &mut self,
        kinds: &[SymbolKind],
        callback: impl Fn(&mut SymbolStartContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.registrar.register_symbol_start_action(kinds, callback);
    }

    pub fn register_syntax_tree_action(
        &mut self,
        callback: impl Fn(&mut SyntaxTreeContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.registrar.register_syntax_tree_action(callback);
    }

    pub fn register_semantic_model_action(
        &mut self,
        callback: impl Fn(&mut SemanticModelContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.registrar.register_semantic_model_action(callback);
    }

    pub fn register_node_action(
        &mut self,
        kinds: &[SyntaxKind],
        callback: impl Fn(&mut NodeContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.registrar.register_node_action(kinds, callback);
    }

    pub fn register_operation_action(
        &mut self,
        kinds: &[OperationKind],
        callback: impl Fn(&mut OperationContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.registrar.register_operation_action(kinds, callback);
    }

    pub fn register_code_block_start_action(
        &mut self,
        callback: impl Fn(&mut CodeBlockStartContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.registrar.register_code_block_start_action(callback);
    }

    pub fn register_code_block_end_action(
        &mut self,
        callback: impl Fn(&mut CodeBlockContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.registrar.register_code_block_end_action(callback);
    }

    pub fn register_operation_block_start_action(
        &mut self,
        callback: impl Fn(&mut OperationBlockStartContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.registrar.register_operation_block_start_action(callback);
    }

    pub fn register_operation_block_end_action(
        &mut self,
        callback: impl Fn(&mut OperationBlockContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.registrar.register_operation_block_end_action(callback);
    }
}

/// Context of a compilation-end action.
pub struct CompilationContext<'a> {
    pub(crate) core: ContextCore<'a>,
}

impl<'a> CompilationContext<'a> {
    pub(crate) fn new(core: ContextCore<'a>) -> Self {
        CompilationContext { core }
    }
}

/// Context of a symbol or symbol-end action.
pub struct SymbolContext<'a> {
    pub(crate) core: ContextCore<'a>,
    pub(crate) symbol: &'a Symbol,
}

impl<'a> SymbolContext<'a> {
    pub(crate) fn new(core: ContextCore<'a>, symbol: &'a Symbol) -> Self {
        SymbolContext { core, symbol }
    }

    pub fn symbol(&self) -> &'a Symbol {
        self.symbol
    }
}

/// Context of a symbol-start action: registers end actions and declaration
/// actions scoped to this symbol and its members.
pub struct SymbolStartContext<'a> {
    pub(crate) core: ContextCore<'a>,
    pub(crate) symbol: &'a Symbol,
    pub(crate) analyzer: AnalyzerId,
    pub(crate) ids: &'a ActionIdSource,
    pub(crate) collector: &'a mut AnalyzerActions,
}

impl<'a> SymbolStartContext<'a> {
    pub(crate) fn new(
        core: ContextCore<'a>,
        symbol: &'a Symbol,
        analyzer: AnalyzerId,
        ids: &'a ActionIdSource,
        collector: &'a mut AnalyzerActions,
    ) -> Self {
        SymbolStartContext {
            core,
            symbol,
            analyzer,
            ids,
            collector,
        }
    }

    pub fn symbol(&self) -> &'a Symbol {
        self.symbol
    }

    /// The paired end action, run only after this symbol and all its members
    /// are fully analyzed.
    pub fn register_symbol_end_action(
        &mut self,
        callback: impl Fn(&mut SymbolContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.collector.symbol_end.push(SymbolEndAction {
            id: self.ids.next(),
            analyzer: self.analyzer,
            callback: Arc::new(callback),
        });
    }

    pub fn register_node_action(
        &mut self,
        kinds: &[SyntaxKind],
        callback: impl Fn(&mut NodeContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.collector.node.push(NodeAction {
            id: self.ids.next(),
            analyzer: self.analyzer,
            kinds: kinds.to_vec(),
            callback: Arc::new(callback),
        });
    }

    pub fn register_operation_action(
        &mut self,
        kinds: &[OperationKind],
        callback: impl Fn(&mut OperationContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.collector.operation.push(OperationAction {
            id: self.ids.next(),
            analyzer: self.analyzer,
            kinds: kinds.to_vec(),
            callback: Arc::new(callback),
        });
    }

    pub fn register_code_block_start_action(
        &mut self,
        callback: impl Fn(&mut CodeBlockStartContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.collector.code_block_start.push(CodeBlockStartAction {
            id: self.ids.next(),
            analyzer: self.analyzer,
            callback: Arc::new(callback),
        });
    }

    pub fn register_code_block_end_action(
        &mut self,
        callback: impl Fn(&mut CodeBlockContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.collector.code_block_end.push(CodeBlockEndAction {
            id: self.ids.next(),
            analyzer: self.analyzer,
            callback: Arc::new(callback),
        });
    }

    pub fn register_operation_block_start_action(
        &mut self,
        callback: impl Fn(&mut OperationBlockStartContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.collector
            .operation_block_start
            .push(OperationBlockStartAction {
                id: self.ids.next(),
                analyzer: self.analyzer,
                callback: Arc::new(callback),
            });
    }

    pub fn register_operation_block_end_action(
        &mut self,
        callback: impl Fn(&mut OperationBlockContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.collector
            .operation_block_end
            .push(OperationBlockEndAction {
                id: self.ids.next(),
                analyzer: self.analyzer,
                callback: Arc::new(callback),
            });
    }
}

/// Context of a file-level syntax action; needs no semantic event.
pub struct SyntaxTreeContext<'a> {
    pub(crate) core: ContextCore<'a>,
    pub(crate) tree: &'a SyntaxTree,
}

impl<'a> SyntaxTreeContext<'a> {
    pub(crate) fn new(core: ContextCore<'a>, tree: &'a SyntaxTree) -> Self {
        SyntaxTreeContext { core, tree }
    }

    pub fn tree(&self) -> &'a SyntaxTree {
        self.tree
    }
}

/// Context of a semantic-model action for one completed file.
pub struct SemanticModelContext<'a> {
    pub(crate) core: ContextCore<'a>,
    pub(crate) file: FileId,
}

impl<'a> SemanticModelContext<'a> {
    pub(crate) fn new(core: ContextCore<'a>, file: FileId) -> Self {
        SemanticModelContext { core, file }
    }

    pub fn file(&self) -> FileId {
        self.file
    }
}

/// Context of a syntax-node action within one declaration.
pub struct NodeContext<'a> {
    pub(crate) core: ContextCore<'a>,
    pub(crate) node: &'a SyntaxNode,
    pub(crate) owner: &'a Symbol,
}

impl<'a> NodeContext<'a> {
    pub(crate) fn new(core: ContextCore<'a>, node: &'a SyntaxNode, owner: &'a Symbol) -> Self {
        NodeContext { core, node, owner }
    }

    pub fn node(&self) -> &'a SyntaxNode {
        self.node
    }

    /// The symbol whose declaration contains this node.
    pub fn owner(&self) -> &'a Symbol {
        self.owner
    }
}

/// Context of an operation action within one declaration.
pub struct OperationContext<'a> {
    pub(crate) core: ContextCore<'a>,
    pub(crate) operation: &'a Operation,
    pub(crate) owner: &'a Symbol,
}

impl<'a> OperationContext<'a> {
    pub(crate) fn new(core: ContextCore<'a>, operation: &'a Operation, owner: &'a Symbol) -> Self {
        OperationContext {
            core,
            operation,
            owner,
        }
    }

    pub fn operation(&self) -> &'a Operation {
        self.operation
    }

    pub fn owner(&self) -> &'a Symbol {
        self.owner
    }
}

/// Context of a code-block-start action: registers node actions and the
/// paired end action for this block only.
pub struct CodeBlockStartContext<'a> {
    pub(crate) core: ContextCore<'a>,
    pub(crate) owner: &'a Symbol,
    pub(crate) block: &'a SyntaxNode,
    pub(crate) analyzer: AnalyzerId,
    pub(crate) ids: &'a ActionIdSource,
    pub(crate) collector: &'a mut AnalyzerActions,
}

impl<'a> CodeBlockStartContext<'a> {
    pub(crate) fn new(
        core: ContextCore<'a>,
        owner: &'a Symbol,
        block: &'a SyntaxNode,
        analyzer: AnalyzerId,
        ids: &'a ActionIdSource,
        collector: &'a mut AnalyzerActions,
    ) -> Self {
        CodeBlockStartContext {
            core,
            owner,
            block,
            analyzer,
            ids,
            collector,
        }
    }

    pub fn owner(&self) -> &'a Symbol {
        self.owner
    }

    pub fn block(&self) -> &'a SyntaxNode {
        self.block
    }

    pub fn register_node_action(
        &mut self,
        kinds: &[SyntaxKind],
        callback: impl Fn(&mut NodeContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.collector.node.push(NodeAction {
            id: self.ids.next(),
            analyzer: self.analyzer,
            kinds: kinds.to_vec(),
            callback: Arc::new(callback),
        });
    }

    pub fn register_code_block_end_action(
        &mut self,
        callback: impl Fn(&mut CodeBlockContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.collector.code_block_end.push(CodeBlockEndAction {
            id: self.ids.next(),
            analyzer: self.analyzer,
            callback: Arc::new(callback),
        });
    }
}

/// Context of a code-block-end action.
pub struct CodeBlockContext<'a> {
    pub(crate) core: ContextCore<'a>,
    pub(crate) owner: &'a Symbol,
    pub(crate) block: &'a SyntaxNode,
}

impl<'a> CodeBlockContext<'a> {
    pub(crate) fn new(core: ContextCore<'a>, owner: &'a Symbol, block: &'a SyntaxNode) -> Self {
        CodeBlockContext { core, owner, block }
    }

    pub fn owner(&self) -> &'a Symbol {
        self.owner
    }

    pub fn block(&self) -> &'a SyntaxNode {
        self.block
    }
}

/// Context of an operation-block-start action.
pub struct OperationBlockStartContext<'a> {
    pub(crate) core: ContextCore<'a>,
    pub(crate) owner: &'a Symbol,
    pub(crate) blocks: &'a [OperationBlock],
    pub(crate) analyzer: AnalyzerId,
    pub(crate) ids: &'a ActionIdSource,
    pub(crate) collector: &'a mut AnalyzerActions,
}

impl<'a> OperationBlockStartContext<'a> {
    pub(crate) fn new(
        core: ContextCore<'a>,
        owner: &'a Symbol,
        blocks: &'a [OperationBlock],
        analyzer: AnalyzerId,
        ids: &'a ActionIdSource,
        collector: &'a mut AnalyzerActions,
    ) -> Self {
        OperationBlockStartContext {
            core,
            owner,
            blocks,
            analyzer,
            ids,
            collector,
        }
    }

    pub fn owner(&self) -> &'a Symbol {
        self.owner
    }

    pub fn blocks(&self) -> &'a [OperationBlock] {
        self.blocks
    }

    pub fn register_operation_action(
        &mut self,
        kinds: &[OperationKind],
        callback: impl Fn(&mut OperationContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.collector.operation.push(OperationAction {
            id: self.ids.next(),
            analyzer: self.analyzer,
            kinds: kinds.to_vec(),
            callback: Arc::new(callback),
        });
    }

    pub fn register_operation_block_end_action(
        &mut self,
        callback: impl Fn(&mut OperationBlockContext<'_>) -> Result<()> + Send + Sync + 'static,
    ) {
        self.collector
            .operation_block_end
            .push(OperationBlockEndAction {
                id: self.ids.next(),
                analyzer: self.analyzer,
                callback: Arc::new(callback),
            });
    }
}

/// Context of an operation-block-end action.
pub struct OperationBlockContext<'a> {
    pub(crate) core: ContextCore<'a>,
    pub(crate) owner: &'a Symbol,
    pub(crate) blocks: &'a [OperationBlock],
}

impl<'a> OperationBlockContext<'a> {
    pub(crate) fn new(core: ContextCore<'a>, owner: &'a Symbol, blocks: &'a [OperationBlock]) -> Self {
        OperationBlockContext {
            core,
            owner,
            blocks,
        }
    }

    pub fn owner(&self) -> &'a Symbol {
        self.owner
    }

    pub fn blocks(&self) -> &'a [OperationBlock] {
        self.blocks
    }
}
