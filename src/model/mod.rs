//! Data types of the abstract object model the engine queries.
//!
//! The engine never builds symbols or syntax itself; it consumes a read-only
//! [`SemanticOracle`] provided by the embedding front end. The in-memory
//! [`CompilationModel`](memory::CompilationModel) implements the oracle for
//! tests and lightweight embedders.

pub mod memory;

use serde::{Deserialize, Serialize};

/// Identity of one source file in the compilation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub u32);

/// Identity of one declared symbol.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    Namespace,
    Type,
    Method,
    Field,
    Property,
    Local,
}

impl SymbolKind {
    /// Kinds that can contain member symbols.
    pub fn is_container(self) -> bool {
        matches!(self, SymbolKind::Namespace | SymbolKind::Type)
    }

    /// Kinds whose declarations carry an executable code block.
    pub fn has_code_block(self) -> bool {
        matches!(self, SymbolKind::Method | SymbolKind::Property)
    }
}

/// A half-open character range within one file.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub file: FileId,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(file: FileId, start: u32, end: u32) -> Self {
        Span { file, start, end }
    }

    /// Whether two spans share at least one position (touching counts).
    pub fn intersects(&self, other: &Span) -> bool {
        self.file == other.file && self.start <= other.end && other.start <= self.end
    }

    pub fn contains(&self, other: &Span) -> bool {
        self.file == other.file && self.start <= other.start && other.end <= self.end
    }
}

/// One declaring reference of a symbol. Partial/multi-file declarations have
/// several, indexed by position in [`Symbol::declarations`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeclRef {
    pub file: FileId,
    pub span: Span,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    /// Immediately containing namespace or type, if any.
    pub container: Option<SymbolId>,
    /// Compiler-synthesized symbols are excluded from symbol analysis and
    /// from container member sets.
    pub is_synthesized: bool,
    pub declarations: Vec<DeclRef>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyntaxKind {
    CompilationUnit,
    NamespaceDecl,
    TypeDecl,
    MethodDecl,
    FieldDecl,
    Block,
    Call,
    Assignment,
    Identifier,
    Literal,
    Return,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyntaxNode {
    pub kind: SyntaxKind,
    pub span: Span,
    pub children: Vec<SyntaxNode>,
}

impl SyntaxNode {
    pub fn leaf(kind: SyntaxKind, span: Span) -> Self {
        SyntaxNode {
            kind,
            span,
            children: Vec::new(),
        }
    }

    pub fn with_children(kind: SyntaxKind, span: Span, children: Vec<SyntaxNode>) -> Self {
        SyntaxNode {
            kind,
            span,
            children,
        }
    }

    /// Pre-order traversal of this node and all descendants.
    pub fn descendants(&self) -> Vec<&SyntaxNode> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node);
            for child in node.children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyntaxTree {
    pub file: FileId,
    pub path: String,
    pub root: SyntaxNode,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Invocation,
    Assignment,
    Literal,
    Return,
    Branch,
    Loop,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OperationKind,
    pub span: Span,
}

/// One executable region of a declaration, lowered to operations.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OperationBlock {
    pub operations: Vec<Operation>,
}

/// Read-only semantic/syntax queries the engine issues against the front end.
///
/// Implementations must be cheap to query repeatedly; the engine does not
/// cache oracle answers beyond the lifetime of a single action set.
pub trait SemanticOracle: Send + Sync {
    fn symbol(&self, id: SymbolId) -> &Symbol;

    fn declaring_references(&self, id: SymbolId) -> &[DeclRef];

    /// Direct members of a container symbol, synthesized members included.
    fn members(&self, container: SymbolId) -> Vec<SymbolId>;

    /// The topmost node suitable for analysis of one declaring reference.
    fn topmost_node(&self, symbol: SymbolId, declaration_index: usize) -> SyntaxNode;

    /// Executable regions of one declaring reference, empty for symbols
    /// without code blocks.
    fn operation_blocks(&self, symbol: SymbolId, declaration_index: usize) -> Vec<OperationBlock>;

    fn syntax_tree(&self, file: FileId) -> &SyntaxTree;

    fn files(&self) -> Vec<FileId>;

    /// Container chain of a symbol, innermost first, up to the root.
    fn containers(&self, id: SymbolId) -> Vec<SymbolId> {
        let mut chain = Vec::new();
        let mut current = self.symbol(id).container;
        while let Some(container) = current {
            chain.push(container);
            current = self.symbol(container).container;
        }
        chain
    }

    /// Direct plus nested members, excluding compiler-synthesized symbols.
    fn transitive_members(&self, container: SymbolId) -> Vec<SymbolId> {
        let mut out = Vec::new();
        let mut stack = self.members(container);
        while let Some(member) = stack.pop() {
            let symbol = self.symbol(member);
            if symbol.is_synthesized {
                continue;
            }
            out.push(member);
            if symbol.kind.is_container() {
                stack.extend(self.members(member));
            }
        }
        out
    }
}
