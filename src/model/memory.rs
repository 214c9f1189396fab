//! In-memory reference implementation of the semantic oracle.
//!
//! Front ends with a real object model implement [`SemanticOracle`] directly;
//! this model exists for tests and small embedders, and doubles as the
//! reference producer of the ordered compilation event stream.

use std::collections::HashMap;

use crate::events::CompilationEvent;
use crate::model::{
    DeclRef, FileId, Operation, OperationBlock, SemanticOracle, Span, Symbol, SymbolId, SymbolKind,
    SyntaxKind, SyntaxNode, SyntaxTree,
};

#[derive(Clone, Debug, Default)]
pub struct CompilationModel {
    files: Vec<String>,
    symbols: Vec<Symbol>,
    members: HashMap<SymbolId, Vec<SymbolId>>,
    trees: HashMap<FileId, SyntaxTree>,
    bodies: HashMap<(SymbolId, usize), SyntaxNode>,
    operations: HashMap<(SymbolId, usize), Vec<OperationBlock>>,
}

impl CompilationModel {
    pub fn builder() -> ModelBuilder {
        ModelBuilder::default()
    }

    /// The ordered event stream for this compilation: `Started`, one
    /// `SymbolDeclared` per source symbol in declaration order, one
    /// `FileCompleted` per file, `Completed` last.
    pub fn events(&self) -> Vec<CompilationEvent> {
        let mut events = vec![CompilationEvent::Started];
        for symbol in &self.symbols {
            if !symbol.is_synthesized {
                events.push(CompilationEvent::SymbolDeclared { symbol: symbol.id });
            }
        }
        for file in 0..self.files.len() {
            events.push(CompilationEvent::FileCompleted {
                file: FileId(file as u32),
            });
        }
        events.push(CompilationEvent::Completed);
        events
    }

    pub fn file_path(&self, file: FileId) -> &str {
        &self.files[file.0 as usize]
    }
}

impl SemanticOracle for CompilationModel {
    fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    fn declaring_references(&self, id: SymbolId) -> &[DeclRef] {
        &self.symbols[id.0 as usize].declarations
    }

    fn members(&self, container: SymbolId) -> Vec<SymbolId> {
        self.members.get(&container).cloned().unwrap_or_default()
    }

    fn topmost_node(&self, symbol: SymbolId, declaration_index: usize) -> SyntaxNode {
        if let Some(body) = self.bodies.get(&(symbol, declaration_index)) {
            return body.clone();
        }
        let info = self.symbol(symbol);
        let decl = info.declarations[declaration_index];
        SyntaxNode::leaf(decl_kind(info.kind), decl.span)
    }

    fn operation_blocks(&self, symbol: SymbolId, declaration_index: usize) -> Vec<OperationBlock> {
        self.operations
            .get(&(symbol, declaration_index))
            .cloned()
            .unwrap_or_default()
    }

    fn syntax_tree(&self, file: FileId) -> &SyntaxTree {
        &self.trees[&file]
    }

    fn files(&self) -> Vec<FileId> {
        (0..self.files.len() as u32).map(FileId).collect()
    }
}

fn decl_kind(kind: SymbolKind) -> SyntaxKind {
    match kind {
        SymbolKind::Namespace => SyntaxKind::NamespaceDecl,
        SymbolKind::Type => SyntaxKind::TypeDecl,
        SymbolKind::Method => SyntaxKind::MethodDecl,
        SymbolKind::Field | SymbolKind::Property | SymbolKind::Local => SyntaxKind::FieldDecl,
    }
}

#[derive(Clone, Debug, Default)]
pub struct ModelBuilder {
    model: CompilationModel,
}

impl ModelBuilder {
    pub fn add_file(&mut self, path: &str) -> FileId {
        let id = FileId(self.model.files.len() as u32);
        self.model.files.push(path.to_string());
        self.model.trees.insert(
            id,
            SyntaxTree {
                file: id,
                path: path.to_string(),
                root: SyntaxNode::leaf(SyntaxKind::CompilationUnit, Span::new(id, 0, u32::MAX)),
            },
        );
        id
    }

    /// Declares a symbol with one declaring reference per `(file, start, end)`
    /// triple. Declaration order is event order.
    pub fn add_symbol(
        &mut self,
        name: &str,
        kind: SymbolKind,
        container: Option<SymbolId>,
        declarations: &[(FileId, u32, u32)],
    ) -> SymbolId {
        self.add_symbol_inner(name, kind, container, declarations, false)
    }

    pub fn add_synthesized_symbol(
        &mut self,
        name: &str,
        kind: SymbolKind,
        container: Option<SymbolId>,
    ) -> SymbolId {
        self.add_symbol_inner(name, kind, container, &[], true)
    }

    fn add_symbol_inner(
        &mut self,
        name: &str,
        kind: SymbolKind,
        container: Option<SymbolId>,
        declarations: &[(FileId, u32, u32)],
        is_synthesized: bool,
    ) -> SymbolId {
        let id = SymbolId(self.model.symbols.len() as u32);
        self.model.symbols.push(Symbol {
            id,
            name: name.to_string(),
            kind,
            container,
            is_synthesized,
            declarations: declarations
                .iter()
                .map(|&(file, start, end)| DeclRef {
                    file,
                    span: Span::new(file, start, end),
                })
                .collect(),
        });
        if let Some(container) = container {
            self.model.members.entry(container).or_default().push(id);
        }
        id
    }

    /// Attaches an explicit body to one declaring reference, visited by node
    /// actions instead of the synthesized leaf node.
    pub fn set_body(&mut self, symbol: SymbolId, declaration_index: usize, body: SyntaxNode) {
        self.model.bodies.insert((symbol, declaration_index), body);
    }

    pub fn set_operations(
        &mut self,
        symbol: SymbolId,
        declaration_index: usize,
        operations: Vec<Operation>,
    ) {
        self.model
            .operations
            .insert((symbol, declaration_index), vec![OperationBlock { operations }]);
    }

    pub fn set_syntax_root(&mut self, file: FileId, root: SyntaxNode) {
        if let Some(tree) = self.model.trees.get_mut(&file) {
            tree.root = root;
        }
    }

    pub fn build(self) -> CompilationModel {
        self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_follow_declaration_order_and_end_with_completed() {
        let mut b = CompilationModel::builder();
        let f = b.add_file("a.src");
        let ns = b.add_symbol("N", SymbolKind::Namespace, None, &[(f, 0, 100)]);
        let ty = b.add_symbol("T", SymbolKind::Type, Some(ns), &[(f, 10, 90)]);
        b.add_synthesized_symbol("T::ctor", SymbolKind::Method, Some(ty));
        let model = b.build();

        let events = model.events();
        assert_eq!(events.first(), Some(&CompilationEvent::Started));
        assert_eq!(events.last(), Some(&CompilationEvent::Completed));
        let declared: Vec<SymbolId> = events
            .iter()
            .filter_map(|e| match e {
                CompilationEvent::SymbolDeclared { symbol } => Some(*symbol),
                _ => None,
            })
            .collect();
        assert_eq!(declared, vec![ns, ty]);
    }

    #[test]
    fn transitive_members_exclude_synthesized() {
        let mut b = CompilationModel::builder();
        let f = b.add_file("a.src");
        let ns = b.add_symbol("N", SymbolKind::Namespace, None, &[(f, 0, 100)]);
        let ty = b.add_symbol("T", SymbolKind::Type, Some(ns), &[(f, 10, 90)]);
        let m = b.add_symbol("T::m", SymbolKind::Method, Some(ty), &[(f, 20, 40)]);
        b.add_synthesized_symbol("T::ctor", SymbolKind::Method, Some(ty));
        let model = b.build();

        let mut members = model.transitive_members(ns);
        members.sort();
        assert_eq!(members, vec![ty, m]);
    }

    #[test]
    fn split_declarations_keep_one_reference_per_part() {
        let mut b = CompilationModel::builder();
        let f1 = b.add_file("a.src");
        let f2 = b.add_file("b.src");
        let ty = b.add_symbol("T", SymbolKind::Type, None, &[(f1, 0, 50), (f2, 0, 70)]);
        let model = b.build();

        assert_eq!(model.declaring_references(ty).len(), 2);
        assert_eq!(model.declaring_references(ty)[1].file, f2);
    }
}
