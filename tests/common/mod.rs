//! Shared fixtures: a small two-file compilation and reusable analyzers.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use lintdriver::model::{Operation, SyntaxNode};
use lintdriver::{
    AnalysisScope, Analyzer, AnalyzerDriver, CancellationToken, CompilationModel, Diagnostic,
    OperationKind, RegistrationContext, RunStatus, Span, SymbolKind, SyntaxKind,
};

pub const RULE_SYMBOL: &str = "TA01";
pub const RULE_NODE: &str = "TA02";
pub const RULE_OPERATION: &str = "TA03";
pub const RULE_TREE: &str = "TA04";
pub const RULE_MODEL: &str = "TA05";
pub const RULE_END: &str = "TA06";
pub const RULE_SCOPED: &str = "TA07";

/// Two files:
///
/// ```text
/// src/a.lang:  namespace N { type T { method M { call; return } field F } }
/// src/b.lang:  type U { method V { call } }
/// ```
pub fn sample_model() -> CompilationModel {
    let mut b = CompilationModel::builder();
    let f0 = b.add_file("src/a.lang");
    let f1 = b.add_file("src/b.lang");

    let ns = b.add_symbol("N", SymbolKind::Namespace, None, &[(f0, 0, 200)]);
    let t = b.add_symbol("N::T", SymbolKind::Type, Some(ns), &[(f0, 10, 180)]);
    let m = b.add_symbol("N::T::M", SymbolKind::Method, Some(t), &[(f0, 20, 80)]);
    b.add_symbol("N::T::F", SymbolKind::Field, Some(t), &[(f0, 90, 110)]);
    let u = b.add_symbol("U", SymbolKind::Type, None, &[(f1, 0, 120)]);
    let v = b.add_symbol("U::V", SymbolKind::Method, Some(u), &[(f1, 10, 100)]);

    b.set_body(
        m,
        0,
        SyntaxNode::with_children(
            SyntaxKind::MethodDecl,
            Span::new(f0, 20, 80),
            vec![SyntaxNode::with_children(
                SyntaxKind::Block,
                Span::new(f0, 30, 80),
                vec![
                    SyntaxNode::leaf(SyntaxKind::Call, Span::new(f0, 35, 50)),
                    SyntaxNode::leaf(SyntaxKind::Return, Span::new(f0, 55, 70)),
                ],
            )],
        ),
    );
    b.set_operations(
        m,
        0,
        vec![
            Operation {
                kind: OperationKind::Invocation,
                span: Span::new(f0, 35, 50),
            },
            Operation {
                kind: OperationKind::Return,
                span: Span::new(f0, 55, 70),
            },
        ],
    );

    b.set_body(
        v,
        0,
        SyntaxNode::with_children(
            SyntaxKind::MethodDecl,
            Span::new(f1, 10, 100),
            vec![SyntaxNode::with_children(
                SyntaxKind::Block,
                Span::new(f1, 20, 100),
                vec![SyntaxNode::leaf(SyntaxKind::Call, Span::new(f1, 25, 40))],
            )],
        ),
    );
    b.set_operations(
        v,
        0,
        vec![Operation {
            kind: OperationKind::Invocation,
            span: Span::new(f1, 25, 40),
        }],
    );

    b.build()
}

/// Reports one deterministic diagnostic from every trigger kind it registers,
/// located so symbol/node/operation findings route as local.
pub struct RecordingAnalyzer;

impl Analyzer for RecordingAnalyzer {
    fn name(&self) -> &str {
        "recording"
    }

    fn register(&self, registrar: &mut RegistrationContext<'_>) {
        registrar.register_symbol_action(&[SymbolKind::Type, SymbolKind::Method], |ctx| {
            let symbol = ctx.symbol();
            let span = symbol.declarations[0].span;
            ctx.report(
                Diagnostic::warning(RULE_SYMBOL, format!("symbol {}", symbol.name))
                    .with_location(span),
            );
            Ok(())
        });
        registrar.register_node_action(&[SyntaxKind::Call], |ctx| {
            let span = ctx.node().span;
            ctx.report(
                Diagnostic::warning(RULE_NODE, format!("call in {}", ctx.owner().name))
                    .with_location(span),
            );
            Ok(())
        });
        registrar.register_operation_action(&[OperationKind::Invocation], |ctx| {
            let span = ctx.operation().span;
            ctx.report(
                Diagnostic::warning(RULE_OPERATION, format!("invocation in {}", ctx.owner().name))
                    .with_location(span),
            );
            Ok(())
        });
        registrar.register_syntax_tree_action(|ctx| {
            let tree = ctx.tree();
            ctx.report(
                Diagnostic::warning(RULE_TREE, format!("tree {}", tree.path))
                    .with_location(Span::new(tree.file, 0, 0)),
            );
            Ok(())
        });
        registrar.register_semantic_model_action(|ctx| {
            let file = ctx.file();
            ctx.report(Diagnostic::warning(
                RULE_MODEL,
                format!("model for file {}", file.0),
            ));
            Ok(())
        });
        registrar.register_compilation_end_action(|ctx| {
            ctx.report(Diagnostic::warning(RULE_END, "compilation finished"));
            Ok(())
        });
    }
}

/// Diagnostics [`RecordingAnalyzer`] reports over [`sample_model`] in a full
/// run: 4 symbols (T, M, U, V), 2 calls, 2 invocations, 2 trees, 2 semantic
/// models, 1 compilation end.
pub const RECORDING_FULL_RUN_COUNT: usize = 13;

/// Appends "start"/"member"/"end" markers to a shared log so tests can assert
/// symbol-end ordering against member completion.
pub struct OrderingAnalyzer {
    pub log: Arc<Mutex<Vec<String>>>,
}

impl Analyzer for OrderingAnalyzer {
    fn name(&self) -> &str {
        "ordering"
    }

    fn register(&self, registrar: &mut RegistrationContext<'_>) {
        let log = Arc::clone(&self.log);
        registrar.register_symbol_start_action(&[SymbolKind::Type], move |ctx| {
            log.lock().push(format!("start {}", ctx.symbol().name));
            let end_log = Arc::clone(&log);
            ctx.register_symbol_end_action(move |end| {
                end_log.lock().push(format!("end {}", end.symbol().name));
                Ok(())
            });
            Ok(())
        });
        let log = Arc::clone(&self.log);
        registrar.register_symbol_action(&[SymbolKind::Method, SymbolKind::Field], move |ctx| {
            log.lock().push(format!("member {}", ctx.symbol().name));
            Ok(())
        });
    }
}

/// Counts symbol-action invocations per symbol and cancels the token when the
/// target symbol is reached.
pub struct CancelOnSymbol {
    pub target: &'static str,
    pub token: CancellationToken,
    pub hits: Arc<Mutex<HashMap<String, usize>>>,
}

impl Analyzer for CancelOnSymbol {
    fn name(&self) -> &str {
        "cancel-probe"
    }

    fn register(&self, registrar: &mut RegistrationContext<'_>) {
        let target = self.target;
        let token = self.token.clone();
        let hits = Arc::clone(&self.hits);
        registrar.register_symbol_action(
            &[
                SymbolKind::Namespace,
                SymbolKind::Type,
                SymbolKind::Method,
                SymbolKind::Field,
            ],
            move |ctx| {
                let name = ctx.symbol().name.clone();
                *hits.lock().entry(name.clone()).or_insert(0) += 1;
                if name == target {
                    token.cancel();
                }
                Ok(())
            },
        );
    }
}

/// Registers, from a symbol-start scope on types, a node action on calls with
/// no paired end action. The calls live in the types' methods, so the node
/// action only fires if members inherit their container's scoped actions.
pub struct ScopedCallAnalyzer;

impl Analyzer for ScopedCallAnalyzer {
    fn name(&self) -> &str {
        "scoped"
    }

    fn register(&self, registrar: &mut RegistrationContext<'_>) {
        registrar.register_symbol_start_action(&[SymbolKind::Type], |ctx| {
            ctx.register_node_action(&[SyntaxKind::Call], |node| {
                let span = node.node().span;
                node.report(
                    Diagnostic::warning(RULE_SCOPED, format!("call under {}", node.owner().name))
                        .with_location(span),
                );
                Ok(())
            });
            Ok(())
        });
    }
}

/// Panics on type `U` and fails every call-node action with an error.
pub struct FaultyAnalyzer;

impl Analyzer for FaultyAnalyzer {
    fn name(&self) -> &str {
        "faulty"
    }

    fn register(&self, registrar: &mut RegistrationContext<'_>) {
        registrar.register_symbol_action(&[SymbolKind::Type], |ctx| {
            if ctx.symbol().name == "U" {
                panic!("type U is cursed");
            }
            Ok(())
        });
        registrar.register_node_action(&[SyntaxKind::Call], |_| anyhow::bail!("node exploded"));
    }
}

pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn full_run(driver: &mut AnalyzerDriver, model: &CompilationModel) -> RunStatus {
    driver.run(
        model.events(),
        AnalysisScope::compilation(),
        &CancellationToken::new(),
    )
}
