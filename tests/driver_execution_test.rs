mod common;

use std::collections::HashMap;
use std::sync::Arc;

use lintdriver::{
    AnalysisOptions, Analyzer, AnalyzerDriver, CompilationModel, Diagnostic, NoSuppression,
    RegistrationContext, RunStatus, SymbolKind,
};

use common::{
    full_run, init_logs, sample_model, RecordingAnalyzer, ScopedCallAnalyzer,
    RECORDING_FULL_RUN_COUNT, RULE_END, RULE_MODEL, RULE_NODE, RULE_OPERATION, RULE_SCOPED,
    RULE_SYMBOL, RULE_TREE,
};

fn recording_driver(options: AnalysisOptions, model: &Arc<CompilationModel>) -> AnalyzerDriver {
    AnalyzerDriver::new(vec![Arc::new(RecordingAnalyzer)], model.clone(), options)
}

#[test]
fn full_concurrent_run_reports_every_trigger_exactly_once() {
    init_logs();
    let model = Arc::new(sample_model());
    let mut driver = recording_driver(AnalysisOptions::default(), &model);

    assert_eq!(full_run(&mut driver, &model), RunStatus::Completed);

    let report = driver.report(&NoSuppression);
    assert_eq!(report.analyzers.len(), 1);
    assert_eq!(report.analyzers[0].name, "recording");
    let diagnostics = &report.analyzers[0].diagnostics;
    assert_eq!(diagnostics.len(), RECORDING_FULL_RUN_COUNT);

    let mut by_rule: HashMap<&str, usize> = HashMap::new();
    for diagnostic in diagnostics {
        *by_rule.entry(diagnostic.rule.as_str()).or_insert(0) += 1;
    }
    assert_eq!(by_rule[RULE_SYMBOL], 4);
    assert_eq!(by_rule[RULE_NODE], 2);
    assert_eq!(by_rule[RULE_OPERATION], 2);
    assert_eq!(by_rule[RULE_TREE], 2);
    assert_eq!(by_rule[RULE_MODEL], 2);
    assert_eq!(by_rule[RULE_END], 1);
}

#[test]
fn serial_and_concurrent_runs_produce_identical_reports() {
    let model = Arc::new(sample_model());
    let analyzers = || -> Vec<Arc<dyn Analyzer>> {
        vec![Arc::new(RecordingAnalyzer), Arc::new(ScopedCallAnalyzer)]
    };

    let mut serial = AnalyzerDriver::new(analyzers(), model.clone(), AnalysisOptions::serial());
    assert_eq!(full_run(&mut serial, &model), RunStatus::Completed);

    let mut concurrent = AnalyzerDriver::new(
        analyzers(),
        model.clone(),
        AnalysisOptions {
            concurrent: true,
            worker_count: Some(4),
            track_timing: false,
        },
    );
    assert_eq!(full_run(&mut concurrent, &model), RunStatus::Completed);

    let serial_report = serial.report(&NoSuppression);
    let concurrent_report = concurrent.report(&NoSuppression);
    for (left, right) in serial_report
        .analyzers
        .iter()
        .zip(&concurrent_report.analyzers)
    {
        assert_eq!(left.diagnostics, right.diagnostics, "analyzer {}", left.name);
    }
}

#[test]
fn rerunning_a_completed_analysis_changes_nothing() {
    let model = Arc::new(sample_model());
    let mut driver = recording_driver(AnalysisOptions::default(), &model);

    assert_eq!(full_run(&mut driver, &model), RunStatus::Completed);
    assert_eq!(full_run(&mut driver, &model), RunStatus::Completed);

    let report = driver.report(&NoSuppression);
    assert_eq!(
        report.analyzers[0].diagnostics.len(),
        RECORDING_FULL_RUN_COUNT
    );
}

#[test]
fn timing_is_recorded_when_enabled() {
    let model = Arc::new(sample_model());
    let mut driver = recording_driver(
        AnalysisOptions {
            concurrent: false,
            worker_count: Some(1),
            track_timing: true,
        },
        &model,
    );
    assert_eq!(full_run(&mut driver, &model), RunStatus::Completed);

    let report = driver.report(&NoSuppression);
    assert!(report.analyzers[0].execution_time_nanos.is_some());
}

#[test]
fn start_scoped_node_actions_reach_members_of_finished_containers() {
    init_logs();
    let model = Arc::new(sample_model());
    let mut driver = AnalyzerDriver::new(
        vec![Arc::new(ScopedCallAnalyzer) as Arc<dyn Analyzer>],
        model.clone(),
        AnalysisOptions::serial(),
    );
    assert_eq!(full_run(&mut driver, &model), RunStatus::Completed);

    // The types register no end action, so they finish their own analysis
    // before their members are processed. The node action collected in their
    // start scope must still reach the calls inside those members.
    let report = driver.report(&NoSuppression);
    let diagnostics = &report.analyzers[0].diagnostics;
    assert!(
        diagnostics.iter().all(|d| d.rule == RULE_SCOPED),
        "{diagnostics:?}"
    );
    let messages: Vec<&str> = diagnostics.iter().map(|d| d.message.as_str()).collect();
    assert_eq!(messages, ["call under N::T::M", "call under U::V"]);
}

#[test]
fn start_scoped_node_actions_survive_concurrent_runs_and_reruns() {
    for _ in 0..4 {
        let model = Arc::new(sample_model());
        let mut driver = AnalyzerDriver::new(
            vec![Arc::new(ScopedCallAnalyzer) as Arc<dyn Analyzer>],
            model.clone(),
            AnalysisOptions {
                concurrent: true,
                worker_count: Some(4),
                track_timing: false,
            },
        );
        assert_eq!(full_run(&mut driver, &model), RunStatus::Completed);
        assert_eq!(full_run(&mut driver, &model), RunStatus::Completed);

        let report = driver.report(&NoSuppression);
        let diagnostics = &report.analyzers[0].diagnostics;
        assert_eq!(diagnostics.len(), 2, "{diagnostics:?}");
        assert!(diagnostics.iter().all(|d| d.rule == RULE_SCOPED));
    }
}

#[test]
fn syntax_actions_run_alongside_event_processing() {
    use crossbeam::channel;

    struct OverlapAnalyzer {
        tx: channel::Sender<()>,
        rx: channel::Receiver<()>,
    }

    impl Analyzer for OverlapAnalyzer {
        fn name(&self) -> &str {
            "overlap"
        }

        fn register(&self, registrar: &mut RegistrationContext<'_>) {
            let tx = self.tx.clone();
            registrar.register_symbol_action(&[SymbolKind::Method], move |_| {
                let _ = tx.send(());
                Ok(())
            });
            let rx = self.rx.clone();
            registrar.register_syntax_tree_action(move |ctx| {
                // Blocks until a symbol action has run, which requires the
                // syntax pass and the event workers to make progress at the
                // same time.
                if rx.recv_timeout(std::time::Duration::from_secs(10)).is_ok() {
                    let path = ctx.tree().path.clone();
                    ctx.report(Diagnostic::warning(
                        "TA08",
                        format!("saw a symbol before tree {path}"),
                    ));
                }
                Ok(())
            });
        }
    }

    let (tx, rx) = channel::unbounded();
    let model = Arc::new(sample_model());
    let mut driver = AnalyzerDriver::new(
        vec![Arc::new(OverlapAnalyzer { tx, rx }) as Arc<dyn Analyzer>],
        model.clone(),
        AnalysisOptions {
            concurrent: true,
            worker_count: Some(2),
            track_timing: false,
        },
    );
    assert_eq!(full_run(&mut driver, &model), RunStatus::Completed);

    let report = driver.report(&NoSuppression);
    let overlapped = report.analyzers[0]
        .diagnostics
        .iter()
        .filter(|d| d.message.starts_with("saw a symbol"))
        .count();
    assert_eq!(overlapped, 2);
}

#[test]
fn compilation_start_registrations_take_effect_for_the_whole_run() {
    struct SetupAnalyzer;

    impl Analyzer for SetupAnalyzer {
        fn name(&self) -> &str {
            "setup"
        }

        fn register(&self, registrar: &mut RegistrationContext<'_>) {
            registrar.register_compilation_start_action(|ctx| {
                ctx.register_symbol_action(&[SymbolKind::Type], |symbol_ctx| {
                    let name = symbol_ctx.symbol().name.clone();
                    symbol_ctx.report(Diagnostic::warning("TA09", format!("configured for {name}")));
                    Ok(())
                });
                Ok(())
            });
        }
    }

    let model = Arc::new(sample_model());
    let mut driver = AnalyzerDriver::new(
        vec![Arc::new(SetupAnalyzer) as Arc<dyn Analyzer>],
        model.clone(),
        AnalysisOptions::serial(),
    );
    assert_eq!(full_run(&mut driver, &model), RunStatus::Completed);
    assert_eq!(full_run(&mut driver, &model), RunStatus::Completed);

    let report = driver.report(&NoSuppression);
    let diagnostics = &report.analyzers[0].diagnostics;
    assert_eq!(diagnostics.len(), 2, "{diagnostics:?}"); // types T and U
    assert!(diagnostics.iter().all(|d| d.rule == "TA09"));
}

#[test]
fn report_serializes_to_json() {
    let model = Arc::new(sample_model());
    let mut driver = recording_driver(AnalysisOptions::serial(), &model);
    full_run(&mut driver, &model);

    let json = serde_json::to_string(&driver.report(&NoSuppression)).unwrap();
    assert!(json.contains("recording"));
    assert!(json.contains(RULE_SYMBOL));
}
