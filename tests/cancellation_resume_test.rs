mod common;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use lintdriver::{
    AnalysisOptions, AnalysisScope, AnalyzerDriver, AnalyzerId, CancellationToken, NoSuppression,
    RunStatus,
};

use common::{sample_model, CancelOnSymbol, RecordingAnalyzer, RECORDING_FULL_RUN_COUNT};

#[test]
fn cancelled_run_resumes_without_repeating_or_losing_work() {
    let model = Arc::new(sample_model());
    let token = CancellationToken::new();
    let hits: Arc<Mutex<HashMap<String, usize>>> = Arc::new(Mutex::new(HashMap::new()));

    let probe = CancelOnSymbol {
        target: "N::T::M",
        token: token.clone(),
        hits: Arc::clone(&hits),
    };
    let analyzers: Vec<Arc<dyn lintdriver::Analyzer>> =
        vec![Arc::new(probe), Arc::new(RecordingAnalyzer)];
    let mut driver = AnalyzerDriver::new(analyzers, model.clone(), AnalysisOptions::serial());

    let status = driver.run(model.events(), AnalysisScope::compilation(), &token);
    assert_eq!(status, RunStatus::Cancelled);

    // Resume with a fresh token; the driver picks up the unfinished
    // remainder instead of starting over.
    let status = driver.run(
        model.events(),
        AnalysisScope::compilation(),
        &CancellationToken::new(),
    );
    assert_eq!(status, RunStatus::Completed);

    let hits = hits.lock();
    assert_eq!(hits.len(), 6, "all six source symbols visited: {hits:?}");
    for (name, count) in hits.iter() {
        assert_eq!(*count, 1, "symbol action for {name} ran more than once");
    }

    let report = driver.report(&NoSuppression);
    assert_eq!(
        report.analyzers[1].diagnostics.len(),
        RECORDING_FULL_RUN_COUNT,
        "no diagnostics lost or duplicated across cancel and resume"
    );
    assert!(driver
        .results()
        .is_compilation_fully_analyzed(AnalyzerId(1)));
}

#[test]
fn run_cancelled_before_start_does_nothing() {
    let model = Arc::new(sample_model());
    let token = CancellationToken::new();
    token.cancel();

    let mut driver = AnalyzerDriver::new(
        vec![Arc::new(RecordingAnalyzer) as Arc<dyn lintdriver::Analyzer>],
        model.clone(),
        AnalysisOptions::serial(),
    );
    let status = driver.run(model.events(), AnalysisScope::compilation(), &token);
    assert_eq!(status, RunStatus::Cancelled);
    assert_eq!(driver.report(&NoSuppression).analyzers[0].diagnostics.len(), 0);
}
