//! Aggregated analysis results, merged across runs.
//!
//! A driver's first completed full-scope run is authoritative for the
//! buckets it covered and stores them wholesale. Every other run — partial
//! scopes, cancelled runs, and resumed runs that skip already-complete work —
//! appends with de-duplication, so rerunning a span never doubles a
//! diagnostic and resuming after cancellation never loses one.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::analyzer::AnalyzerId;
use crate::diagnostics::{Diagnostic, Locality, SinkEntry, SuppressionOracle};
use crate::model::FileId;
use crate::scope::AnalysisScope;

/// Stored diagnostics of one analyzer: per-file local buckets plus the
/// compilation-wide remainder.
#[derive(Clone, Debug, Default, Serialize)]
pub struct AnalyzerResult {
    pub local: BTreeMap<FileId, Vec<Diagnostic>>,
    pub non_local: Vec<Diagnostic>,
}

impl AnalyzerResult {
    pub fn is_empty(&self) -> bool {
        self.non_local.is_empty() && self.local.values().all(|bucket| bucket.is_empty())
    }

    fn count(&self) -> usize {
        self.non_local.len() + self.local.values().map(Vec::len).sum::<usize>()
    }
}

/// Serializable snapshot of a whole analysis, suppression already applied.
#[derive(Clone, Debug, Serialize)]
pub struct AnalysisReport {
    pub analyzers: Vec<AnalyzerReport>,
}

impl AnalysisReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct AnalyzerReport {
    pub name: String,
    pub diagnostics: Vec<Diagnostic>,
    /// Wall time spent in this analyzer's callbacks, when timing is on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_nanos: Option<u64>,
}

pub struct ResultAggregator {
    per_analyzer: Vec<AnalyzerResult>,
    /// (analyzer, file) pairs whose local bucket came from a completed
    /// full-file run and is therefore authoritative.
    full_files: HashSet<(AnalyzerId, FileId)>,
    /// Analyzers whose non-local bucket came from a completed
    /// full-compilation run.
    full_compilation: HashSet<AnalyzerId>,
}

impl ResultAggregator {
    pub fn new(analyzer_count: usize) -> Self {
        ResultAggregator {
            per_analyzer: (0..analyzer_count).map(|_| AnalyzerResult::default()).collect(),
            full_files: HashSet::new(),
            full_compilation: HashSet::new(),
        }
    }

    /// Merges one run's drained sink entries. `files` is the compilation's
    /// file list; `completed` is false for cancelled runs.
    ///
    /// Only a completed first run is authoritative for the buckets its scope
    /// fully covers: later runs skip work that is already complete and
    /// report only the increment, so they append instead of overwriting.
    pub fn merge(
        &mut self,
        entries: Vec<SinkEntry>,
        scope: &AnalysisScope,
        files: &[FileId],
        completed: bool,
        first_run: bool,
    ) {
        let mut local: BTreeMap<(AnalyzerId, FileId), Vec<Diagnostic>> = BTreeMap::new();
        let mut non_local: BTreeMap<AnalyzerId, Vec<Diagnostic>> = BTreeMap::new();
        for entry in entries {
            match entry.locality {
                Locality::Local(file) => local
                    .entry((entry.analyzer, file))
                    .or_default()
                    .push(entry.diagnostic),
                Locality::NonLocal => non_local
                    .entry(entry.analyzer)
                    .or_default()
                    .push(entry.diagnostic),
            }
        }

        if completed {
            for analyzer_index in 0..self.per_analyzer.len() {
                let analyzer = AnalyzerId(analyzer_index as u32);
                for &file in files.iter().filter(|&&f| scope.is_full_file(f)) {
                    if first_run && !self.full_files.contains(&(analyzer, file)) {
                        let incoming = local.remove(&(analyzer, file)).unwrap_or_default();
                        self.per_analyzer[analyzer.index()]
                            .local
                            .insert(file, dedup(incoming));
                    }
                    self.full_files.insert((analyzer, file));
                }
                if scope.is_full_compilation() {
                    if first_run && !self.full_compilation.contains(&analyzer) {
                        let incoming = non_local.remove(&analyzer).unwrap_or_default();
                        self.per_analyzer[analyzer.index()].non_local = dedup(incoming);
                    }
                    self.full_compilation.insert(analyzer);
                }
            }
        }

        // Whatever remains is outside the run's authoritative coverage.
        for ((analyzer, file), diagnostics) in local {
            let bucket = self.per_analyzer[analyzer.index()]
                .local
                .entry(file)
                .or_default();
            append_dedup(bucket, diagnostics);
        }
        for (analyzer, diagnostics) in non_local {
            append_dedup(&mut self.per_analyzer[analyzer.index()].non_local, diagnostics);
        }
    }

    /// Whether the stored local bucket is from a completed full-file run.
    pub fn is_file_fully_analyzed(&self, analyzer: AnalyzerId, file: FileId) -> bool {
        self.full_files.contains(&(analyzer, file))
    }

    pub fn is_compilation_fully_analyzed(&self, analyzer: AnalyzerId) -> bool {
        self.full_compilation.contains(&analyzer)
    }

    /// Whether any part of the scope still needs analysis for this analyzer.
    /// Span scopes never mark full coverage, so they always report pending.
    pub fn has_pending_work(
        &self,
        analyzer: AnalyzerId,
        scope: &AnalysisScope,
        files: &[FileId],
    ) -> bool {
        if scope.is_full_compilation() && !self.full_compilation.contains(&analyzer) {
            return true;
        }
        files
            .iter()
            .filter(|&&file| scope.includes_file(file))
            .any(|&file| !self.full_files.contains(&(analyzer, file)))
    }

    pub fn analyzer_result(&self, analyzer: AnalyzerId) -> &AnalyzerResult {
        &self.per_analyzer[analyzer.index()]
    }

    pub fn diagnostic_count(&self) -> usize {
        self.per_analyzer.iter().map(AnalyzerResult::count).sum()
    }

    /// All stored diagnostics of one analyzer, suppression applied, ordered
    /// by file then span then rule.
    pub fn analyzer_diagnostics(
        &self,
        analyzer: AnalyzerId,
        suppression: &dyn SuppressionOracle,
    ) -> Vec<Diagnostic> {
        let result = &self.per_analyzer[analyzer.index()];
        let mut out: Vec<Diagnostic> = result
            .local
            .values()
            .flatten()
            .chain(result.non_local.iter())
            .filter(|diagnostic| !suppression.is_suppressed(diagnostic))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            let key = |d: &Diagnostic| {
                (
                    d.location.map(|s| (s.file, s.start, s.end)),
                    d.rule.clone(),
                    d.message.clone(),
                )
            };
            key(a).cmp(&key(b))
        });
        out
    }

    pub fn report(
        &self,
        names: &[&str],
        suppression: &dyn SuppressionOracle,
        times: impl Fn(AnalyzerId) -> Option<u64>,
    ) -> AnalysisReport {
        AnalysisReport {
            analyzers: names
                .iter()
                .enumerate()
                .map(|(index, name)| {
                    let analyzer = AnalyzerId(index as u32);
                    AnalyzerReport {
                        name: (*name).to_string(),
                        diagnostics: self.analyzer_diagnostics(analyzer, suppression),
                        execution_time_nanos: times(analyzer),
                    }
                })
                .collect(),
        }
    }
}

fn dedup(diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
    let mut out = Vec::with_capacity(diagnostics.len());
    append_dedup(&mut out, diagnostics);
    out
}

fn append_dedup(bucket: &mut Vec<Diagnostic>, incoming: Vec<Diagnostic>) {
    for diagnostic in incoming {
        if !bucket.iter().any(|existing| existing.identity() == diagnostic.identity()) {
            bucket.push(diagnostic);
        }
    }
}
