//! Optional per-analyzer execution-time instrumentation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;

use crate::analyzer::AnalyzerId;

/// Accumulates wall time spent inside analyzer callbacks, keyed by analyzer.
/// Disabled instances are free to share; recording is a no-op.
pub struct ExecutionTimes {
    enabled: bool,
    nanos: DashMap<AnalyzerId, AtomicU64>,
}

impl ExecutionTimes {
    pub fn new(enabled: bool) -> Self {
        ExecutionTimes {
            enabled,
            nanos: DashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record(&self, analyzer: AnalyzerId, elapsed: Duration) {
        if !self.enabled {
            return;
        }
        self.nanos
            .entry(analyzer)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn get(&self, analyzer: AnalyzerId) -> Duration {
        self.nanos
            .get(&analyzer)
            .map(|entry| Duration::from_nanos(entry.load(Ordering::Relaxed)))
            .unwrap_or_default()
    }
}
