//! Cooperative cancellation.
//!
//! A single token cancels in-flight and queued work. Cancellation is not an
//! error: the engine unwinds cleanly, resets in-flight claims to a resumable
//! state, and produces no diagnostic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Marker returned by engine internals when cancellation interrupted an
/// action set. Not an error: the interrupted claim was reset to a resumable
/// state and no diagnostic was produced.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Interrupted;

#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
