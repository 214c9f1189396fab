//! The analyzer plugin surface.

use serde::{Deserialize, Serialize};

use crate::registry::contexts::RegistrationContext;

/// Index of an analyzer within one driver's analyzer list. Identity is
/// positional; the trait object itself is the opaque capability token.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnalyzerId(pub u32);

impl AnalyzerId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A pluggable analysis extension.
///
/// `register` is invoked exactly once per analyzer, under fault isolation,
/// when the action registry is first built. All work happens through the
/// callbacks registered there.
pub trait Analyzer: Send + Sync {
    fn name(&self) -> &str;

    fn register(&self, registrar: &mut RegistrationContext<'_>);

    /// Analyzers that return false have every callback invocation serialized
    /// behind a dedicated per-analyzer gate.
    fn concurrency_safe(&self) -> bool {
        true
    }
}
