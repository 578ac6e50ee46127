//! Compile-driver errors (§7).

use thiserror::Error;

/// Errors the compile driver itself can raise, composing the
/// lower-level subsystem errors it orchestrates.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CompileError {
    /// Reconciliation failed (render error, invariant violation, or
    /// suspension exhausted its retry budget).
    #[error(transparent)]
    Reconcile(#[from] pc_reconciler::ReconcileError),

    /// Collection of the committed tree into a `CompiledStructure` failed.
    #[error(transparent)]
    Collect(#[from] pc_collector::CollectError),

    /// Catch-all for arbitrary user errors.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
