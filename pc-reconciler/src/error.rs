//! Reconciler errors (§7 "Render error", "Recompile loop").

use pc_core::{FiberId, InvariantError, RenderError};
use thiserror::Error;

/// Errors the reconciler itself can raise.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A composite's render returned an error; the tick aborts (§7).
    #[error(transparent)]
    Render(#[from] RenderError),

    /// A hook call-order or section-id invariant was violated.
    #[error(transparent)]
    Invariant(#[from] InvariantError),

    /// A data hook never resolved within the configured retry budget
    /// (§4.3 "at most N=10 retries per reconciliation").
    #[error("fiber {fiber} exceeded {max_retries} suspension retries waiting on \"{key}\"")]
    SuspenseExhausted {
        /// The fiber that never stabilized.
        fiber: FiberId,
        /// The data-cache key it was waiting on.
        key: String,
        /// The configured retry budget.
        max_retries: u32,
    },

    /// Catch-all for arbitrary user errors.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
