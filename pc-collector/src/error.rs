//! Collector errors (§7 "Invariant violation").

use thiserror::Error;

/// Errors the collector itself can raise.
///
/// Most of what §4.7/§7 describe as collector-time trouble (section id
/// collisions, an unrecognized tag) is tolerated rather than fatal —
/// logged via `tracing::warn!` and handled by merging or falling back
/// to a custom block. This enum exists for the cases that genuinely
/// cannot be resolved that way.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum CollectError {
    /// Catch-all for arbitrary user errors (e.g. a `Formatter` impl that panics
    /// and is caught upstream, or a host-supplied callback failure).
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
