//! Hook-runtime errors (§7 "Invariant violation").

use thiserror::Error;

/// Errors raised by hook constructors themselves, as opposed to
/// [`pc_core::InvariantError`], which describes a call-order violation
/// detected by the cursor.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum HookError {
    /// A hook was called at a position whose recorded tag doesn't match.
    #[error("hook order violation: expected {expected} at this position, got {got}")]
    OrderViolation {
        /// The hook tag recorded at this position on the previous render.
        expected: String,
        /// The hook tag this call tried to register.
        got: String,
    },

    /// Catch-all for arbitrary user errors raised from within a hook.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl HookError {
    /// Build an [`HookError::OrderViolation`] from the cursor's mismatch pair.
    pub fn from_mismatch(mismatch: (pc_core::HookTag, pc_core::HookTag)) -> Self {
        let (expected, got) = mismatch;
        tracing::warn!(%expected, %got, "hook call-order violation");
        HookError::OrderViolation {
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }
}
