//! Shared error vocabulary.
//!
//! Each subsystem crate defines its own [`thiserror::Error`] enum scoped
//! to what can actually go wrong there (`HookError` in `pc-hooks`,
//! `ReconcileError` in `pc-reconciler`, `EffectError` in
//! `pc-effects-core`, `CollectError` in `pc-collector`, `CompileError`
//! in `pc-compiler`). This module holds only the vocabulary shared by
//! all of them: the error a composite's `render` returns, and the
//! diagnostic describing a hook call-order violation.

use thiserror::Error;

/// An error returned by a composite's `render` (§7, "render error").
///
/// Distinct from suspension: a composite suspends by returning
/// `RenderOutcome::Suspend`, not by returning `Err`. A `RenderError`
/// aborts the current tick and is surfaced via `notify_error`.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RenderError {
    /// The component's own logic failed.
    #[error("component {component} failed to render: {message}")]
    Failed {
        /// Name of the component that failed.
        component: String,
        /// What went wrong.
        message: String,
    },

    /// Catch-all for arbitrary user errors bubbled up through render.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// A detected violation of the hook call-order contract (§4.3, §8 invariant 3).
///
/// In a debug build this is raised loudly; callers may choose to treat
/// it as a `RenderError` or simply log it, depending on how strict the
/// host application wants to be.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum InvariantError {
    /// A re-render called a different number of hooks than the previous render.
    #[error(
        "hook count changed for fiber {fiber}: previous render called {previous}, this one called {current}"
    )]
    HookCountChanged {
        /// Debug name of the offending fiber.
        fiber: String,
        /// Hook count on the previous render.
        previous: usize,
        /// Hook count on this render.
        current: usize,
    },

    /// A re-render called a hook of a different tag at the same position.
    #[error("hook order changed for fiber {fiber} at index {index}: expected {expected}, got {got}")]
    HookOrderChanged {
        /// Debug name of the offending fiber.
        fiber: String,
        /// The hook-chain index where the mismatch occurred.
        index: usize,
        /// The hook tag recorded on the previous render.
        expected: String,
        /// The hook tag observed on this render.
        got: String,
    },

    /// Two sections shared an explicit id with incompatible non-content fields.
    #[error("section id collision on \"{id}\": {detail}")]
    SectionIdCollision {
        /// The colliding section id.
        id: String,
        /// Human-readable description of the conflict.
        detail: String,
    },
}
