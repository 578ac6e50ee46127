#![deny(missing_docs)]
//! Effect queue traits and phase ordering rules (§4.5 "Commit / Effect Engine").
//!
//! This crate defines *what* it means to run a batch of effects —
//! ordering rules and the runner seam — without committing to an
//! execution strategy. `pc-effects-local` provides the default
//! in-process sequential runner; a host embedding this compiler in a
//! durable-workflow system could provide another.

use pc_core::{Cleanup, EffectPhase, FiberId};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors raised while running effects.
///
/// Per §7 "Effect error": these are logged with phase and debug label;
/// other effects continue; an effect error never aborts the tick.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EffectError {
    /// An effect's create callback returned an error.
    #[error("effect create failed for {debug_name} (fiber {fiber:?}, phase {phase:?}): {message}")]
    CreateFailed {
        /// The fiber the failing effect belongs to.
        fiber: FiberId,
        /// Debug label for the fiber.
        debug_name: String,
        /// The phase in which the effect ran.
        phase: EffectPhase,
        /// The underlying error message.
        message: String,
    },

    /// Catch-all for arbitrary user errors bubbled up through an effect.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// A boxed, ready-to-await effect create, extracted from a fiber's
/// hook-state chain during commit.
///
/// `preorder` is the fiber-tree preorder index assigned during commit
/// (parent before children, siblings left-to-right, §4.5, §8
/// invariant 9) and is the sort key creates run in.
pub struct PendingEffect {
    /// The fiber this effect belongs to.
    pub fiber_id: FiberId,
    /// Debug label for diagnostics.
    pub debug_name: String,
    /// Which phase this effect is running in.
    pub phase: EffectPhase,
    /// Fiber-tree preorder index at commit time.
    pub preorder: u64,
    /// The create future itself.
    pub future: Pin<
        Box<dyn Future<Output = Result<Option<Cleanup>, Box<dyn std::error::Error + Send + Sync>>> + Send>,
    >,
}

impl fmt::Debug for PendingEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingEffect")
            .field("fiber_id", &self.fiber_id)
            .field("debug_name", &self.debug_name)
            .field("phase", &self.phase)
            .field("preorder", &self.preorder)
            .finish()
    }
}

/// A boxed, ready-to-await cleanup, extracted during unmount or before
/// a re-run create.
pub struct PendingDestroy {
    /// The fiber this cleanup belongs to.
    pub fiber_id: FiberId,
    /// Debug label for diagnostics.
    pub debug_name: String,
    /// Fiber-tree preorder index the owning create was collected at.
    pub preorder: u64,
    /// The cleanup future itself.
    pub cleanup: Cleanup,
}

impl fmt::Debug for PendingDestroy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingDestroy")
            .field("fiber_id", &self.fiber_id)
            .field("debug_name", &self.debug_name)
            .field("preorder", &self.preorder)
            .finish()
    }
}

/// Sort a batch of creates into fiber-tree order (§4.5, §8 invariant 9):
/// parent before children, siblings left-to-right.
pub fn order_creates(mut effects: Vec<PendingEffect>) -> Vec<PendingEffect> {
    effects.sort_by_key(|e| e.preorder);
    tracing::trace!(count = effects.len(), "ordered effect creates");
    effects
}

/// Sort a batch of destroys into reverse fiber-tree order (§4.5, §8
/// invariant 9): children's cleanup before their parent's.
pub fn order_destroys(mut destroys: Vec<PendingDestroy>) -> Vec<PendingDestroy> {
    destroys.sort_by_key(|d| std::cmp::Reverse(d.preorder));
    tracing::trace!(count = destroys.len(), "ordered effect destroys");
    destroys
}

/// The outcome of running one effect create.
pub enum EffectOutcome {
    /// The create succeeded; carries the cleanup to store for next time.
    Ok(Option<Cleanup>),
    /// The create failed; the engine logs this and continues.
    Failed(EffectError),
}

/// Runs batches of effects, in the order `order_creates`/`order_destroys`
/// already established.
///
/// Implementations decide *how* creates are awaited (in-process
/// sequentially, dispatched to a workflow engine, captured for a test
/// harness, …) — this mirrors `layer0::effect::Effect` being declared
/// by a turn but executed by whichever layer is hosting it.
pub trait EffectRunner: Send + Sync {
    /// Run every create in `effects`, awaiting each in order before
    /// starting the next (§4.5, "they await in sequence, not parallel").
    /// Returns one outcome per input effect, in the same order.
    fn run_creates<'a>(
        &'a self,
        effects: Vec<PendingEffect>,
    ) -> Pin<Box<dyn Future<Output = Vec<EffectOutcome>> + Send + 'a>>;

    /// Run every destroy in `destroys`, awaiting each in order.
    fn run_destroys<'a>(
        &'a self,
        destroys: Vec<PendingDestroy>,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn destroy_at(preorder: u64) -> PendingDestroy {
        PendingDestroy {
            fiber_id: FiberId(0),
            debug_name: "x".into(),
            preorder,
            cleanup: Box::new(|| Box::pin(async {})),
        }
    }

    #[test]
    fn destroys_run_in_reverse_preorder() {
        let destroys = vec![destroy_at(0), destroy_at(1), destroy_at(2)];
        let ordered = order_destroys(destroys);
        let preorders: Vec<u64> = ordered.iter().map(|d| d.preorder).collect();
        assert_eq!(preorders, vec![2, 1, 0]);
    }
}
