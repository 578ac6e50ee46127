//! Effect phases — the shared vocabulary for when a hook-registered
//! effect runs (§4.5). The queueing and execution machinery lives in
//! `pc-effects-core`/`pc-effects-local`; this is just the enum every
//! crate that touches effects needs to agree on.

use serde::{Deserialize, Serialize};

/// The phase at which a hook-registered effect runs.
///
/// `Mount` and `Commit` fire inside the reconciler's commit step;
/// the rest are driven by the compile driver at the points named here.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectPhase {
    /// Runs once, after a fiber's first commit.
    Mount,
    /// Runs after every commit where the fiber was placed or its deps changed.
    Commit,
    /// Runs once, during fiber removal. Always runs in reverse tree order.
    Unmount,
    /// Runs before reconciliation begins, triggered by the driver.
    TickStart,
    /// Runs after reconciliation, before collection.
    AfterRender,
    /// Runs after collection of a compile iteration; may request a recompile.
    AfterCompile,
    /// Runs after the model turn concludes.
    TickEnd,
    /// Runs once at the end of the overall execution.
    Complete,
    /// Runs when an external message is delivered mid-execution.
    OnMessage,
}

impl EffectPhase {
    /// Whether this phase fires during the reconciler's commit step,
    /// as opposed to being driven externally by the compile driver.
    pub fn runs_during_commit(self) -> bool {
        matches!(self, Self::Mount | Self::Commit)
    }

    /// Whether a recompile requested from this phase is honored.
    ///
    /// Resolves the "Mount-phase recompile" open question in favor of
    /// honoring it: every phase may request another iteration.
    pub fn honors_recompile(self) -> bool {
        true
    }
}
