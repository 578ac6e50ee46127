//! Per-fiber hook-state vocabulary (§3 "Hook State", §4.3).
//!
//! This module defines the *data* a hook call produces and how it is
//! threaded across renders. The actual hook constructor functions
//! (`use_state`, `use_effect`, `use_context`, …) live in `pc-hooks`,
//! which operates on the types defined here — the split mirrors
//! `layer0::hook` (the contract) versus `neuron-hooks` (the dispatch
//! engine built on top of it).

use crate::effect::EffectPhase;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Which kind of hook produced a given [`HookState`] slot.
///
/// Ordered exactly as enumerated in the hook-state data model so a
/// call-order mismatch can name both the expected and observed tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookTag {
    /// `use_state`.
    State,
    /// `use_reducer`.
    Reducer,
    /// `use_signal`.
    Signal,
    /// `use_effect` (any phase).
    Effect,
    /// `use_memo`.
    Memo,
    /// `use_callback`.
    Callback,
    /// `use_ref`.
    Ref,
    /// `use_data` (async/suspending data fetch).
    Async,
    /// `use_tick_start`.
    TickStart,
    /// `use_tick_end`.
    TickEnd,
    /// `use_after_compile`.
    AfterCompile,
    /// `use_mount`.
    Mount,
    /// `use_unmount`.
    Unmount,
    /// `use_on_message`.
    OnMessage,
    /// `use_context`.
    Context,
    /// Reserved for a bare `use_data` cache slot with no suspension.
    Data,
}

impl fmt::Display for HookTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookTag::State => "state",
            HookTag::Reducer => "reducer",
            HookTag::Signal => "signal",
            HookTag::Effect => "effect",
            HookTag::Memo => "memo",
            HookTag::Callback => "callback",
            HookTag::Ref => "ref",
            HookTag::Async => "async",
            HookTag::TickStart => "tick_start",
            HookTag::TickEnd => "tick_end",
            HookTag::AfterCompile => "after_compile",
            HookTag::Mount => "mount",
            HookTag::Unmount => "unmount",
            HookTag::OnMessage => "on_message",
            HookTag::Context => "context",
            HookTag::Data => "data",
        };
        write!(f, "{name}")
    }
}

/// A pending update enqueued by a state-setter or reducer dispatch.
///
/// Updates are drained in append order on the next render (§4.3,
/// "pending array, with atomic append"); this implementation appends
/// to a `Vec` under the fiber's own hook-state ownership, which is
/// only ever touched from the single-threaded render path, so no
/// additional synchronization is required.
pub enum Update {
    /// Replace the memoized state outright.
    Replace(Box<dyn Any + Send>),
    /// Apply a reducer-style update function to the previous state.
    Apply(Box<dyn FnOnce(&dyn Any) -> Box<dyn Any + Send> + Send>),
}

/// A future-returning cleanup callback, run before the next effect
/// create (or on unmount).
pub type Cleanup = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// A future-returning effect create callback.
///
/// Returns an optional [`Cleanup`] to run before the next create (or
/// on unmount), mirroring the hook-state model's `destroy` field. The
/// `Err` side is a boxed error rather than a crate-specific type since
/// `pc-core` sits below the effect-execution crates that define what
/// "an effect error" means (§7 "Effect error").
pub type EffectCreate = Box<
    dyn FnMut() -> Pin<
            Box<dyn Future<Output = Result<Option<Cleanup>, Box<dyn std::error::Error + Send + Sync>>> + Send>,
        > + Send,
>;

/// Dependency key used for shallow-compare memoization across renders.
///
/// `None` means "no deps array" (effect semantics: runs every commit);
/// `Some(vec![])` means "mount only"; `Some(deps)` means "re-run when
/// any entry changes" (§3 "Effect", §4.3 "Memo / callback").
pub type Deps = Option<Vec<String>>;

/// A recorded effect, attached to a `HookState` of tag `Effect`.
pub struct EffectRecord {
    /// When this effect runs.
    pub phase: EffectPhase,
    /// The create callback for this render.
    pub create: EffectCreate,
    /// The cleanup returned by the previous create, if any.
    pub destroy: Option<Cleanup>,
    /// Dependency key from the current render.
    pub deps: Deps,
    /// Whether this effect's create still needs to run this commit.
    pub pending: bool,
}

impl fmt::Debug for EffectRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectRecord")
            .field("phase", &self.phase)
            .field("deps", &self.deps)
            .field("pending", &self.pending)
            .field("has_destroy", &self.destroy.is_some())
            .finish()
    }
}

/// The outcome of asking a suspending data hook for its value.
///
/// This is the Rust-idiomatic stand-in for "throwing a promise" (§9,
/// "Async-as-suspension"): a composite's data hook call returns
/// `Pending` instead of a value, and `pc-reconciler` treats that as a
/// suspension signal rather than as an error.
#[derive(Debug, Clone)]
pub enum DataState<T> {
    /// The value is not yet available; the given key has been
    /// registered in the data cache and a retry should be scheduled
    /// once it resolves.
    Pending {
        /// The cache key this data hook is waiting on.
        key: String,
    },
    /// The value is available.
    Ready(T),
}

impl<T> DataState<T> {
    /// Whether this is the pending variant.
    pub fn is_pending(&self) -> bool {
        matches!(self, DataState::Pending { .. })
    }
}

/// One node in a fiber's hook-state chain.
///
/// Represented as a plain struct addressed by position in a `Vec`
/// rather than a literal linked list — the call-order contract only
/// requires *positional* stability, and a `Vec` gives the same
/// guarantee with better cache locality and none of Rust's
/// self-referential-pointer headaches.
pub struct HookState {
    /// Which hook produced this slot.
    pub tag: HookTag,
    /// The memoized value (state, memo result, ref cell, …).
    pub memoized_state: Box<dyn Any + Send>,
    /// Pending updates not yet folded into `memoized_state`.
    pub queue: Vec<Update>,
    /// The effect this slot represents, for `Effect`-tagged slots.
    pub effect: Option<EffectRecord>,
}

impl fmt::Debug for HookState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookState")
            .field("tag", &self.tag)
            .field("queue_len", &self.queue.len())
            .field("effect", &self.effect)
            .finish()
    }
}

impl HookState {
    /// Construct a new hook-state slot with no pending updates or effect.
    pub fn new(tag: HookTag, memoized_state: Box<dyn Any + Send>) -> Self {
        Self {
            tag,
            memoized_state,
            queue: Vec::new(),
            effect: None,
        }
    }
}

/// A cursor into a fiber's hook-state chain, advanced one slot per
/// hook call during a single render (§4.3, "Call-order contract").
pub struct HookCursor<'a> {
    hooks: &'a mut Vec<HookState>,
    cursor: usize,
    recorded_len: usize,
    pub(crate) is_first_render: bool,
}

impl<'a> HookCursor<'a> {
    /// Create a cursor over `hooks`, positioned at the start.
    pub fn new(hooks: &'a mut Vec<HookState>, is_first_render: bool) -> Self {
        let recorded_len = hooks.len();
        Self {
            hooks,
            cursor: 0,
            recorded_len,
            is_first_render,
        }
    }

    /// Whether this is the fiber's first render (no prior hook chain).
    pub fn is_first_render(&self) -> bool {
        self.is_first_render
    }

    /// Number of hook slots called so far this render.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Total number of slots recorded from the previous render, fixed
    /// at cursor creation (growing `hooks` mid-render must not move
    /// this baseline, or a grown-by-one mismatch would go undetected).
    pub fn recorded_len(&self) -> usize {
        self.recorded_len
    }

    /// Advance the cursor one slot, enforcing the call-order contract.
    ///
    /// On first render, appends a fresh slot built from `init`. On a
    /// re-render, compares the recorded tag at this position against
    /// `tag` and returns `Err` on mismatch (§8 invariant 3); on match,
    /// returns a mutable reference to the existing slot.
    pub fn next_slot(
        &mut self,
        tag: HookTag,
        init: impl FnOnce() -> HookState,
    ) -> Result<&mut HookState, (HookTag, HookTag)> {
        let index = self.cursor;
        self.cursor += 1;

        if index >= self.hooks.len() {
            self.hooks.push(init());
        }

        let slot = &mut self.hooks[index];
        if slot.tag != tag {
            return Err((slot.tag, tag));
        }
        Ok(slot)
    }

    /// Whether the number of hooks called this render differs from the
    /// number recorded on the fiber (a hook-count mismatch, §8 invariant 3).
    pub fn count_mismatch(&self) -> Option<(usize, usize)> {
        if !self.is_first_render && self.cursor != self.recorded_len {
            Some((self.recorded_len, self.cursor))
        } else {
            None
        }
    }
}
