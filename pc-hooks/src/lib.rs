#![deny(missing_docs)]
//! Hook constructor functions operating on `pc-core`'s render-time
//! vocabulary (§4.3 "Hook Runtime").
//!
//! `pc-core::hooks` defines what a hook *is* (a `HookState` slot,
//! addressed positionally by a `HookCursor`); this crate defines the
//! functions composites actually call — `use_state`, `use_effect`,
//! `use_context`, `use_data`, … — each of which advances the cursor by
//! exactly one slot and enforces the call-order contract (§8 invariant 3).

pub mod data;
pub mod error;

pub use data::DataCache;
pub use error::HookError;

use pc_core::{
    DataState, Deps, EffectCreate, EffectPhase, EffectRecord, HookState, HookTag, RenderContext,
    Update,
};
use std::any::Any;
use std::sync::Arc;

fn mismatch_to_error(
    result: Result<&mut HookState, (HookTag, HookTag)>,
) -> Result<&mut HookState, HookError> {
    result.map_err(HookError::from_mismatch)
}

/// Whether two dependency keys differ under the shallow-compare rule
/// (§4.3 "Effect"): `None` always differs (every-commit effects always
/// re-run); `Some(vec![])` never differs after the first registration
/// (mount-only); otherwise compare element-wise.
fn deps_changed(prev: Option<&Deps>, next: &Deps) -> bool {
    match (prev, next) {
        (None, _) => true,
        (Some(None), None) => true,
        (Some(None), Some(_)) => true,
        (Some(Some(_)), None) => true,
        (Some(Some(a)), Some(b)) => a != b,
    }
}

/// A stable setter for a `use_state` slot, safe to clone into closures
/// and callbacks that outlive the render that created it.
pub struct SetState<T> {
    fiber_id: pc_core::FiberId,
    slot: usize,
    dispatch: Arc<dyn Fn(pc_core::FiberId, usize, Update) + Send + Sync>,
    schedule_work: Arc<dyn Fn(String) + Send + Sync>,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T> Clone for SetState<T> {
    fn clone(&self) -> Self {
        Self {
            fiber_id: self.fiber_id,
            slot: self.slot,
            dispatch: self.dispatch.clone(),
            schedule_work: self.schedule_work.clone(),
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T: Send + 'static> SetState<T> {
    /// Replace the state outright.
    pub fn set(&self, value: T) {
        (self.dispatch)(self.fiber_id, self.slot, Update::Replace(Box::new(value)));
        (self.schedule_work)(format!("state update on {}", self.fiber_id));
    }

    /// Apply an update function to the previous value.
    pub fn update(&self, f: impl FnOnce(&T) -> T + Send + 'static) {
        let apply: Box<dyn FnOnce(&dyn Any) -> Box<dyn Any + Send> + Send> =
            Box::new(move |prev| {
                let prev = prev.downcast_ref::<T>().expect("use_state type mismatch");
                Box::new(f(prev))
            });
        (self.dispatch)(self.fiber_id, self.slot, Update::Apply(apply));
        (self.schedule_work)(format!("state update on {}", self.fiber_id));
    }
}

/// Local component state (§4.3 "Local state").
///
/// Returns the current memoized value (after draining any updates
/// enqueued since the last render) and a stable setter.
pub fn use_state<T: Clone + Send + 'static>(
    cx: &mut RenderContext<'_>,
    init: impl FnOnce() -> T,
) -> Result<(T, SetState<T>), HookError> {
    let slot_index = cx.cursor.position();
    let fiber_id = cx.fiber_id;
    let dispatch = cx.dispatch.clone();
    let schedule_work = cx.schedule_work.clone();

    let slot = mismatch_to_error(
        cx.cursor
            .next_slot(HookTag::State, || HookState::new(HookTag::State, Box::new(init()))),
    )?;

    for update in slot.queue.drain(..) {
        let current = slot.memoized_state.downcast_ref::<T>().cloned().unwrap();
        slot.memoized_state = match update {
            Update::Replace(v) => v,
            Update::Apply(f) => f(&current),
        };
    }

    let value = slot
        .memoized_state
        .downcast_ref::<T>()
        .expect("use_state type mismatch across renders")
        .clone();

    Ok((
        value,
        SetState {
            fiber_id,
            slot: slot_index,
            dispatch,
            schedule_work,
            _marker: std::marker::PhantomData,
        },
    ))
}

/// A stable dispatcher for a `use_reducer` slot.
pub struct Dispatch<S, A> {
    fiber_id: pc_core::FiberId,
    slot: usize,
    dispatch: Arc<dyn Fn(pc_core::FiberId, usize, Update) + Send + Sync>,
    schedule_work: Arc<dyn Fn(String) + Send + Sync>,
    reducer: Arc<dyn Fn(&S, A) -> S + Send + Sync>,
}

impl<S, A> Clone for Dispatch<S, A> {
    fn clone(&self) -> Self {
        Self {
            fiber_id: self.fiber_id,
            slot: self.slot,
            dispatch: self.dispatch.clone(),
            schedule_work: self.schedule_work.clone(),
            reducer: self.reducer.clone(),
        }
    }
}

impl<S: Send + 'static, A: Send + 'static> Dispatch<S, A> {
    /// Dispatch an action; folded into state on the next render.
    pub fn dispatch(&self, action: A) {
        let reducer = self.reducer.clone();
        let apply: Box<dyn FnOnce(&dyn Any) -> Box<dyn Any + Send> + Send> =
            Box::new(move |prev| {
                let prev = prev.downcast_ref::<S>().expect("use_reducer type mismatch");
                Box::new(reducer(prev, action))
            });
        (self.dispatch)(self.fiber_id, self.slot, Update::Apply(apply));
        (self.schedule_work)(format!("reducer dispatch on {}", self.fiber_id));
    }
}

/// Reducer-style local state (§4.3 "Local state").
pub fn use_reducer<S: Clone + Send + 'static, A: Send + 'static>(
    cx: &mut RenderContext<'_>,
    init: impl FnOnce() -> S,
    reducer: impl Fn(&S, A) -> S + Send + Sync + 'static,
) -> Result<(S, Dispatch<S, A>), HookError> {
    let slot_index = cx.cursor.position();
    let fiber_id = cx.fiber_id;
    let dispatch_fn = cx.dispatch.clone();
    let schedule_work = cx.schedule_work.clone();

    let slot = mismatch_to_error(
        cx.cursor
            .next_slot(HookTag::Reducer, || HookState::new(HookTag::Reducer, Box::new(init()))),
    )?;

    let reducer_any: Arc<dyn Fn(&S, A) -> S + Send + Sync> = Arc::new(reducer);

    for update in slot.queue.drain(..) {
        let current = slot.memoized_state.downcast_ref::<S>().cloned().unwrap();
        slot.memoized_state = match update {
            Update::Replace(v) => v,
            Update::Apply(f) => f(&current),
        };
    }

    let value = slot
        .memoized_state
        .downcast_ref::<S>()
        .expect("use_reducer type mismatch across renders")
        .clone();

    Ok((
        value,
        Dispatch {
            fiber_id,
            slot: slot_index,
            dispatch: dispatch_fn,
            schedule_work,
            reducer: reducer_any,
        },
    ))
}

/// A stable cell across renders (§4.3 "Ref").
pub fn use_ref<T: Send + 'static>(
    cx: &mut RenderContext<'_>,
    init: impl FnOnce() -> T,
) -> Result<&mut T, HookError> {
    let slot = mismatch_to_error(
        cx.cursor
            .next_slot(HookTag::Ref, || HookState::new(HookTag::Ref, Box::new(init()))),
    )?;
    Ok(slot
        .memoized_state
        .downcast_mut::<T>()
        .expect("use_ref type mismatch across renders"))
}

/// Deps-keyed memoization (§4.3 "Memo / callback").
pub fn use_memo<T: Clone + Send + 'static>(
    cx: &mut RenderContext<'_>,
    deps: Deps,
    compute: impl FnOnce() -> T,
) -> Result<T, HookError> {
    let slot = mismatch_to_error(cx.cursor.next_slot(HookTag::Memo, || {
        HookState::new(HookTag::Memo, Box::new((None::<Deps>, None::<T>)))
    }))?;

    let (prev_deps, prev_value) = slot
        .memoized_state
        .downcast_mut::<(Option<Deps>, Option<T>)>()
        .expect("use_memo type mismatch across renders");

    if deps_changed(prev_deps.as_ref(), &deps) || prev_value.is_none() {
        let value = compute();
        *prev_deps = Some(deps);
        *prev_value = Some(value.clone());
        Ok(value)
    } else {
        Ok(prev_value.clone().unwrap())
    }
}

/// Deps-keyed stable callback identity (§4.3 "Memo / callback").
///
/// Functionally `use_memo` specialized to `Arc<dyn Fn>` values, kept
/// distinct because the hook call site reads more naturally as
/// `use_callback` when the memoized value is itself a closure.
pub fn use_callback<F: Send + Sync + 'static>(
    cx: &mut RenderContext<'_>,
    deps: Deps,
    make: impl FnOnce() -> F,
) -> Result<Arc<F>, HookError> {
    use_memo(cx, deps, || Arc::new(make()))
}

/// Register an effect for `phase`, deps-gated per §4.3 "Effect".
pub fn use_effect(
    cx: &mut RenderContext<'_>,
    phase: EffectPhase,
    deps: Deps,
    create: EffectCreate,
) -> Result<(), HookError> {
    register_phase_effect(cx, HookTag::Effect, phase, deps, create)
}

/// Runs once, after the fiber's first commit (§4.3, §4.5 "Mount").
pub fn use_mount(cx: &mut RenderContext<'_>, create: EffectCreate) -> Result<(), HookError> {
    register_phase_effect(cx, HookTag::Mount, EffectPhase::Mount, Some(Vec::new()), create)
}

/// Runs once, during fiber removal (§4.5 "Unmount").
pub fn use_unmount(cx: &mut RenderContext<'_>, create: EffectCreate) -> Result<(), HookError> {
    register_phase_effect(cx, HookTag::Unmount, EffectPhase::Unmount, Some(Vec::new()), create)
}

/// Runs before reconciliation begins (§4.5 "TickStart").
pub fn use_tick_start(cx: &mut RenderContext<'_>, create: EffectCreate) -> Result<(), HookError> {
    register_phase_effect(cx, HookTag::TickStart, EffectPhase::TickStart, None, create)
}

/// Runs after the model turn concludes (§4.5 "TickEnd").
pub fn use_tick_end(cx: &mut RenderContext<'_>, create: EffectCreate) -> Result<(), HookError> {
    register_phase_effect(cx, HookTag::TickEnd, EffectPhase::TickEnd, None, create)
}

/// Runs after collection of a compile iteration; may request a recompile
/// (§4.5 "AfterCompile", §9 "Mount-phase recompile").
pub fn use_after_compile(cx: &mut RenderContext<'_>, create: EffectCreate) -> Result<(), HookError> {
    register_phase_effect(cx, HookTag::AfterCompile, EffectPhase::AfterCompile, None, create)
}

/// Registers a callback invoked when an external message arrives
/// mid-execution (§4.3 "On-message hook").
pub fn use_on_message(cx: &mut RenderContext<'_>, create: EffectCreate) -> Result<(), HookError> {
    register_phase_effect(cx, HookTag::OnMessage, EffectPhase::OnMessage, None, create)
}

fn register_phase_effect(
    cx: &mut RenderContext<'_>,
    tag: HookTag,
    phase: EffectPhase,
    deps: Deps,
    create: EffectCreate,
) -> Result<(), HookError> {
    let slot =
        mismatch_to_error(cx.cursor.next_slot(tag, || HookState::new(tag, Box::new(()))))?;

    let pending = match slot.effect.as_ref() {
        Some(effect) => deps_changed(Some(&effect.deps), &deps),
        None => true,
    };
    let destroy = slot.effect.take().and_then(|e| e.destroy);

    slot.effect = Some(EffectRecord {
        phase,
        create,
        destroy,
        deps,
        pending,
    });
    Ok(())
}

/// Look up the nearest ancestor context value for `token` (§4.3 "Context").
///
/// Occupies a hook-chain slot (tag `Context`) purely for call-order
/// tracking; the looked-up value itself lives on the context stack,
/// not in hook state.
pub fn use_context(
    cx: &mut RenderContext<'_>,
    token: &str,
) -> Result<Option<serde_json::Value>, HookError> {
    mismatch_to_error(
        cx.cursor
            .next_slot(HookTag::Context, || HookState::new(HookTag::Context, Box::new(()))),
    )?;
    Ok(cx.context(token).cloned())
}

/// Suspending keyed data fetch (§4.3 "Data fetch", §9 "Async-as-suspension").
///
/// Occupies a hook-chain slot (tag `Async`) like any other hook, so a
/// data hook added or removed between renders is caught by the
/// call-order contract same as `use_state`; the actual value lives in
/// `cache`, keyed by `key`, since it must outlive any single render.
/// The first call for a key returns `DataState::Pending` (and
/// registers the key as awaitable); once a fetch completes and calls
/// `cache.set_ready`, subsequent calls return `DataState::Ready`.
pub fn use_data<T: Clone + Send + Sync + 'static>(
    cx: &mut RenderContext<'_>,
    cache: &DataCache,
    key: impl Into<String>,
) -> Result<DataState<T>, HookError> {
    let key = key.into();
    let slot = mismatch_to_error(cx.cursor.next_slot(HookTag::Async, || {
        HookState::new(HookTag::Async, Box::new(key.clone()))
    }))?;
    *slot
        .memoized_state
        .downcast_mut::<String>()
        .expect("use_data key slot corrupted") = key.clone();
    Ok(cache.get(&key))
}

/// A callable state cell with subscribers (§4.3 "Signal").
///
/// Setting a signal during a render schedules a recompile request
/// through `cx.schedule_work`; setting one outside any tick invokes
/// `reconcile_callback` instead, mirroring "when set outside any tick,
/// it invokes the reconcile-callback" (§4.3).
pub struct Signal<T> {
    value: Arc<std::sync::Mutex<T>>,
    reconcile_callback: Arc<dyn Fn() + Send + Sync>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            reconcile_callback: self.reconcile_callback.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Signal<T> {
    /// Read the current value.
    pub fn get(&self) -> T {
        self.value.lock().expect("signal poisoned").clone()
    }

    /// Set the value from within a render: schedules a recompile.
    pub fn set_in_render(&self, cx: &RenderContext<'_>, value: T) {
        *self.value.lock().expect("signal poisoned") = value;
        (cx.schedule_work)(format!("signal update on {}", cx.fiber_id));
    }

    /// Set the value from outside a tick (e.g. an external event
    /// handler): invokes the reconcile callback directly.
    pub fn set_outside_tick(&self, value: T) {
        *self.value.lock().expect("signal poisoned") = value;
        (self.reconcile_callback)();
    }
}

/// Stable-identity signal cell (§4.3 "Signal").
pub fn use_signal<T: Clone + Send + 'static>(
    cx: &mut RenderContext<'_>,
    init: impl FnOnce() -> T,
    reconcile_callback: Arc<dyn Fn() + Send + Sync>,
) -> Result<Signal<T>, HookError> {
    let slot = mismatch_to_error(cx.cursor.next_slot(HookTag::Signal, || {
        HookState::new(
            HookTag::Signal,
            Box::new(Signal {
                value: Arc::new(std::sync::Mutex::new(init())),
                reconcile_callback: reconcile_callback.clone(),
            }),
        )
    }))?;
    Ok(slot
        .memoized_state
        .downcast_ref::<Signal<T>>()
        .expect("use_signal type mismatch across renders")
        .clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pc_core::{FiberId, HookCursor};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn test_cx<'a>(hooks: &'a mut Vec<HookState>, reasons: &'a Mutex<Vec<String>>) -> RenderContext<'a> {
        let schedule_work: Arc<dyn Fn(String) + Send + Sync> = {
            Arc::new(move |reason: String| {
                reasons.lock().unwrap().push(reason);
            })
        };
        let dispatch: Arc<dyn Fn(FiberId, usize, Update) + Send + Sync> =
            Arc::new(|_fiber, _slot, _update| {});
        let is_first = hooks_is_first(hooks);
        RenderContext {
            fiber_id: FiberId(0),
            cursor: HookCursor::new(hooks, is_first),
            context_stack: &[],
            tick_number: 0,
            tick_cancelled: false,
            schedule_work,
            dispatch,
            is_hydrating: false,
        }
    }

    fn hooks_is_first(hooks: &[HookState]) -> bool {
        hooks.is_empty()
    }

    #[test]
    fn use_state_roundtrips_initial_value() {
        let mut hooks = Vec::new();
        let reasons = Mutex::new(Vec::new());
        let mut cx = test_cx(&mut hooks, &reasons);
        let (value, _set) = use_state(&mut cx, || 7u32).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn use_memo_recomputes_only_on_dep_change() {
        let mut hooks = Vec::new();
        let reasons = Mutex::new(Vec::new());
        let calls = AtomicUsize::new(0);

        {
            let mut cx = test_cx(&mut hooks, &reasons);
            let v = use_memo(&mut cx, Some(vec!["a".into()]), || {
                calls.fetch_add(1, Ordering::SeqCst);
                10
            })
            .unwrap();
            assert_eq!(v, 10);
        }
        {
            let mut cx = test_cx(&mut hooks, &reasons);
            let v = use_memo(&mut cx, Some(vec!["a".into()]), || {
                calls.fetch_add(1, Ordering::SeqCst);
                20
            })
            .unwrap();
            assert_eq!(v, 10, "deps unchanged, should not recompute");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn use_data_is_pending_then_ready() {
        let cache = DataCache::new();
        let mut hooks = Vec::new();
        let reasons = Mutex::new(Vec::new());

        {
            let mut cx = test_cx(&mut hooks, &reasons);
            assert!(matches!(
                use_data::<u32>(&mut cx, &cache, "k").unwrap(),
                DataState::Pending { .. }
            ));
        }
        cache.set_ready("k", 42u32);
        {
            let mut cx = test_cx(&mut hooks, &reasons);
            match use_data::<u32>(&mut cx, &cache, "k").unwrap() {
                DataState::Ready(v) => assert_eq!(v, 42),
                DataState::Pending { .. } => panic!("expected ready"),
            }
        }
    }
}
