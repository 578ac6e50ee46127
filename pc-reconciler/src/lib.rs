#![deny(missing_docs)]
//! The reconciler (§4.4 "Reconciler", C4): identity-matched child-list
//! diffing over a double-buffered fiber tree, followed by a commit
//! phase that fires deletions and lifecycle effects in deterministic
//! order.
//!
//! The work loop is iterative (an explicit stack), not recursive,
//! mirroring how fiber reconcilers are usually built: the loop can
//! pause mid-traversal to await a suspended composite's data fetch
//! without needing recursive-`async fn` boxing.

mod arena;
mod error;

pub use arena::FiberArena;
pub use error::ReconcileError;

use pc_core::{
    FiberFlags, FiberId, HookTag, Node, NodeType, RenderContext, RenderOutcome, TickState, Update,
};
use pc_effects_core::{EffectOutcome, EffectRunner, PendingDestroy, PendingEffect};
use pc_hooks::DataCache;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Tunable limits for one reconciliation pass (§4.3, §4.4).
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Max retries for a composite stuck returning `Pending` (§4.3).
    pub max_suspend_retries: u32,
    /// Render-count-per-composite threshold that triggers a loop warning (§4.4).
    pub render_count_warn_threshold: u32,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            max_suspend_retries: 10,
            render_count_warn_threshold: 10,
        }
    }
}

/// Enqueues a pending state/reducer [`Update`] from outside the render
/// that created its setter (§4.3 "pending array, with atomic append").
/// Shared between every [`RenderContext`] built during one reconcile.
pub type DispatchQueue = Arc<Mutex<Vec<(FiberId, usize, Update)>>>;

/// Sink for recompile requests raised via `RenderContext::schedule_work`
/// during render (signals set mid-render, §4.3 "Signal").
pub type RecompileSink = Arc<Mutex<Vec<String>>>;

/// One entry on `run_work_loop`'s explicit work stack.
///
/// `Fiber` is a unit of tree work, same as before; `PopContext` is a
/// scoping marker enqueued right after a context-provider fiber pushes
/// its value, underneath that fiber's own children, so it only surfaces
/// (truncating `context_stack` back to the recorded depth) once the
/// whole subtree under the provider has been popped — not when the
/// next unrelated sibling or cousin is visited (§4.3, "pushes onto the
/// context stack around its children").
enum WorkItem {
    /// Visit this fiber (render if composite, then reconcile its children).
    Fiber(FiberId),
    /// Truncate `context_stack` back to this length.
    PopContext(usize),
}

/// Owns the fiber arena and the current committed root across ticks.
pub struct Reconciler {
    arena: FiberArena,
    current_root: Option<FiberId>,
    dispatch_queue: DispatchQueue,
    render_counts: HashMap<FiberId, u32>,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reconciler {
    /// Construct a reconciler with an empty arena and no committed root.
    pub fn new() -> Self {
        Self {
            arena: FiberArena::new(),
            current_root: None,
            dispatch_queue: Arc::new(Mutex::new(Vec::new())),
            render_counts: HashMap::new(),
        }
    }

    /// Read-only access to the fiber arena, for `pc-collector` to
    /// traverse the committed tree after reconcile returns.
    pub fn arena(&self) -> &FiberArena {
        &self.arena
    }

    /// Mutable access to the fiber arena, for `pc-compiler` to run the
    /// driver-driven effect phases (§4.9: `TickStart`/`AfterRender`/
    /// `AfterCompile`/`TickEnd`/`Complete`/`OnMessage`) the same way
    /// `commit` runs `Mount`/`Commit` — extracting pending effect
    /// records from the hook chain and clearing them once collected.
    pub fn arena_mut(&mut self) -> &mut FiberArena {
        &mut self.arena
    }

    /// The currently committed root fiber, if any reconcile has run.
    pub fn current_root(&self) -> Option<FiberId> {
        self.current_root
    }

    /// A handle a host application can use to enqueue a state update
    /// for a fiber/slot outside of any render (e.g. from an async
    /// effect's completion).
    pub fn dispatch_queue(&self) -> DispatchQueue {
        self.dispatch_queue.clone()
    }

    /// Reconcile `element` against the current tree, run Mount/Commit
    /// effects via `effect_runner`, and swap buffers (§4.4 steps 1-4).
    ///
    /// Returns the new current root id. On a composite render error,
    /// the work-in-progress buffer is abandoned and the previous
    /// `current_root` (if any) is left untouched (§7 "render error",
    /// §5 "Cancellation and timeouts").
    pub async fn reconcile(
        &mut self,
        element: Node,
        tick: &TickState,
        data_cache: &DataCache,
        effect_runner: &dyn EffectRunner,
        recompile_sink: RecompileSink,
        options: &ReconcileOptions,
    ) -> Result<FiberId, ReconcileError> {
        self.reconcile_inner(element, tick, data_cache, effect_runner, recompile_sink, options, false)
            .await
    }

    /// As [`Reconciler::reconcile`], but threading `is_hydrating` into
    /// every `RenderContext` built this pass (§6.1 "hydrating surface"),
    /// so a composite's own hook logic can special-case the first
    /// post-restore render instead of the driver reconstructing opaque
    /// boxed hook state on its behalf.
    pub async fn reconcile_hydrating(
        &mut self,
        element: Node,
        tick: &TickState,
        data_cache: &DataCache,
        effect_runner: &dyn EffectRunner,
        recompile_sink: RecompileSink,
        options: &ReconcileOptions,
    ) -> Result<FiberId, ReconcileError> {
        self.reconcile_inner(element, tick, data_cache, effect_runner, recompile_sink, options, true)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn reconcile_inner(
        &mut self,
        element: Node,
        tick: &TickState,
        data_cache: &DataCache,
        effect_runner: &dyn EffectRunner,
        recompile_sink: RecompileSink,
        options: &ReconcileOptions,
        is_hydrating: bool,
    ) -> Result<FiberId, ReconcileError> {
        self.drain_dispatch_queue();

        let schedule_work: Arc<dyn Fn(String) + Send + Sync> = {
            let sink = recompile_sink;
            Arc::new(move |reason: String| {
                sink.lock().expect("recompile sink poisoned").push(reason);
            })
        };
        let dispatch: Arc<dyn Fn(FiberId, usize, Update) + Send + Sync> = {
            let queue = self.dispatch_queue.clone();
            Arc::new(move |fiber, slot, update| {
                queue.lock().expect("dispatch queue poisoned").push((fiber, slot, update));
            })
        };

        let mut context_stack: Vec<(String, serde_json::Value)> = Vec::new();
        let mut pending_children: HashMap<FiberId, Vec<Node>> = HashMap::new();

        let old_root = self.current_root;
        let root_id = match old_root {
            None => self.arena.create_fiber(
                element.node_type.clone(),
                element.key.clone(),
                element.props.clone(),
                node_debug_name(&element.node_type),
            ),
            Some(old) => self
                .arena
                .clone_for_update(old, element.node_type.clone(), element.props.clone()),
        };
        sync_ref_flag(&mut self.arena, root_id);
        pending_children.insert(root_id, element.children);

        let result = self
            .run_work_loop(
                root_id,
                tick,
                &mut context_stack,
                &mut pending_children,
                data_cache,
                dispatch,
                schedule_work,
                options,
                is_hydrating,
            )
            .await;

        if let Err(err) = result {
            if let Some(old) = old_root {
                self.arena.abandon_wip(old, root_id);
            }
            return Err(err);
        }

        self.commit(root_id, effect_runner).await;
        self.current_root = Some(root_id);
        Ok(root_id)
    }

    fn drain_dispatch_queue(&mut self) {
        let drained: Vec<(FiberId, usize, Update)> =
            std::mem::take(&mut *self.dispatch_queue.lock().expect("dispatch queue poisoned"));
        for (fiber_id, slot_idx, update) in drained {
            if let Some(fiber) = self.arena.get_mut(fiber_id) {
                if let Some(slot) = fiber.memoized_state.get_mut(slot_idx) {
                    slot.queue.push(update);
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_work_loop(
        &mut self,
        root_id: FiberId,
        tick: &TickState,
        context_stack: &mut Vec<(String, serde_json::Value)>,
        pending_children: &mut HashMap<FiberId, Vec<Node>>,
        data_cache: &DataCache,
        dispatch: Arc<dyn Fn(FiberId, usize, Update) + Send + Sync>,
        schedule_work: Arc<dyn Fn(String) + Send + Sync>,
        options: &ReconcileOptions,
        is_hydrating: bool,
    ) -> Result<(), ReconcileError> {
        let mut stack = vec![WorkItem::Fiber(root_id)];

        while let Some(item) = stack.pop() {
            let fiber_id = match item {
                WorkItem::Fiber(id) => id,
                WorkItem::PopContext(depth) => {
                    context_stack.truncate(depth);
                    continue;
                }
            };

            let node_type = self
                .arena
                .get(fiber_id)
                .expect("work item references unknown fiber")
                .node_type
                .clone();

            let children_nodes = match &node_type {
                NodeType::Composite(component) => {
                    let component = component.clone();
                    let mut retries = 0u32;
                    loop {
                        let is_first = self
                            .arena
                            .get(fiber_id)
                            .map(|f| f.alternate.is_none())
                            .unwrap_or(true);
                        let props = self.arena.get(fiber_id).unwrap().pending_props.clone();

                        let (outcome, mismatch) = {
                            let fiber = self.arena.get_mut(fiber_id).unwrap();
                            let mut cx = RenderContext {
                                fiber_id,
                                cursor: pc_core::HookCursor::new(&mut fiber.memoized_state, is_first),
                                context_stack: context_stack.as_slice(),
                                tick_number: tick.tick_number,
                                tick_cancelled: tick.is_cancelled(),
                                schedule_work: schedule_work.clone(),
                                dispatch: dispatch.clone(),
                                is_hydrating,
                            };
                            let outcome = component.render(&props, &mut cx);
                            (outcome, cx.cursor.count_mismatch())
                        };

                        let count = self.render_counts.entry(fiber_id).or_insert(0);
                        *count += 1;
                        if *count == options.render_count_warn_threshold {
                            tracing::warn!(
                                fiber = %fiber_id,
                                component = component.name(),
                                count = *count,
                                "composite exceeded render-count threshold this tick"
                            );
                        }

                        match outcome {
                            RenderOutcome::Children(children) => {
                                if let Some((previous, current)) = mismatch {
                                    tracing::warn!(
                                        fiber = %fiber_id,
                                        component = component.name(),
                                        previous,
                                        current,
                                        "hook count changed across renders"
                                    );
                                    return Err(pc_core::InvariantError::HookCountChanged {
                                        fiber: component.name().to_string(),
                                        previous,
                                        current,
                                    }
                                    .into());
                                }
                                break children;
                            }
                            RenderOutcome::Err(err) => return Err(err.into()),
                            RenderOutcome::Suspend(key) => {
                                retries += 1;
                                if retries > options.max_suspend_retries {
                                    return Err(ReconcileError::SuspenseExhausted {
                                        fiber: fiber_id,
                                        key,
                                        max_retries: options.max_suspend_retries,
                                    });
                                }
                                if let Some(notify) = data_cache.notify_handle(&key) {
                                    notify.notified().await;
                                } else {
                                    tokio::task::yield_now().await;
                                }
                            }
                        }
                    }
                }
                NodeType::Host(_) | NodeType::Tag(_) => {
                    pending_children.remove(&fiber_id).unwrap_or_default()
                }
            };

            // A context provider's pushed value must only be visible to its
            // own subtree (§4.3 "pushes onto the context stack around its
            // children"): record the pre-push depth and enqueue a
            // `PopContext` marker *below* this fiber's children on the work
            // stack, so it only pops (truncating `context_stack` back to
            // that depth) once every descendant has been processed — not
            // when unrelated siblings/cousins are visited next.
            if let NodeType::Composite(component) = &node_type {
                if let Some(pc_core::BoundaryKind::ContextProvider { token, value }) = component.boundary() {
                    let depth = context_stack.len();
                    context_stack.push((token, value));
                    stack.push(WorkItem::PopContext(depth));
                }
            }

            self.reconcile_children(fiber_id, children_nodes, pending_children, &mut stack)?;
        }

        Ok(())
    }

    fn reconcile_children(
        &mut self,
        parent_id: FiberId,
        new_children: Vec<Node>,
        pending_children: &mut HashMap<FiberId, Vec<Node>>,
        stack: &mut Vec<WorkItem>,
    ) -> Result<(), ReconcileError> {
        let old_children = self.old_child_ids(parent_id);

        if new_children.len() > 1 && new_children.iter().any(|c| c.key.is_none()) {
            tracing::debug!(parent = %parent_id, "sibling list has nodes with no explicit key");
        }

        let mut new_ids = Vec::with_capacity(new_children.len());
        let mut deletions = Vec::new();

        for (index, new_node) in new_children.into_iter().enumerate() {
            let old_id = old_children.get(index).copied();
            let reusable = old_id.is_some_and(|id| {
                let old = self.arena.get(id).expect("old child id must exist");
                old.same_type_as(&new_node.node_type) && old.key == new_node.key
            });

            let child_id = if reusable {
                let old_id = old_id.unwrap();
                self.arena
                    .clone_for_update(old_id, new_node.node_type.clone(), new_node.props.clone())
            } else {
                if let Some(old_id) = old_id {
                    if let Some(old_fiber) = self.arena.get_mut(old_id) {
                        old_fiber.flags.insert(FiberFlags::DELETION);
                    }
                    deletions.push(old_id);
                }
                self.arena.create_fiber(
                    new_node.node_type.clone(),
                    new_node.key.clone(),
                    new_node.props.clone(),
                    node_debug_name(&new_node.node_type),
                )
            };

            if let Some(fiber) = self.arena.get_mut(child_id) {
                fiber.parent = parent_id;
                fiber.index = index as u32;
            }
            sync_ref_flag(&mut self.arena, child_id);
            pending_children.insert(child_id, new_node.children);
            new_ids.push(child_id);
            stack.push(WorkItem::Fiber(child_id));
        }

        for leftover in old_children.into_iter().skip(new_ids.len()) {
            if let Some(fiber) = self.arena.get_mut(leftover) {
                fiber.flags.insert(FiberFlags::DELETION);
            }
            deletions.push(leftover);
        }

        for window in new_ids.windows(2) {
            if let [a, b] = window {
                if let Some(fa) = self.arena.get_mut(*a) {
                    fa.sibling = *b;
                }
            }
        }
        if let Some(last) = new_ids.last() {
            if let Some(fl) = self.arena.get_mut(*last) {
                fl.sibling = FiberId::NONE;
            }
        }

        if let Some(parent) = self.arena.get_mut(parent_id) {
            parent.child = new_ids.first().copied().unwrap_or(FiberId::NONE);
            if !deletions.is_empty() {
                parent.flags.insert(FiberFlags::CHILD_DELETION);
            }
            parent.deletions = deletions;
        }

        Ok(())
    }

    fn old_child_ids(&self, parent_id: FiberId) -> Vec<FiberId> {
        let Some(parent) = self.arena.get(parent_id) else { return Vec::new() };
        let Some(old_parent_id) = parent.alternate else { return Vec::new() };
        let Some(old_parent) = self.arena.get(old_parent_id) else { return Vec::new() };

        let mut ids = Vec::new();
        let mut cur = old_parent.child;
        while !cur.is_none() {
            ids.push(cur);
            cur = self.arena.get(cur).map(|f| f.sibling).unwrap_or(FiberId::NONE);
        }
        ids
    }

    async fn commit(&mut self, root_id: FiberId, effect_runner: &dyn EffectRunner) {
        self.run_deletions(root_id, effect_runner).await;
        self.run_mount_and_commit_effects(root_id, effect_runner).await;
    }

    /// Unmounts every deleted subtree, reverse-preorder (children before
    /// parents, §4.5 "Unmount", §8 invariant 9). Runs before the
    /// retained tree's own Mount/Commit effects.
    async fn run_deletions(&mut self, root_id: FiberId, effect_runner: &dyn EffectRunner) {
        let deletion_roots = self.collect_deletion_roots(root_id);
        if deletion_roots.is_empty() {
            return;
        }

        let mut destroys = Vec::new();
        let mut unmount_creates = Vec::new();

        for del_root in deletion_roots {
            let mut order = self.arena.traverse_preorder(del_root);
            order.reverse();
            for (i, fiber_id) in order.into_iter().enumerate() {
                let Some(fiber) = self.arena.get_mut(fiber_id) else { continue };
                let debug_name = fiber.debug_name.clone();
                for slot in fiber.memoized_state.iter_mut() {
                    let tag = slot.tag;
                    let Some(effect) = slot.effect.as_mut() else { continue };
                    if let Some(destroy) = effect.destroy.take() {
                        destroys.push(PendingDestroy {
                            fiber_id,
                            debug_name: debug_name.clone(),
                            preorder: i as u64,
                            cleanup: destroy,
                        });
                    }
                    if tag == HookTag::Unmount {
                        let future = (effect.create)();
                        unmount_creates.push(PendingEffect {
                            fiber_id,
                            debug_name: debug_name.clone(),
                            phase: pc_core::EffectPhase::Unmount,
                            preorder: i as u64,
                            future,
                        });
                    }
                }
            }
        }

        effect_runner.run_destroys(pc_effects_core::order_destroys(destroys)).await;
        let outcomes = effect_runner
            .run_creates(pc_effects_core::order_creates(unmount_creates))
            .await;
        for outcome in outcomes {
            if let EffectOutcome::Failed(err) = outcome {
                tracing::error!(%err, "unmount effect failed");
            }
        }
    }

    fn collect_deletion_roots(&self, root_id: FiberId) -> Vec<FiberId> {
        let mut roots = Vec::new();
        for fiber_id in self.arena.traverse_preorder(root_id) {
            if let Some(fiber) = self.arena.get(fiber_id) {
                roots.extend(fiber.deletions.iter().copied());
            }
        }
        roots
    }

    /// Runs Mount effects for newly placed fibers and Commit effects
    /// for any fiber whose effect deps changed, in tree-preorder (§4.5,
    /// §8 invariant 9). Stores each create's returned cleanup back onto
    /// the exact slot it came from, tracked alongside the batch since
    /// one fiber may register several effects.
    async fn run_mount_and_commit_effects(&mut self, root_id: FiberId, effect_runner: &dyn EffectRunner) {
        let order = self.arena.traverse_preorder(root_id);
        let mut batch: Vec<(PendingEffect, usize)> = Vec::new();

        for (i, fiber_id) in order.iter().copied().enumerate() {
            let Some(fiber) = self.arena.get_mut(fiber_id) else { continue };
            let is_placement = fiber.flags.contains(FiberFlags::PLACEMENT);
            let debug_name = fiber.debug_name.clone();
            for (slot_idx, slot) in fiber.memoized_state.iter_mut().enumerate() {
                let Some(effect) = slot.effect.as_mut() else { continue };
                let should_run = match effect.phase {
                    pc_core::EffectPhase::Mount => is_placement && effect.pending,
                    pc_core::EffectPhase::Commit => effect.pending,
                    _ => false,
                };
                if should_run {
                    let future = (effect.create)();
                    batch.push((
                        PendingEffect {
                            fiber_id,
                            debug_name: debug_name.clone(),
                            phase: effect.phase,
                            preorder: i as u64,
                            future,
                        },
                        slot_idx,
                    ));
                    effect.pending = false;
                }
            }
        }

        // Mirrors `pc_effects_core::order_creates`: parent before
        // children, siblings left-to-right. Sorted as a bundle so the
        // (fiber, slot) pairing below survives reordering.
        batch.sort_by_key(|(e, _)| e.preorder);
        let (creates, slots): (Vec<PendingEffect>, Vec<usize>) = batch.into_iter().unzip();
        let fiber_ids: Vec<FiberId> = creates.iter().map(|e| e.fiber_id).collect();
        let outcomes = effect_runner.run_creates(creates).await;

        for ((fiber_id, slot_idx), outcome) in fiber_ids.into_iter().zip(slots).zip(outcomes) {
            match outcome {
                EffectOutcome::Ok(cleanup) => {
                    if let Some(cleanup) = cleanup {
                        if let Some(fiber) = self.arena.get_mut(fiber_id) {
                            if let Some(slot) = fiber.memoized_state.get_mut(slot_idx) {
                                if let Some(effect) = slot.effect.as_mut() {
                                    effect.destroy = Some(cleanup);
                                }
                            }
                        }
                    }
                }
                EffectOutcome::Failed(err) => {
                    tracing::error!(%err, "mount/commit effect failed");
                }
            }
        }
    }
}

fn node_debug_name(node_type: &NodeType) -> String {
    match node_type {
        NodeType::Host(p) => format!("{p:?}"),
        NodeType::Composite(c) => c.name().to_string(),
        NodeType::Tag(t) => t.clone(),
    }
}

/// Keep `FiberFlags::REF` in sync with whether this fiber's current props
/// carry a `ref` key (§6.1 "`ref: string`" prop convention, §4.2 "Any fiber
/// with a ref attached publishes itself to the owning context on mount and
/// retracts on unmount"). The flag itself is just bookkeeping the
/// reconciler maintains on every create/clone; `pc-compiler` is the one
/// that reads it to actually publish to / retract from the ref table, since
/// that table is compiler-owned (§5 "Shared resources"), not the
/// reconciler's.
fn sync_ref_flag(arena: &mut FiberArena, fiber_id: FiberId) {
    let Some(fiber) = arena.get_mut(fiber_id) else { return };
    let has_ref = fiber.props.get("ref").and_then(|v| v.as_str()).is_some();
    if has_ref {
        fiber.flags.insert(FiberFlags::REF);
    } else {
        fiber.flags.remove(FiberFlags::REF);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pc_core::{Component, Props, RenderContext as Cx, RenderOutcome as Outcome};
    use pc_effects_local::SequentialEffectRunner;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Leaf;
    impl Component for Leaf {
        fn name(&self) -> &str {
            "Leaf"
        }
        fn render(&self, _props: &Props, _cx: &mut Cx<'_>) -> Outcome {
            Outcome::Children(Vec::new())
        }
    }

    struct Counter {
        renders: Arc<AtomicU32>,
    }
    impl Component for Counter {
        fn name(&self) -> &str {
            "Counter"
        }
        fn render(&self, _props: &Props, _cx: &mut Cx<'_>) -> Outcome {
            self.renders.fetch_add(1, Ordering::SeqCst);
            Outcome::Children(vec![Node::new(NodeType::Composite(Arc::new(Leaf)), Vec::new())])
        }
    }

    fn root_node(component: Arc<dyn Component>) -> Node {
        Node::new(NodeType::Composite(component), Vec::new())
    }

    #[tokio::test]
    async fn reconcile_builds_a_tree_and_runs_mount_effects() {
        let mut reconciler = Reconciler::new();
        let tick = TickState::new(0);
        let cache = DataCache::new();
        let runner = SequentialEffectRunner::new();
        let sink: RecompileSink = Arc::new(Mutex::new(Vec::new()));

        let renders = Arc::new(AtomicU32::new(0));
        let root = root_node(Arc::new(Counter { renders: renders.clone() }));

        let root_id = reconciler
            .reconcile(root, &tick, &cache, &runner, sink, &ReconcileOptions::default())
            .await
            .unwrap();

        assert_eq!(renders.load(Ordering::SeqCst), 1);
        let fiber = reconciler.arena().get(root_id).unwrap();
        assert!(!fiber.child.is_none());
    }

    struct ContextProviderComponent {
        inside: Arc<Mutex<Option<serde_json::Value>>>,
    }
    impl Component for ContextProviderComponent {
        fn name(&self) -> &str {
            "ContextProviderComponent"
        }
        fn boundary(&self) -> Option<pc_core::BoundaryKind> {
            Some(pc_core::BoundaryKind::ContextProvider {
                token: "t".to_string(),
                value: serde_json::json!("v"),
            })
        }
        fn render(&self, _props: &Props, _cx: &mut Cx<'_>) -> Outcome {
            Outcome::Children(vec![Node::new(
                NodeType::Composite(Arc::new(ContextReader { out: self.inside.clone() })),
                Vec::new(),
            )])
        }
    }

    struct ContextReader {
        out: Arc<Mutex<Option<serde_json::Value>>>,
    }
    impl Component for ContextReader {
        fn name(&self) -> &str {
            "ContextReader"
        }
        fn render(&self, _props: &Props, cx: &mut Cx<'_>) -> Outcome {
            *self.out.lock().unwrap() = cx.context("t").cloned();
            Outcome::Children(Vec::new())
        }
    }

    struct TwoSiblingsRoot {
        inside: Arc<Mutex<Option<serde_json::Value>>>,
        outside: Arc<Mutex<Option<serde_json::Value>>>,
    }
    impl Component for TwoSiblingsRoot {
        fn name(&self) -> &str {
            "TwoSiblingsRoot"
        }
        fn render(&self, _props: &Props, _cx: &mut Cx<'_>) -> Outcome {
            // The plain consumer is listed first (so it is pushed onto the
            // work stack first, and is only popped once the provider's
            // whole subtree — pushed second, on top — has fully drained):
            // this is the arrangement that would leak the provider's
            // context value if it were never popped.
            Outcome::Children(vec![
                Node::new(NodeType::Composite(Arc::new(ContextReader { out: self.outside.clone() })), Vec::new()),
                Node::new(
                    NodeType::Composite(Arc::new(ContextProviderComponent { inside: self.inside.clone() })),
                    Vec::new(),
                ),
            ])
        }
    }

    #[tokio::test]
    async fn context_provider_value_does_not_leak_outside_its_subtree() {
        let mut reconciler = Reconciler::new();
        let tick = TickState::new(0);
        let cache = DataCache::new();
        let runner = SequentialEffectRunner::new();
        let sink: RecompileSink = Arc::new(Mutex::new(Vec::new()));

        let inside = Arc::new(Mutex::new(None));
        let outside = Arc::new(Mutex::new(None));
        let root = root_node(Arc::new(TwoSiblingsRoot { inside: inside.clone(), outside: outside.clone() }));

        reconciler
            .reconcile(root, &tick, &cache, &runner, sink, &ReconcileOptions::default())
            .await
            .unwrap();

        assert_eq!(inside.lock().unwrap().clone(), Some(serde_json::json!("v")));
        assert_eq!(outside.lock().unwrap().clone(), None);
    }

    #[tokio::test]
    async fn reusing_same_type_and_key_allocates_a_fresh_wip_fiber_each_pass() {
        let mut reconciler = Reconciler::new();
        let tick = TickState::new(0);
        let cache = DataCache::new();
        let runner = SequentialEffectRunner::new();

        struct Stateful;
        impl Component for Stateful {
            fn name(&self) -> &str {
                "Stateful"
            }
            fn render(&self, _props: &Props, cx: &mut Cx<'_>) -> Outcome {
                let (value, set) = pc_hooks::use_state(cx, || 0u32).unwrap();
                if value == 0 {
                    set.set(5);
                }
                Outcome::Children(Vec::new())
            }
        }

        let root = root_node(Arc::new(Stateful));
        let sink1: RecompileSink = Arc::new(Mutex::new(Vec::new()));
        let root_id = reconciler
            .reconcile(root.clone(), &tick, &cache, &runner, sink1, &ReconcileOptions::default())
            .await
            .unwrap();

        let sink2: RecompileSink = Arc::new(Mutex::new(Vec::new()));
        reconciler
            .reconcile(root, &tick, &cache, &runner, sink2, &ReconcileOptions::default())
            .await
            .unwrap();

        let new_root = reconciler.current_root().unwrap();
        assert_ne!(new_root, root_id, "a fresh work-in-progress fiber is allocated each reconcile");
    }

    #[tokio::test]
    async fn suspended_composite_retries_until_data_cache_resolves() {
        let mut reconciler = Reconciler::new();
        let tick = TickState::new(0);
        let cache = Arc::new(DataCache::new());
        let runner = SequentialEffectRunner::new();
        let sink: RecompileSink = Arc::new(Mutex::new(Vec::new()));

        struct Greeter {
            cache: Arc<DataCache>,
        }
        impl Component for Greeter {
            fn name(&self) -> &str {
                "Greeter"
            }
            fn render(&self, _props: &Props, cx: &mut Cx<'_>) -> Outcome {
                match pc_hooks::use_data::<String>(cx, &self.cache, "greeting").unwrap() {
                    pc_core::DataState::Ready(_) => Outcome::Children(Vec::new()),
                    pc_core::DataState::Pending { key } => Outcome::Suspend(key),
                }
            }
        }

        let cache_for_fetch = cache.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            cache_for_fetch.set_ready("greeting", "hello".to_string());
        });

        let root = root_node(Arc::new(Greeter { cache: cache.clone() }));
        let root_id = reconciler
            .reconcile(root, &tick, &cache, &runner, sink, &ReconcileOptions::default())
            .await
            .unwrap();

        assert!(reconciler.arena().get(root_id).is_some());
    }
}
