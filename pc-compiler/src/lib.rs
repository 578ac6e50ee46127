#![deny(missing_docs)]
//! # pc-compiler — Compile Driver (C9) and public facade
//!
//! [`Compiler`] composes the reconciler, the hook-data cache, and an
//! effect runner into the `compile`/`compile_until_stable` orchestration
//! (§4.9), plus the lifecycle notification surface a host drives
//! around a tick, hydration bookkeeping, and hibernation serialization
//! (§6.3, §6.5). It is the single entry point a host application
//! depends on; the other crates are its implementation.

#[cfg(feature = "core")]
mod error;
#[cfg(feature = "core")]
mod options;
#[cfg(feature = "core")]
mod serialize;

#[cfg(feature = "core")]
pub use error::CompileError;
#[cfg(feature = "core")]
pub use options::CompilerOptions;
#[cfg(feature = "core")]
pub use serialize::{FiberSummary, SerializedFiberNode, SerializedHook};

#[cfg(feature = "core")]
pub use pc_core::{EffectPhase, Node, RecompileReason, RecoveryAction, TickState};
#[cfg(feature = "core")]
pub use pc_core::CompiledStructure;
#[cfg(feature = "core")]
pub use pc_collector::CollectError;
#[cfg(feature = "core")]
pub use pc_reconciler::{ReconcileError, ReconcileOptions};
#[cfg(feature = "core")]
pub use pc_tokens::{DefaultEstimator, TokenEstimator, MESSAGE_OVERHEAD, IMAGE_OVERHEAD};

#[cfg(feature = "core")]
use pc_core::{FiberFlags, FiberId, NodeType, ToolName};
#[cfg(feature = "core")]
use pc_effects_core::{EffectOutcome, EffectRunner, PendingDestroy, PendingEffect};
#[cfg(feature = "core")]
use pc_hooks::DataCache;
#[cfg(feature = "core")]
use pc_reconciler::{RecompileSink, Reconciler};
#[cfg(feature = "core")]
use std::collections::HashMap;
#[cfg(feature = "core")]
use std::sync::{Arc, Mutex};

/// The outcome of one `compile`/`compile_until_stable` run (§4.9, §6.3).
#[cfg(feature = "core")]
#[derive(Debug)]
pub struct CompileResult {
    /// The compiled output from the last iteration.
    pub compiled: CompiledStructure,
    /// How many reconcile/collect iterations ran.
    pub iterations: u32,
    /// Whether `max_iterations` was hit before the recompile flag cleared.
    pub forced_stable: bool,
    /// Every recompile request raised, tagged with its iteration.
    pub reasons: Vec<RecompileReason>,
}

/// Owns one execution's reconciler, data cache, and effect runner, and
/// drives the compile loop and lifecycle notifications around them
/// (§4.9, §5 "Per-execution isolation").
#[cfg(feature = "core")]
pub struct Compiler {
    reconciler: Reconciler,
    data_cache: Arc<DataCache>,
    effect_runner: Box<dyn EffectRunner>,
    options: CompilerOptions,
    hydration_snapshot: Option<SerializedFiberNode>,
    is_hydrating: bool,
    ref_table: HashMap<String, FiberId>,
    tool_registry: HashMap<ToolName, FiberId>,
}

#[cfg(feature = "effects-local")]
impl Default for Compiler {
    fn default() -> Self {
        Self::new(CompilerOptions::default())
    }
}

#[cfg(feature = "core")]
impl Compiler {
    /// Construct a compiler with the given options and the default
    /// in-process sequential effect runner.
    #[cfg(feature = "effects-local")]
    pub fn new(options: CompilerOptions) -> Self {
        Self::with_effect_runner(options, pc_effects_local::SequentialEffectRunner::new())
    }

    /// Construct a compiler with the given options and a caller-supplied
    /// effect runner (§5 "Shared resources", the execution owns its own
    /// effect queue; a host embedding this in a durable-workflow system
    /// can swap the runner without touching the rest of the driver).
    pub fn with_effect_runner(options: CompilerOptions, effect_runner: impl EffectRunner + 'static) -> Self {
        Self {
            reconciler: Reconciler::new(),
            data_cache: Arc::new(DataCache::new()),
            effect_runner: Box::new(effect_runner),
            options,
            hydration_snapshot: None,
            is_hydrating: false,
            ref_table: HashMap::new(),
            tool_registry: HashMap::new(),
        }
    }

    /// The current ref table: fibers whose props carry a `ref` key,
    /// keyed by that ref name (§4.2 "publishes itself to the owning
    /// context on mount", §6.1 "`ref: string`"). Compiler-owned, rebuilt
    /// from the committed tree after every reconcile (§5 "Shared
    /// resources").
    pub fn ref_table(&self) -> &HashMap<String, FiberId> {
        &self.ref_table
    }

    /// The current tool registry: composites whose [`pc_core::Component::tool_metadata`]
    /// returns `Some`, keyed by tool name (§4.4 "flagged as a tool", §5
    /// "tool registry updates from commit"). Compiler-owned, rebuilt
    /// from the committed tree after every reconcile.
    pub fn tool_registry(&self) -> &HashMap<ToolName, FiberId> {
        &self.tool_registry
    }

    /// Recompute the ref table and tool registry from the currently
    /// committed tree (§4.2, §4.4, §5, §8 invariant 5). Called after
    /// every reconcile so a fiber's ref/tool membership tracks mount
    /// and unmount rather than accumulating stale entries.
    fn sync_registries(&mut self) {
        let mut new_refs = HashMap::new();
        let mut new_tools = HashMap::new();

        if let Some(root) = self.reconciler.current_root() {
            let arena = self.reconciler.arena();
            for fiber_id in arena.traverse_preorder(root) {
                let Some(fiber) = arena.get(fiber_id) else { continue };

                if fiber.flags.contains(FiberFlags::REF) {
                    if let Some(name) = fiber.props.get("ref").and_then(|v| v.as_str()) {
                        new_refs.insert(name.to_owned(), fiber_id);
                    }
                }

                if let NodeType::Composite(component) = &fiber.node_type {
                    if let Some(metadata) = component.tool_metadata() {
                        new_tools.insert(ToolName::new(metadata.name), fiber_id);
                    }
                }
            }
        }

        for name in new_refs.keys() {
            if !self.ref_table.contains_key(name) {
                tracing::debug!(%name, "ref published");
            }
        }
        for name in self.ref_table.keys() {
            if !new_refs.contains_key(name) {
                tracing::debug!(%name, "ref retracted");
            }
        }
        for name in new_tools.keys() {
            if !self.tool_registry.contains_key(name) {
                tracing::debug!(%name, "tool registered");
            }
        }
        for name in self.tool_registry.keys() {
            if !new_tools.contains_key(name) {
                tracing::debug!(%name, "tool unregistered");
            }
        }

        self.ref_table = new_refs;
        self.tool_registry = new_tools;
    }

    /// Read-only access to the committed fiber arena, for diagnostics
    /// or a host that wants to inspect the tree directly.
    pub fn arena(&self) -> &pc_reconciler::FiberArena {
        self.reconciler.arena()
    }

    /// The currently committed root fiber, if any compile has run.
    pub fn current_root(&self) -> Option<FiberId> {
        self.reconciler.current_root()
    }

    /// A handle a host can use to enqueue a state update for a
    /// fiber/slot outside of any render (§6.3).
    pub fn dispatch_queue(&self) -> pc_reconciler::DispatchQueue {
        self.reconciler.dispatch_queue()
    }

    fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            max_suspend_retries: self.options.max_suspend_retries,
            render_count_warn_threshold: self.options.render_count_warn_threshold,
        }
    }

    /// `compile(element, tickState)` (§4.9): one reconcile, `AfterRender`
    /// effects, then collect and annotate. Does not run `AfterCompile`
    /// or loop — call [`Compiler::notify_after_compile`] and re-invoke
    /// if the host wants the full stability loop without
    /// `compile_until_stable`'s bookkeeping.
    pub async fn compile(&mut self, element: &Node, tick: &TickState) -> Result<CompiledStructure, CompileError> {
        let sink: RecompileSink = Arc::new(Mutex::new(Vec::new()));
        let root = if self.is_hydrating {
            self.reconciler
                .reconcile_hydrating(
                    element.clone(),
                    tick,
                    &self.data_cache,
                    self.effect_runner.as_ref(),
                    sink,
                    &self.reconcile_options(),
                )
                .await?
        } else {
            self.reconciler
                .reconcile(
                    element.clone(),
                    tick,
                    &self.data_cache,
                    self.effect_runner.as_ref(),
                    sink,
                    &self.reconcile_options(),
                )
                .await?
        };
        self.run_phase_effects(EffectPhase::AfterRender).await;
        self.sync_registries();
        self.collect_and_annotate(root)
    }

    fn collect_and_annotate(&self, root: FiberId) -> Result<CompiledStructure, CompileError> {
        let collector = pc_collector::Collector::new(self.reconciler.arena());
        let mut compiled = collector.collect(root)?;
        pc_tokens::annotate(&mut compiled, self.options.token_estimator.as_deref());
        Ok(compiled)
    }

    /// `compileUntilStable(element, tickState, {maxIterations})` (§4.9,
    /// S7): repeats reconcile → `AfterRender` → collect → annotate →
    /// `AfterCompile` until no recompile was requested, or until
    /// `max_iterations` is hit, in which case the loop stops and
    /// `forced_stable` is set (§7 "Recompile loop").
    pub async fn compile_until_stable(
        &mut self,
        element: &Node,
        tick: &TickState,
    ) -> Result<CompileResult, CompileError> {
        tracing::info!(max_iterations = self.options.max_iterations, "compile_until_stable start");

        let mut iteration = 0u32;
        let mut reasons = Vec::new();
        let mut compiled;

        loop {
            let sink: RecompileSink = Arc::new(Mutex::new(Vec::new()));
            let root = if self.is_hydrating {
                self.reconciler
                    .reconcile_hydrating(
                        element.clone(),
                        tick,
                        &self.data_cache,
                        self.effect_runner.as_ref(),
                        sink.clone(),
                        &self.reconcile_options(),
                    )
                    .await?
            } else {
                self.reconciler
                    .reconcile(
                        element.clone(),
                        tick,
                        &self.data_cache,
                        self.effect_runner.as_ref(),
                        sink.clone(),
                        &self.reconcile_options(),
                    )
                    .await?
            };
            self.run_phase_effects(EffectPhase::AfterRender).await;
            self.sync_registries();
            compiled = self.collect_and_annotate(root)?;
            self.run_phase_effects(EffectPhase::AfterCompile).await;

            let requested: Vec<String> = std::mem::take(&mut *sink.lock().expect("recompile sink poisoned"));
            let recompile_requested = !requested.is_empty();
            reasons.extend(requested.into_iter().map(|r| RecompileReason::new(iteration, r)));
            iteration += 1;

            if !recompile_requested {
                tracing::info!(iterations = iteration, "compile_until_stable converged");
                return Ok(CompileResult { compiled, iterations: iteration, forced_stable: false, reasons });
            }
            if iteration >= self.options.max_iterations {
                tracing::warn!(
                    iterations = iteration,
                    reasons = ?reasons.iter().map(RecompileReason::formatted).collect::<Vec<_>>(),
                    "compile_until_stable forced stable at max_iterations"
                );
                return Ok(CompileResult { compiled, iterations: iteration, forced_stable: true, reasons });
            }
        }
    }

    /// Run every pending hook-registered effect tagged with `phase`,
    /// in fiber-tree preorder (§4.9, "run AfterRender/AfterCompile
    /// effects"). Mirrors `pc-reconciler`'s own Mount/Commit handling,
    /// since `EffectPhase::runs_during_commit` is false for every phase
    /// the driver (rather than the reconciler) is responsible for.
    async fn run_phase_effects(&mut self, phase: EffectPhase) {
        let Some(root) = self.reconciler.current_root() else { return };
        let order = self.reconciler.arena().traverse_preorder(root);

        let mut batch: Vec<(PendingEffect, usize)> = Vec::new();
        {
            let arena = self.reconciler.arena_mut();
            for (i, fiber_id) in order.iter().copied().enumerate() {
                let Some(fiber) = arena.get_mut(fiber_id) else { continue };
                let debug_name = fiber.debug_name.clone();
                for (slot_idx, slot) in fiber.memoized_state.iter_mut().enumerate() {
                    let Some(effect) = slot.effect.as_mut() else { continue };
                    if effect.phase != phase || !effect.pending {
                        continue;
                    }
                    let future = (effect.create)();
                    batch.push((
                        PendingEffect { fiber_id, debug_name: debug_name.clone(), phase, preorder: i as u64, future },
                        slot_idx,
                    ));
                    effect.pending = false;
                }
            }
        }
        if batch.is_empty() {
            return;
        }

        batch.sort_by_key(|(e, _)| e.preorder);
        let (creates, slots): (Vec<PendingEffect>, Vec<usize>) = batch.into_iter().unzip();
        let fiber_ids: Vec<FiberId> = creates.iter().map(|e| e.fiber_id).collect();
        let outcomes = self.effect_runner.run_creates(creates).await;

        for ((fiber_id, slot_idx), outcome) in fiber_ids.into_iter().zip(slots).zip(outcomes) {
            match outcome {
                EffectOutcome::Ok(Some(cleanup)) => {
                    if let Some(fiber) = self.reconciler.arena_mut().get_mut(fiber_id) {
                        if let Some(slot) = fiber.memoized_state.get_mut(slot_idx) {
                            if let Some(effect) = slot.effect.as_mut() {
                                effect.destroy = Some(cleanup);
                            }
                        }
                    }
                }
                EffectOutcome::Ok(None) => {}
                EffectOutcome::Failed(err) => {
                    tracing::error!(%err, ?phase, "driver-phase effect failed");
                }
            }
        }
    }

    /// Notify that a new execution is beginning (§6.3 `notifyStart`).
    /// Not tied to any effect phase — purely a log point a host can
    /// hook a span around.
    pub fn notify_start(&self) {
        tracing::info!("compiler execution started");
    }

    /// Notify the start of a tick; runs pending `TickStart` effects (§6.3).
    pub async fn notify_tick_start(&mut self, tick: &TickState) {
        tracing::debug!(tick = tick.tick_number, "tick start");
        self.run_phase_effects(EffectPhase::TickStart).await;
    }

    /// Notify the end of a tick; runs pending `TickEnd` effects (§6.3).
    pub async fn notify_tick_end(&mut self, tick: &TickState) {
        tracing::debug!(tick = tick.tick_number, "tick end");
        self.run_phase_effects(EffectPhase::TickEnd).await;
    }

    /// Run pending `AfterCompile` effects directly, for a host driving
    /// `compile()` (which does not run this phase itself) instead of
    /// `compile_until_stable()`.
    pub async fn notify_after_compile(&mut self, _compiled: &CompiledStructure) {
        self.run_phase_effects(EffectPhase::AfterCompile).await;
    }

    /// Notify that the overall execution has concluded; runs pending
    /// `Complete` effects (§6.3).
    pub async fn notify_complete(&mut self) {
        tracing::info!("compiler execution complete");
        self.run_phase_effects(EffectPhase::Complete).await;
    }

    /// Deliver an external message mid-execution; runs pending
    /// `OnMessage` effects (§6.3).
    pub async fn notify_on_message(&mut self, _message: serde_json::Value) {
        self.run_phase_effects(EffectPhase::OnMessage).await;
    }

    /// Notify a render error. No `onError` handler registry is
    /// implemented in this driver (composites do not register
    /// class-style lifecycle handlers here), so this always propagates
    /// by returning `None` rather than offering a recovery action.
    pub fn notify_error(&self, error: &CompileError) -> Option<RecoveryAction> {
        tracing::error!(%error, "compiler render error");
        None
    }

    /// Tear down the current tree: runs every pending `Unmount` effect
    /// and flushes outstanding cleanups, in reverse fiber-tree preorder
    /// (§4.5 "Unmount", §8 invariant 9), then resets the compiler to a
    /// fresh, rootless state.
    pub async fn unmount(&mut self) {
        let Some(root) = self.reconciler.current_root() else { return };
        let mut order = self.reconciler.arena().traverse_preorder(root);
        order.reverse();

        let mut destroys = Vec::new();
        let mut unmount_creates = Vec::new();
        {
            let arena = self.reconciler.arena_mut();
            for (i, fiber_id) in order.into_iter().enumerate() {
                let Some(fiber) = arena.get_mut(fiber_id) else { continue };
                let debug_name = fiber.debug_name.clone();
                for slot in fiber.memoized_state.iter_mut() {
                    let tag = slot.tag;
                    let Some(effect) = slot.effect.as_mut() else { continue };
                    if let Some(destroy) = effect.destroy.take() {
                        destroys.push(PendingDestroy { fiber_id, debug_name: debug_name.clone(), preorder: i as u64, cleanup: destroy });
                    }
                    if tag == pc_core::HookTag::Unmount {
                        let future = (effect.create)();
                        unmount_creates.push(PendingEffect {
                            fiber_id,
                            debug_name: debug_name.clone(),
                            phase: EffectPhase::Unmount,
                            preorder: i as u64,
                            future,
                        });
                    }
                }
            }
        }

        self.effect_runner.run_destroys(pc_effects_core::order_destroys(destroys)).await;
        let outcomes = self.effect_runner.run_creates(pc_effects_core::order_creates(unmount_creates)).await;
        for outcome in outcomes {
            if let EffectOutcome::Failed(err) = outcome {
                tracing::error!(%err, "unmount effect failed");
            }
        }

        self.reconciler = Reconciler::new();
        self.ref_table.clear();
        self.tool_registry.clear();
    }

    /// Load a hibernated snapshot to restore from on the next
    /// `compile`/`compile_until_stable` call (§6.3 `setHydrationData`).
    pub fn set_hydration_data(&mut self, snapshot: Option<SerializedFiberNode>) {
        self.is_hydrating = snapshot.is_some();
        self.hydration_snapshot = snapshot;
    }

    /// Mark hydration complete; subsequent renders no longer report
    /// `is_hydrating` (§6.3 `completeHydration`).
    pub fn complete_hydration(&mut self) {
        self.is_hydrating = false;
    }

    /// Whether the compiler is currently restoring from a hydration
    /// snapshot (§6.3 `isHydratingNow`).
    pub fn is_hydrating_now(&self) -> bool {
        self.is_hydrating
    }

    /// The snapshot passed to `set_hydration_data`, if one is active.
    pub fn hydration_snapshot(&self) -> Option<&SerializedFiberNode> {
        self.hydration_snapshot.as_ref()
    }

    /// Serialize the currently committed tree for hibernation (§6.5
    /// `serializeFiberTree`). `None` if no compile has run yet.
    pub fn serialize_fiber_tree(&self) -> Option<SerializedFiberNode> {
        let root = self.reconciler.current_root()?;
        serialize::serialize_fiber(self.reconciler.arena(), root)
    }

    /// A coarse summary of the current committed tree (§6.5 `getFiberSummary`).
    pub fn get_fiber_summary(&self) -> FiberSummary {
        match self.reconciler.current_root() {
            Some(root) => serialize::summarize(self.reconciler.arena(), root),
            None => FiberSummary { fiber_count: 0, max_depth: 0, root_type: None },
        }
    }
}

#[cfg(all(test, feature = "effects-local"))]
mod tests {
    use super::*;
    use pc_core::{Component, Node, NodeType, Props, RenderContext, RenderOutcome};
    use std::sync::Arc;

    struct StaticText(String);

    impl Component for StaticText {
        fn name(&self) -> &str {
            "static_text"
        }

        fn render(&self, _props: &Props, _cx: &mut RenderContext<'_>) -> RenderOutcome {
            RenderOutcome::Children(vec![Node::text(self.0.clone())])
        }
    }

    fn root_with_text(text: &str) -> Node {
        Node::new(NodeType::Composite(Arc::new(StaticText(text.to_owned()))), Vec::new())
    }

    #[tokio::test]
    async fn compile_produces_a_loose_text_item() {
        let mut compiler = Compiler::new(CompilerOptions::default());
        let tick = TickState::new(0);
        let element = root_with_text("hello");

        let compiled = compiler.compile(&element, &tick).await.unwrap();

        assert_eq!(compiled.system_message_items.len(), 1);
    }

    #[tokio::test]
    async fn compile_until_stable_converges_in_one_iteration_with_no_recompile_requests() {
        let mut compiler = Compiler::new(CompilerOptions::default());
        let tick = TickState::new(0);
        let element = root_with_text("hello");

        let result = compiler.compile_until_stable(&element, &tick).await.unwrap();

        assert_eq!(result.iterations, 1);
        assert!(!result.forced_stable);
        assert!(result.reasons.is_empty());
    }

    #[tokio::test]
    async fn token_annotation_runs_when_an_estimator_is_configured() {
        let options = CompilerOptions::default().with_token_estimator(pc_tokens::DefaultEstimator);
        let mut compiler = Compiler::new(options);
        let tick = TickState::new(0);
        let element = root_with_text("hello world");

        let compiled = compiler.compile(&element, &tick).await.unwrap();

        assert!(compiled.total_tokens.is_some());
    }

    #[tokio::test]
    async fn fiber_summary_reports_empty_tree_before_any_compile() {
        let compiler = Compiler::new(CompilerOptions::default());
        let summary = compiler.get_fiber_summary();
        assert_eq!(summary.fiber_count, 0);
        assert!(compiler.serialize_fiber_tree().is_none());
    }

    #[tokio::test]
    async fn serialize_fiber_tree_round_trips_through_json() {
        let mut compiler = Compiler::new(CompilerOptions::default());
        let tick = TickState::new(0);
        let element = root_with_text("hello");
        compiler.compile(&element, &tick).await.unwrap();

        let snapshot = compiler.serialize_fiber_tree().unwrap();
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: SerializedFiberNode = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.type_name, snapshot.type_name);
    }

    #[tokio::test]
    async fn unmount_clears_the_committed_root() {
        let mut compiler = Compiler::new(CompilerOptions::default());
        let tick = TickState::new(0);
        let element = root_with_text("hello");
        compiler.compile(&element, &tick).await.unwrap();
        assert!(compiler.current_root().is_some());

        compiler.unmount().await;

        assert!(compiler.current_root().is_none());
    }

    struct RefLeaf;

    impl Component for RefLeaf {
        fn name(&self) -> &str {
            "ref_leaf"
        }

        fn render(&self, _props: &Props, _cx: &mut RenderContext<'_>) -> RenderOutcome {
            RenderOutcome::Children(Vec::new())
        }
    }

    fn ref_node(name: &str) -> Node {
        let mut props = Props::new();
        props.insert("ref".into(), serde_json::Value::String(name.to_owned()));
        Node::new(NodeType::Composite(Arc::new(RefLeaf)), Vec::new()).with_props(props)
    }

    struct ToolLeaf;

    impl Component for ToolLeaf {
        fn name(&self) -> &str {
            "tool_leaf"
        }

        fn render(&self, _props: &Props, _cx: &mut RenderContext<'_>) -> RenderOutcome {
            RenderOutcome::Children(Vec::new())
        }

        fn tool_metadata(&self) -> Option<pc_core::ToolMetadata> {
            Some(pc_core::ToolMetadata {
                name: "search".to_owned(),
                description: "look things up".to_owned(),
                input_schema: serde_json::json!({"type": "object"}),
            })
        }
    }

    struct RefAndToolRoot;

    impl Component for RefAndToolRoot {
        fn name(&self) -> &str {
            "ref_and_tool_root"
        }

        fn render(&self, _props: &Props, _cx: &mut RenderContext<'_>) -> RenderOutcome {
            RenderOutcome::Children(vec![
                ref_node("input_box"),
                Node::new(NodeType::Composite(Arc::new(ToolLeaf)), Vec::new()),
            ])
        }
    }

    #[tokio::test]
    async fn compile_populates_ref_table_and_tool_registry() {
        let mut compiler = Compiler::new(CompilerOptions::default());
        let tick = TickState::new(0);
        let element = Node::new(NodeType::Composite(Arc::new(RefAndToolRoot)), Vec::new());

        compiler.compile(&element, &tick).await.unwrap();

        assert!(compiler.ref_table().contains_key("input_box"));
        assert!(compiler.tool_registry().contains_key(&pc_core::ToolName::new("search")));
    }

    struct RequestsRecompileTwice {
        calls: Arc<std::sync::atomic::AtomicU32>,
    }

    impl Component for RequestsRecompileTwice {
        fn name(&self) -> &str {
            "requests_recompile_twice"
        }

        fn render(&self, _props: &Props, cx: &mut RenderContext<'_>) -> RenderOutcome {
            let call_index = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let schedule_work = cx.schedule_work.clone();
            pc_hooks::use_after_compile(
                cx,
                Box::new(move || {
                    let schedule_work = schedule_work.clone();
                    Box::pin(async move {
                        if call_index < 2 {
                            schedule_work("needs X".to_string());
                        }
                        Ok(None)
                    })
                }),
            )
            .unwrap();
            RenderOutcome::Children(Vec::new())
        }
    }

    #[tokio::test]
    async fn compile_until_stable_runs_a_real_recompile_loop() {
        let mut compiler = Compiler::new(CompilerOptions::default());
        let tick = TickState::new(0);
        let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let element = Node::new(NodeType::Composite(Arc::new(RequestsRecompileTwice { calls })), Vec::new());

        let result = compiler.compile_until_stable(&element, &tick).await.unwrap();

        assert_eq!(result.iterations, 3);
        assert!(!result.forced_stable);
        assert_eq!(
            result.reasons.iter().map(RecompileReason::formatted).collect::<Vec<_>>(),
            vec!["[iteration 0] needs X".to_owned(), "[iteration 1] needs X".to_owned()],
        );
    }

    struct SuspendingSection {
        cache: Arc<pc_hooks::DataCache>,
    }

    impl Component for SuspendingSection {
        fn name(&self) -> &str {
            "suspending_section"
        }

        fn render(&self, _props: &Props, cx: &mut RenderContext<'_>) -> RenderOutcome {
            match pc_hooks::use_data::<u32>(cx, &self.cache, "answer").unwrap() {
                pc_core::DataState::Ready(value) => {
                    let mut props = Props::new();
                    props.insert("id".into(), serde_json::Value::String("s".to_owned()));
                    RenderOutcome::Children(vec![Node::host(
                        pc_core::HostPrimitive::Section,
                        props,
                        vec![Node::text(value.to_string())],
                    )])
                }
                pc_core::DataState::Pending { key } => RenderOutcome::Suspend(key),
            }
        }
    }

    #[tokio::test]
    async fn compile_resolves_a_suspended_section_and_collects_its_content() {
        let mut compiler = Compiler::new(CompilerOptions::default());
        let tick = TickState::new(0);
        // Borrows the compiler's own data cache (the same instance
        // `compile()` passes to `reconcile`) so the spawned fetch below
        // resolves the exact entry the suspending render is awaiting,
        // instead of a cache the retry loop never looks at.
        let cache = compiler.data_cache.clone();

        let cache_for_fetch = cache.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            cache_for_fetch.set_ready("answer", 42u32);
        });

        let element = Node::new(NodeType::Composite(Arc::new(SuspendingSection { cache })), Vec::new());
        let compiled = compiler.compile(&element, &tick).await.unwrap();

        let section = compiled.sections.get("s").expect("section \"s\" collected");
        assert_eq!(
            section.content,
            vec![pc_core::ContentBlock::Text { text: "42".to_owned(), semantic: None, semantic_node: None }],
        );
    }

    #[tokio::test]
    async fn unmount_clears_ref_table_and_tool_registry() {
        let mut compiler = Compiler::new(CompilerOptions::default());
        let tick = TickState::new(0);
        let element = Node::new(NodeType::Composite(Arc::new(RefAndToolRoot)), Vec::new());
        compiler.compile(&element, &tick).await.unwrap();
        assert!(!compiler.ref_table().is_empty());
        assert!(!compiler.tool_registry().is_empty());

        compiler.unmount().await;

        assert!(compiler.ref_table().is_empty());
        assert!(compiler.tool_registry().is_empty());
    }
}
