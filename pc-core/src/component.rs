//! The composite-component seam (§4.1, §4.3, §9 "Component-as-function
//! vs. tree-as-data").
//!
//! A composite is a `Component` trait object rather than a bare
//! closure: Rust closures are not nameable/comparable the way a
//! function identity is in languages with closures-as-values, so this
//! implementation follows the design note directly — composites are
//! `(name, trait object)` pairs, and reconciliation identity for reuse
//! is `Component::name()` equality, not pointer equality.

use crate::content::ContentBlock;
use crate::error::RenderError;
use crate::hooks::{HookCursor, Update};
use crate::id::FiberId;
use crate::node::{Node, Props};
use std::sync::Arc;

/// Static metadata a composite may expose when it doubles as a tool
/// declaration (§4.4, "flagged as a tool").
#[derive(Debug, Clone)]
pub struct ToolMetadata {
    /// The tool's registered name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema describing the tool's input.
    pub input_schema: serde_json::Value,
}

/// A renderer for a content-block list, used by formatter boundaries
/// and the collector's default-formatter fallback (§4.6).
pub trait Formatter: Send + Sync {
    /// Render a flat content-block list to its final textual form.
    fn format(&self, blocks: &[ContentBlock]) -> String;
}

/// An entry-processing policy descriptor (§4.6, "policy boundary").
#[derive(Debug, Clone)]
pub struct PolicyDescriptor {
    /// The policy's name.
    pub name: String,
    /// The processing step identifier this policy applies.
    pub process: String,
    /// Arbitrary policy configuration.
    pub config: serde_json::Value,
}

/// What kind of renderer boundary or context provider a composite's
/// type represents (§4.3 "Context provider", §4.6).
///
/// Boundary detection happens by asking the composite instance for
/// this, rather than by structural sniffing (§9, "Boundary
/// detection") — cheap and unambiguous for a statically-typed
/// component, where a tagged variant on a JS `type` value would be a
/// tagged enum discriminant here too.
#[non_exhaustive]
pub enum BoundaryKind {
    /// Pushes `(token → value)` onto the context stack for its children.
    ContextProvider {
        /// The context token this provider supplies a value for.
        token: String,
        /// The value to publish.
        value: serde_json::Value,
    },
    /// Establishes the current formatter for its subtree.
    Formatter(Arc<dyn Formatter>),
    /// Registers one or more policies for its subtree.
    Policy(Vec<PolicyDescriptor>),
}

/// What a composite's render pass produced.
pub enum RenderOutcome {
    /// Rendered successfully; these are the new children to reconcile.
    Children(Vec<Node>),
    /// A data hook has no cached value yet; suspend and retry once the
    /// given cache key resolves (§4.3 "Data fetch", §9 "Async-as-suspension").
    Suspend(String),
    /// The composite's own logic failed (§7 "Render error").
    Err(RenderError),
}

/// The per-render handle a composite uses to call hooks and read
/// ambient execution state (§4.3 "Render context").
///
/// Scoped to one render attempt of one fiber; constructed fresh by
/// `pc-reconciler` for each begin-work call (including suspension
/// retries), never stored past the `render` call that receives it.
pub struct RenderContext<'a> {
    /// The fiber currently rendering.
    pub fiber_id: FiberId,
    /// Cursor into this fiber's hook-state chain.
    pub cursor: HookCursor<'a>,
    /// The context stack accumulated by ancestor providers, innermost last.
    pub context_stack: &'a [(String, serde_json::Value)],
    /// Current tick number, for data hooks that key on it.
    pub tick_number: u64,
    /// Whether the ambient tick has been externally cancelled.
    pub tick_cancelled: bool,
    /// Callback a hook can invoke to request scheduling outside of a
    /// render (e.g. a signal set from an async effect). Reason string
    /// flows into `RecompileReason`.
    pub schedule_work: Arc<dyn Fn(String) + Send + Sync>,
    /// Enqueues a pending [`Update`] for a given fiber/slot pair, for
    /// state setters and reducer dispatchers that escape the render
    /// that created them (§4.3 "Local state", "pending array, with
    /// atomic append"). The reconciler drains these into the target
    /// slot's `queue` before re-rendering that fiber.
    pub dispatch: Arc<dyn Fn(FiberId, usize, Update) + Send + Sync>,
    /// Whether this render is happening during hydration (cross-tick
    /// restore) rather than a fresh mount.
    pub is_hydrating: bool,
}

impl<'a> RenderContext<'a> {
    /// Look up the nearest ancestor value for `token`, if any provider
    /// published one (§4.3 "Context").
    pub fn context(&self, token: &str) -> Option<&serde_json::Value> {
        self.context_stack
            .iter()
            .rev()
            .find(|(t, _)| t == token)
            .map(|(_, v)| v)
    }
}

/// A user-defined composite component (§3 "Node", §9).
pub trait Component: Send + Sync {
    /// Stable name used both for reconciliation identity and diagnostics.
    fn name(&self) -> &str;

    /// Render this composite for one pass.
    fn render(&self, props: &Props, cx: &mut RenderContext<'_>) -> RenderOutcome;

    /// Tool metadata, if this composite doubles as a tool declaration.
    fn tool_metadata(&self) -> Option<ToolMetadata> {
        None
    }

    /// Boundary/provider behavior this composite's type carries, if any.
    fn boundary(&self) -> Option<BoundaryKind> {
        None
    }
}
