//! # pc-core — node, fiber, and compiled-structure vocabulary
//!
//! This crate defines the shared data model for the declarative prompt
//! compiler: the input [`Node`] tree, the mutable [`Fiber`] work units
//! the reconciler builds from it, per-fiber [`hooks`] state, the
//! [`Component`] trait composites implement, and the [`CompiledStructure`]
//! output shape. It defines vocabulary, not algorithms — reconciliation
//! lives in `pc-reconciler`, hook constructors in `pc-hooks`, effect
//! execution in `pc-effects-core`/`pc-effects-local`, tree collection in
//! `pc-collector`, and token annotation in `pc-tokens`.
//!
//! ## Layering
//!
//! | Layer | Crate | What it does |
//! |-------|-------|---------------|
//! | Vocabulary | `pc-core` (this crate) | Node, Fiber, hook state, Component trait, CompiledStructure |
//! | Hook runtime | `pc-hooks` | `use_state`, `use_effect`, `use_context`, `use_data`, … |
//! | Reconciler | `pc-reconciler` | Fiber arena, tree diffing, commit |
//! | Effects | `pc-effects-core` / `pc-effects-local` | Phased effect queues and execution |
//! | Collector | `pc-collector` | Renderer boundaries, tree → `CompiledStructure` |
//! | Tokens | `pc-tokens` | Token-cost annotation |
//! | Driver | `pc-compiler` | Tick lifecycle, stability loop, public facade |
//!
//! This mirrors how a protocol crate in this workspace separates the
//! contract (traits, data types) from its implementations.

#![deny(missing_docs)]

pub mod compiled;
pub mod component;
pub mod content;
pub mod duration;
pub mod effect;
pub mod error;
pub mod fiber;
pub mod hooks;
pub mod id;
pub mod lifecycle;
pub mod node;
pub mod tick;

pub use compiled::{
    Audience, CompiledStructure, EphemeralItem, EphemeralPosition, Message, Role, Section,
    SystemItem, TimelineEntry, ToolRef, Visibility,
};
pub use component::{
    BoundaryKind, Component, Formatter, PolicyDescriptor, RenderContext, RenderOutcome,
    ToolMetadata,
};
pub use content::{ContentBlock, MediaSource, Semantic, SemanticNode, ToolResultContent};
pub use duration::DurationMs;
pub use effect::EffectPhase;
pub use error::{InvariantError, RenderError};
pub use fiber::{Fiber, FiberFlags};
pub use hooks::{
    Cleanup, DataState, Deps, EffectCreate, EffectRecord, HookCursor, HookState, HookTag, Update,
};
pub use id::{ExecutionId, FiberId, ToolName};
pub use lifecycle::{RecompileReason, RecoveryAction};
pub use node::{HostPrimitive, Node, NodeKey, NodeType, Props};
pub use tick::TickState;
