//! Hibernation serialization (§6.5 "Serialization format").
//!
//! Turns the live, arena-indexed fiber tree into a plain, JSON-shaped
//! snapshot a host can persist between process restarts. Hook values
//! are `Box<dyn Any>` in memory and cannot be generically introspected,
//! so each hook is serialized as a type/status placeholder rather than
//! its real value — a host that needs true hydration of its own state
//! wires that up itself (e.g. a `use_data` key re-fetches, a `use_state`
//! init reads a host-provided snapshot when `RenderContext::is_hydrating`
//! is set) rather than the driver reconstructing opaque boxed state.

use pc_core::{Fiber, FiberId};
use pc_reconciler::FiberArena;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const MAX_STRING_LEN: usize = 50;
const MAX_COLLECTION_LEN: usize = 20;

/// One serialized hook slot (§6.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedHook {
    /// Position in the fiber's hook chain.
    pub index: usize,
    /// The hook's tag (`"state"`, `"effect"`, …).
    pub hook_type: String,
    /// Dependency key, for effect/memo/callback-tagged slots.
    pub deps: Option<Vec<String>>,
    /// Whether this effect still has a create pending this commit.
    pub status: Option<String>,
}

/// One serialized fiber, recursively holding its children (§6.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedFiberNode {
    /// The fiber's arena index at serialization time.
    pub id: u32,
    /// Debug name of the fiber's type (component name, tag, or primitive).
    pub type_name: String,
    /// The fiber's reconciliation key, if any.
    pub key: Option<String>,
    /// Sanitized props (§6.5 clipping/placeholder rules).
    pub props: Value,
    /// The fiber's hook chain.
    pub hooks: Vec<SerializedHook>,
    /// Child fibers, in sibling order.
    pub children: Vec<SerializedFiberNode>,
}

/// Coarse summary of the current committed tree, cheap to compute and
/// safe to log (§6.5 `getFiberSummary`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiberSummary {
    /// Number of fibers reachable from the root.
    pub fiber_count: usize,
    /// Longest root-to-leaf chain length.
    pub max_depth: u32,
    /// Debug name of the root fiber, if any.
    pub root_type: Option<String>,
}

fn children_of(arena: &FiberArena, fiber_id: FiberId) -> Vec<FiberId> {
    let mut out = Vec::new();
    let Some(fiber) = arena.get(fiber_id) else { return out };
    let mut cur = fiber.child;
    while !cur.is_none() {
        out.push(cur);
        cur = arena.get(cur).map(|f| f.sibling).unwrap_or(FiberId::NONE);
    }
    out
}

fn sanitize_value(value: &Value) -> Value {
    match value {
        Value::String(s) if s.chars().count() > MAX_STRING_LEN => {
            let clipped: String = s.chars().take(MAX_STRING_LEN).collect();
            Value::String(format!("{clipped}…"))
        }
        Value::Array(items) if items.len() > MAX_COLLECTION_LEN => {
            let mut placeholder = Map::new();
            placeholder.insert("_truncated".into(), Value::String("array".into()));
            placeholder.insert("length".into(), Value::from(items.len()));
            Value::Object(placeholder)
        }
        Value::Array(items) => Value::Array(items.iter().map(sanitize_value).collect()),
        Value::Object(map) if map.len() > MAX_COLLECTION_LEN => {
            let mut placeholder = Map::new();
            placeholder.insert("_truncated".into(), Value::String("object".into()));
            placeholder.insert("keys".into(), Value::from(map.len()));
            Value::Object(placeholder)
        }
        Value::Object(map) => {
            let mut sanitized = Map::new();
            for (k, v) in map {
                sanitized.insert(k.clone(), sanitize_value(v));
            }
            Value::Object(sanitized)
        }
        other => other.clone(),
    }
}

fn serialize_props(props: &pc_core::Props) -> Value {
    sanitize_value(&Value::Object(props.clone()))
}

fn serialize_hooks(fiber: &Fiber) -> Vec<SerializedHook> {
    fiber
        .memoized_state
        .iter()
        .enumerate()
        .map(|(index, slot)| SerializedHook {
            index,
            hook_type: slot.tag.to_string(),
            deps: slot.effect.as_ref().and_then(|e| e.deps.clone()),
            status: slot.effect.as_ref().map(|e| {
                if e.pending {
                    "pending".to_string()
                } else {
                    "idle".to_string()
                }
            }),
        })
        .collect()
}

/// Recursively serialize `fiber_id` and its subtree.
pub fn serialize_fiber(arena: &FiberArena, fiber_id: FiberId) -> Option<SerializedFiberNode> {
    let fiber = arena.get(fiber_id)?;
    Some(SerializedFiberNode {
        id: fiber_id.0,
        type_name: fiber.debug_name.clone(),
        key: fiber.key.clone(),
        props: serialize_props(&fiber.props),
        hooks: serialize_hooks(fiber),
        children: children_of(arena, fiber_id)
            .into_iter()
            .filter_map(|child| serialize_fiber(arena, child))
            .collect(),
    })
}

/// Compute a [`FiberSummary`] for the subtree rooted at `fiber_id`.
pub fn summarize(arena: &FiberArena, fiber_id: FiberId) -> FiberSummary {
    fn depth(arena: &FiberArena, fiber_id: FiberId) -> u32 {
        children_of(arena, fiber_id)
            .into_iter()
            .map(|child| depth(arena, child))
            .max()
            .unwrap_or(0)
            + 1
    }

    let order = arena.traverse_preorder(fiber_id);
    FiberSummary {
        fiber_count: order.len(),
        max_depth: depth(arena, fiber_id),
        root_type: arena.get(fiber_id).map(|f| f.debug_name.clone()),
    }
}
