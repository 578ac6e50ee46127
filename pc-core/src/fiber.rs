//! The Fiber — the mutable work unit the reconciler builds over a
//! [`crate::node::Node`] tree (§3 "Fiber", §4.2).
//!
//! `FiberArena`'s operations (`create_fiber`, `clone_for_update`,
//! `traverse`) live in `pc-reconciler`, which owns the double-buffered
//! storage; this module defines only the `Fiber` record itself and its
//! flag bitset, since both `pc-hooks` and `pc-collector` need to read
//! fiber fields without depending on the reconciler's arena machinery.

use crate::hooks::HookState;
use crate::id::FiberId;
use crate::node::{NodeKey, NodeType, Props};
use std::any::Any;

/// A bitset of pending work on a fiber (§3 "Fiber", `flags`).
///
/// Hand-rolled rather than pulled from the `bitflags` crate: the set
/// is small and fixed, and every operation needed (`contains`, `set`,
/// `union`) is a one-liner over a `u8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FiberFlags(u8);

impl FiberFlags {
    /// No pending work.
    pub const NONE: Self = Self(0);
    /// This fiber is newly inserted into the tree.
    pub const PLACEMENT: Self = Self(1 << 0);
    /// This fiber was reused but its props or state changed.
    pub const UPDATE: Self = Self(1 << 1);
    /// This fiber itself is being removed.
    pub const DELETION: Self = Self(1 << 2);
    /// A child of this fiber was removed (deletions list is non-empty).
    pub const CHILD_DELETION: Self = Self(1 << 3);
    /// This fiber has at least one pending effect to run on commit.
    pub const HAS_EFFECT: Self = Self(1 << 4);
    /// This fiber carries a ref that must be published/retracted.
    pub const REF: Self = Self(1 << 5);

    /// Whether `self` contains every bit in `other`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union two flag sets.
    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Set the given bits.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clear the given bits.
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Whether no bits are set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for FiberFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// The mutable work unit for one node instance (§3 "Fiber").
///
/// A fiber is always owned by exactly one of the arena's two buffers;
/// `alternate` names the fiber's twin in the other buffer, by arena
/// index, not by pointer — there are no `Rc`/`Arc` cycles in the
/// fiber graph (§9, "Cyclic references").
pub struct Fiber {
    /// This fiber's own arena index.
    pub id: FiberId,
    /// The node type this fiber was built from.
    pub node_type: NodeType,
    /// Stable identity used for reconciliation.
    pub key: NodeKey,
    /// Props from the last commit.
    pub props: Props,
    /// Props from the render currently in progress (before commit).
    pub pending_props: Props,
    /// Opaque per-fiber instance data a host primitive may attach
    /// (e.g. a ref table entry). Analogous to React's `stateNode`.
    pub state_node: Option<Box<dyn Any + Send>>,
    /// Head of the hook-state chain, addressed positionally.
    pub memoized_state: Vec<HookState>,
    /// Parent fiber, or `FiberId::NONE` at the root.
    pub parent: FiberId,
    /// First child, or `FiberId::NONE` if childless.
    pub child: FiberId,
    /// Next sibling, or `FiberId::NONE` if last.
    pub sibling: FiberId,
    /// Position among siblings (for tree-order effect scheduling, §4.5).
    pub index: u32,
    /// Pending work bitset.
    pub flags: FiberFlags,
    /// Children of this fiber slated for unmount on commit.
    pub deletions: Vec<FiberId>,
    /// This fiber's twin in the other buffer, if one exists.
    pub alternate: Option<FiberId>,
    /// Human-readable name for diagnostics (component name, tag, or
    /// primitive name).
    pub debug_name: String,
}

impl Fiber {
    /// Construct a fresh, unplaced fiber with no hook state.
    pub fn new(id: FiberId, node_type: NodeType, key: NodeKey, props: Props, debug_name: String) -> Self {
        Self {
            id,
            node_type,
            key,
            pending_props: props.clone(),
            props,
            state_node: None,
            memoized_state: Vec::new(),
            parent: FiberId::NONE,
            child: FiberId::NONE,
            sibling: FiberId::NONE,
            index: 0,
            flags: FiberFlags::PLACEMENT,
            deletions: Vec::new(),
            alternate: None,
            debug_name,
        }
    }

    /// Whether this fiber's type is identical to `other`'s for the
    /// purpose of reuse matching (§4.4: `oldFiber.type === newElement.type`).
    pub fn same_type_as(&self, node_type: &NodeType) -> bool {
        self.node_type.identity() == node_type.identity()
    }
}
