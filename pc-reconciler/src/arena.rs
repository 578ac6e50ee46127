//! The fiber arena (§4.2 "Fiber Arena", C2).
//!
//! Fibers are addressed by [`FiberId`], a dense arena index, never by
//! pointer — this avoids the `Rc`/`Arc` parent-pointer cycles a
//! directly-linked fiber graph would otherwise need (§9, "Cyclic
//! references").
//!
//! This implementation does not recycle arena slots across ticks: every
//! reconcile allocates a fresh work-in-progress fiber for anything
//! touched, and old-generation slots are simply never revisited once
//! `current_root` moves past them. A production deployment running
//! many ticks per process would want a freelist; tracked in DESIGN.md.

use pc_core::{Fiber, FiberFlags, FiberId, NodeKey, NodeType, Props};

/// Owns every fiber ever created for one execution.
#[derive(Default)]
pub struct FiberArena {
    fibers: Vec<Fiber>,
}

impl FiberArena {
    /// Construct an empty arena.
    pub fn new() -> Self {
        Self { fibers: Vec::new() }
    }

    /// Borrow a fiber by id.
    pub fn get(&self, id: FiberId) -> Option<&Fiber> {
        self.fibers.get(id.0 as usize)
    }

    /// Mutably borrow a fiber by id.
    pub fn get_mut(&mut self, id: FiberId) -> Option<&mut Fiber> {
        self.fibers.get_mut(id.0 as usize)
    }

    /// Allocate a fresh, unplaced fiber (§4.2 `createFiber`).
    pub fn create_fiber(
        &mut self,
        node_type: NodeType,
        key: NodeKey,
        props: Props,
        debug_name: String,
    ) -> FiberId {
        let id = FiberId(self.fibers.len() as u32);
        self.fibers.push(Fiber::new(id, node_type, key, props, debug_name));
        id
    }

    /// Build the work-in-progress twin of `old_id` for this render
    /// (§4.2 `cloneForUpdate`). Moves the hook-state chain out of the
    /// old fiber into the new one — hooks persist across renders
    /// (§4.3 "Cross-tick persistence") by following the identity
    /// forward rather than being copied.
    pub fn clone_for_update(&mut self, old_id: FiberId, new_node_type: NodeType, new_props: Props) -> FiberId {
        let old = self.get(old_id).expect("clone_for_update: unknown fiber");
        let debug_name = old.debug_name.clone();
        let key = old.key.clone();
        let props = old.props.clone();

        let new_id = FiberId(self.fibers.len() as u32);
        let old_mut = self.get_mut(old_id).expect("clone_for_update: unknown fiber");
        let memoized_state = std::mem::take(&mut old_mut.memoized_state);
        let state_node = old_mut.state_node.take();
        old_mut.alternate = Some(new_id);

        let mut fiber = Fiber::new(new_id, new_node_type, key, props, debug_name);
        fiber.pending_props = new_props;
        fiber.memoized_state = memoized_state;
        fiber.state_node = state_node;
        fiber.alternate = Some(old_id);
        fiber.flags = FiberFlags::UPDATE;
        self.fibers.push(fiber);
        new_id
    }

    /// Reverse a `clone_for_update`: moves the hook-state chain back
    /// onto the old (current) fiber and forgets the work-in-progress
    /// twin. Used when a render is cancelled before commit (§5
    /// "Cancellation and timeouts": "discarding the work-in-progress
    /// buffer, leaving current intact").
    pub fn abandon_wip(&mut self, old_id: FiberId, wip_id: FiberId) {
        let memoized_state = {
            let wip = self.get_mut(wip_id).expect("abandon_wip: unknown wip fiber");
            std::mem::take(&mut wip.memoized_state)
        };
        let state_node = {
            let wip = self.get_mut(wip_id).expect("abandon_wip: unknown wip fiber");
            wip.state_node.take()
        };
        if let Some(old) = self.get_mut(old_id) {
            old.memoized_state = memoized_state;
            old.state_node = state_node;
            old.alternate = None;
        }
    }

    /// Preorder traversal (parent before children, siblings left to
    /// right) starting at `root` (§4.2 `traverse`, §8 invariant 9).
    pub fn traverse_preorder(&self, root: FiberId) -> Vec<FiberId> {
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if id.is_none() {
                continue;
            }
            order.push(id);
            let Some(fiber) = self.get(id) else { continue };
            let mut children = Vec::new();
            let mut child = fiber.child;
            while !child.is_none() {
                children.push(child);
                child = self.get(child).map(|f| f.sibling).unwrap_or(FiberId::NONE);
            }
            for c in children.into_iter().rev() {
                stack.push(c);
            }
        }
        order
    }
}
