#![deny(missing_docs)]
//! Renderer Boundary Resolver (C6) and Collector (C7): walks a
//! committed fiber tree and produces a [`CompiledStructure`].
//!
//! This crate reads the tree `pc-reconciler` already committed — it
//! never mutates a fiber and never drives another render. The two
//! design-level components (§4.6, §4.7) are implemented as a single
//! depth-first walk: the formatter stack and policy list C6 describes
//! are just local state threaded through the same traversal C7 uses
//! to classify nodes, since both need the same walk over the same
//! tree and nothing downstream needs them kept apart.

mod content;
mod error;

pub use error::CollectError;

use pc_core::{
    Audience, BoundaryKind, CompiledStructure, EphemeralItem, EphemeralPosition, Fiber, FiberId, Formatter,
    HostPrimitive, Message, NodeType, Role, Section, SystemItem, TimelineEntry, ToolMetadata, ToolRef, Visibility,
};
use pc_reconciler::FiberArena;
use serde_json::Value;
use std::sync::Arc;

fn str_prop(fiber: &Fiber, key: &str) -> Option<String> {
    fiber.props.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn parse_role(fiber: &Fiber) -> Role {
    match str_prop(fiber, "role").as_deref() {
        Some("assistant") => Role::Assistant,
        Some("system") => Role::System,
        Some("tool") => Role::Tool,
        _ => Role::User,
    }
}

fn parse_visibility(fiber: &Fiber) -> Option<Visibility> {
    match str_prop(fiber, "visibility").as_deref() {
        Some("model") => Some(Visibility::Model),
        Some("observer") => Some(Visibility::Observer),
        Some("log") => Some(Visibility::Log),
        _ => None,
    }
}

fn parse_audience(fiber: &Fiber) -> Option<Audience> {
    match str_prop(fiber, "audience").as_deref() {
        Some("model") => Some(Audience::Model),
        Some("human") => Some(Audience::Human),
        Some("system") => Some(Audience::System),
        _ => None,
    }
}

fn parse_position(fiber: &Fiber) -> EphemeralPosition {
    match str_prop(fiber, "position").as_deref() {
        Some("start") => EphemeralPosition::Start,
        Some("end") => EphemeralPosition::End,
        Some("before-user") => EphemeralPosition::BeforeUser,
        Some("after-system") => EphemeralPosition::AfterSystem,
        _ => EphemeralPosition::Flow,
    }
}

fn tags_prop(fiber: &Fiber) -> Vec<String> {
    fiber
        .props
        .get("tags")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).map(str::to_owned).collect())
        .unwrap_or_default()
}

fn metadata_prop(fiber: &Fiber) -> serde_json::Map<String, Value> {
    fiber.props.get("metadata").and_then(Value::as_object).cloned().unwrap_or_default()
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

/// Content for a node that may carry either child fibers or a bare
/// `content` prop (§4.7: Section/Entry/Ephemeral all follow this rule).
fn gather_content(arena: &FiberArena, fiber: &Fiber, fiber_id: FiberId) -> Vec<pc_core::ContentBlock> {
    if !children_of(arena, fiber_id).is_empty() {
        let mut out = Vec::new();
        for child in children_of(arena, fiber_id) {
            content::map_fiber(arena, child, &mut out);
        }
        out
    } else if let Some(value) = fiber.props.get("content") {
        content::blocks_from_prop_value(value)
    } else {
        Vec::new()
    }
}

fn tool_metadata_from_props(fiber: &Fiber) -> ToolMetadata {
    let defn = fiber.props.get("definition").and_then(Value::as_object);
    let get = |key: &str| -> Option<String> {
        defn.and_then(|d| d.get(key)).or_else(|| fiber.props.get(key)).and_then(Value::as_str).map(str::to_owned)
    };
    let schema = defn
        .and_then(|d| d.get("input_schema"))
        .or_else(|| fiber.props.get("input_schema"))
        .cloned()
        .unwrap_or(Value::Null);
    ToolMetadata {
        name: get("name").unwrap_or_default(),
        description: get("description").unwrap_or_default(),
        input_schema: schema,
    }
}

/// Accumulator threaded through the traversal (§4.6/§4.7 combined).
#[derive(Default)]
struct Accumulator {
    compiled: CompiledStructure,
    next_index: u32,
}

impl Accumulator {
    fn next_index(&mut self) -> u32 {
        let i = self.next_index;
        self.next_index += 1;
        i
    }

    fn upsert_tool(&mut self, tool: ToolRef) {
        if let Some(existing) = self.compiled.tools.iter_mut().find(|t| t.name == tool.name) {
            *existing = tool;
        } else {
            self.compiled.tools.push(tool);
        }
    }
}

/// Walks a committed fiber tree and produces a [`CompiledStructure`] (§4.7).
pub struct Collector<'a> {
    arena: &'a FiberArena,
}

impl<'a> Collector<'a> {
    /// Build a collector over an already-committed arena.
    pub fn new(arena: &'a FiberArena) -> Self {
        Self { arena }
    }

    /// Collect the subtree rooted at `root` into a [`CompiledStructure`].
    pub fn collect(&self, root: FiberId) -> Result<CompiledStructure, CollectError> {
        let mut acc = Accumulator::default();
        let mut formatters: Vec<Arc<dyn Formatter>> = Vec::new();
        self.walk(root, &mut acc, &mut formatters)?;
        Ok(acc.compiled)
    }

    fn current_formatter(&self, formatters: &[Arc<dyn Formatter>]) -> Option<Arc<dyn Formatter>> {
        formatters.last().cloned()
    }

    fn walk(
        &self,
        fiber_id: FiberId,
        acc: &mut Accumulator,
        formatters: &mut Vec<Arc<dyn Formatter>>,
    ) -> Result<(), CollectError> {
        if fiber_id.is_none() {
            return Ok(());
        }
        let Some(fiber) = self.arena.get(fiber_id) else { return Ok(()) };

        match &fiber.node_type {
            NodeType::Composite(c) => {
                if let Some(meta) = c.tool_metadata() {
                    acc.upsert_tool(ToolRef { name: meta.name.clone(), tool: meta });
                }
                match c.boundary() {
                    Some(BoundaryKind::Formatter(f)) => {
                        formatters.push(f);
                        self.recurse(fiber_id, acc, formatters)?;
                        formatters.pop();
                    }
                    Some(BoundaryKind::Policy(descs)) => {
                        match &mut acc.compiled.policy_boundaries {
                            Some(existing) => existing.extend(descs),
                            None => acc.compiled.policy_boundaries = Some(descs),
                        }
                        self.recurse(fiber_id, acc, formatters)?;
                    }
                    // `BoundaryKind` is `#[non_exhaustive]`; ContextProvider is
                    // resolved during render by `pc-reconciler`, not here, so
                    // it falls into the same plain-recurse case as `None` and
                    // any future variant.
                    _ => {
                        self.recurse(fiber_id, acc, formatters)?;
                    }
                }
            }
            NodeType::Host(HostPrimitive::Fragment) => self.recurse(fiber_id, acc, formatters)?,
            NodeType::Host(HostPrimitive::Section) => self.collect_section(fiber, fiber_id, acc, formatters),
            NodeType::Host(HostPrimitive::Entry) => self.collect_entry(fiber, fiber_id, acc, formatters),
            NodeType::Host(HostPrimitive::Ephemeral) => self.collect_ephemeral(fiber, fiber_id, acc),
            NodeType::Host(HostPrimitive::Tool) => {
                let meta = tool_metadata_from_props(fiber);
                acc.upsert_tool(ToolRef { name: meta.name.clone(), tool: meta });
            }
            NodeType::Host(_) | NodeType::Tag(_) => {
                let mut blocks = Vec::new();
                content::map_fiber(self.arena, fiber_id, &mut blocks);
                let index = acc.next_index();
                acc.compiled.system_message_items.push(SystemItem::Loose {
                    content: blocks,
                    index,
                    formatter: self.current_formatter(formatters),
                });
            }
        }
        Ok(())
    }

    fn recurse(
        &self,
        fiber_id: FiberId,
        acc: &mut Accumulator,
        formatters: &mut Vec<Arc<dyn Formatter>>,
    ) -> Result<(), CollectError> {
        for child in children_of(self.arena, fiber_id) {
            self.walk(child, acc, formatters)?;
        }
        Ok(())
    }

    fn collect_section(&self, fiber: &Fiber, fiber_id: FiberId, acc: &mut Accumulator, formatters: &mut [Arc<dyn Formatter>]) {
        let explicit_id = str_prop(fiber, "id");
        let id = explicit_id.clone().unwrap_or_else(|| format!("section-{}", fiber_id.0));
        let content = gather_content(self.arena, fiber, fiber_id);
        let formatter =
            self.current_formatter(formatters).unwrap_or_else(|| Arc::new(content::DefaultFormatter) as Arc<dyn Formatter>);

        let section = Section {
            id: id.clone(),
            title: str_prop(fiber, "title"),
            content,
            formatter: Some(formatter),
            visibility: parse_visibility(fiber),
            audience: parse_audience(fiber),
            tags: tags_prop(fiber),
            metadata: metadata_prop(fiber),
            tokens: None,
        };

        if let Some(existing) = acc.compiled.sections.get_mut(&id) {
            if explicit_id.is_some() {
                tracing::warn!(section_id = %id, "explicit section id collided with an existing section; merging");
            }
            existing.merge_from(section);
        } else {
            acc.compiled.sections.insert(id.clone(), section);
        }

        let index = acc.next_index();
        acc.compiled.system_message_items.push(SystemItem::Section { section_id: id, index });
    }

    fn collect_entry(&self, fiber: &Fiber, fiber_id: FiberId, acc: &mut Accumulator, formatters: &mut [Arc<dyn Formatter>]) {
        let role = parse_role(fiber);
        let content = gather_content(self.arena, fiber, fiber_id);
        let formatter = self.current_formatter(formatters);

        if matches!(role, Role::System) {
            let index = acc.next_index();
            acc.compiled.system_message_items.push(SystemItem::Message { content, index, formatter });
            return;
        }

        let message = Message {
            role,
            content,
            id: str_prop(fiber, "id"),
            metadata: metadata_prop(fiber),
            created_at: fiber.props.get("created_at").and_then(Value::as_u64),
        };
        acc.compiled.timeline_entries.push(TimelineEntry {
            message,
            formatter,
            id: str_prop(fiber, "id"),
            visibility: parse_visibility(fiber),
            tags: tags_prop(fiber),
            metadata: metadata_prop(fiber),
            tokens: None,
        });
    }

    fn collect_ephemeral(&self, fiber: &Fiber, fiber_id: FiberId, acc: &mut Accumulator) {
        let content = gather_content(self.arena, fiber, fiber_id);
        acc.compiled.ephemeral.push(EphemeralItem {
            content,
            position: parse_position(fiber),
            order: fiber.props.get("order").and_then(Value::as_i64).unwrap_or(0) as i32,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pc_core::{ContentBlock, Node, NodeKey, Props};

    fn section_node(id: Option<&str>, text: &str) -> Node {
        let mut props = Props::new();
        if let Some(id) = id {
            props.insert("id".into(), Value::String(id.into()));
        }
        Node::host(HostPrimitive::Section, props, vec![Node::text(text)])
    }

    /// Builds a committed arena directly (bypassing the reconciler —
    /// the collector only ever reads an already-committed tree) with
    /// `root` as a Fragment wrapping the given top-level nodes.
    fn build_arena(nodes: Vec<Node>) -> (FiberArena, FiberId) {
        let mut arena = FiberArena::new();
        let root = arena.create_fiber(NodeType::Host(HostPrimitive::Fragment), None, Props::new(), "root".into());
        let mut prev: Option<FiberId> = None;
        for node in nodes {
            let id = place(&mut arena, &node);
            if let Some(p) = prev {
                arena.get_mut(p).unwrap().sibling = id;
            } else {
                arena.get_mut(root).unwrap().child = id;
            }
            arena.get_mut(id).unwrap().parent = root;
            prev = Some(id);
        }
        (arena, root)
    }

    fn place(arena: &mut FiberArena, node: &Node) -> FiberId {
        let key: NodeKey = node.key.clone();
        let id = arena.create_fiber(node.node_type.clone(), key, node.props.clone(), "n".into());
        let mut prev: Option<FiberId> = None;
        for child in &node.children {
            let cid = place(arena, child);
            if let Some(p) = prev {
                arena.get_mut(p).unwrap().sibling = cid;
            } else {
                arena.get_mut(id).unwrap().child = cid;
            }
            arena.get_mut(cid).unwrap().parent = id;
            prev = Some(cid);
        }
        id
    }

    #[test]
    fn section_content_comes_from_children() {
        let (arena, root) = build_arena(vec![section_node(Some("test"), "Hello World")]);
        let compiled = Collector::new(&arena).collect(root).unwrap();
        let section = &compiled.sections["test"];
        assert_eq!(section.content.len(), 1);
        assert!(matches!(&section.content[0], ContentBlock::Text { text, .. } if text == "Hello World"));
        assert_eq!(compiled.system_message_items.len(), 1);
        assert_eq!(compiled.system_message_items[0].index(), 0);
    }

    #[test]
    fn duplicate_section_ids_merge_in_encounter_order() {
        let (arena, root) = build_arena(vec![section_node(Some("info"), "A"), section_node(Some("info"), "B")]);
        let compiled = Collector::new(&arena).collect(root).unwrap();
        assert_eq!(compiled.sections.len(), 1);
        let content = &compiled.sections["info"].content;
        assert_eq!(content.len(), 2);
        assert!(matches!(&content[0], ContentBlock::Text { text, .. } if text == "A"));
        assert!(matches!(&content[1], ContentBlock::Text { text, .. } if text == "B"));
        // Two distinct system-items still point at the one merged section.
        assert_eq!(compiled.system_message_items.len(), 2);
    }

    #[test]
    fn system_entries_route_separately_from_timeline() {
        let mut sys_props = Props::new();
        sys_props.insert("role".into(), Value::String("system".into()));
        let sys_entry = Node::host(HostPrimitive::Entry, sys_props, vec![Node::text("S")]);

        let mut user_props = Props::new();
        user_props.insert("role".into(), Value::String("user".into()));
        let user_entry = Node::host(HostPrimitive::Entry, user_props, vec![Node::text("U")]);

        let (arena, root) = build_arena(vec![sys_entry, user_entry]);
        let compiled = Collector::new(&arena).collect(root).unwrap();

        assert_eq!(compiled.timeline_entries.len(), 1);
        assert!(matches!(&compiled.timeline_entries[0].message.content[0], ContentBlock::Text { text, .. } if text == "U"));
        assert_eq!(compiled.system_message_items.len(), 1);
        assert!(matches!(&compiled.system_message_items[0], SystemItem::Message { .. }));
    }

    #[test]
    fn system_item_indices_are_dense_and_source_ordered() {
        let (arena, root) = build_arena(vec![
            section_node(Some("a"), "1"),
            section_node(Some("b"), "2"),
            section_node(Some("c"), "3"),
        ]);
        let compiled = Collector::new(&arena).collect(root).unwrap();
        let indices: Vec<u32> = compiled.system_message_items.iter().map(|i| i.index()).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }
}
