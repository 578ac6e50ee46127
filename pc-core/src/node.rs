//! The Node Model (C1) — the immutable tree the caller describes.

use crate::component::Component;
use serde_json::Map;
use std::sync::Arc;

/// Arbitrary props attached to a node. Specific primitives read
/// specific keys out of this map by convention (§6.1): `id`, `content`,
/// `visibility`, `audience`, `tags`, `metadata` on `Section`;
/// `role`, `content`, `message` on `Entry`; `source`, `alt_text`,
/// `text`, `language`, `data` on content nodes.
pub type Props = Map<String, serde_json::Value>;

/// A host primitive marker — the fixed vocabulary of built-in node
/// kinds (§3 "Node"). Distinguished from string tags so the collector
/// can match primitives without relying on a name collision.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostPrimitive {
    /// A named, merge-on-id container of content for the system layer.
    Section,
    /// A single timeline message (user/assistant/system/tool role).
    Entry,
    /// A tool declaration.
    Tool,
    /// Content that does not persist across ticks.
    Ephemeral,
    /// Plain text leaf.
    Text,
    /// Source-code leaf.
    Code,
    /// Image leaf.
    Image,
    /// Structured JSON leaf.
    Json,
    /// Non-image document leaf.
    Document,
    /// Audio leaf.
    Audio,
    /// Video leaf.
    Video,
    /// A transparent grouping node: contributes no fiber of its own
    /// semantic kind, children reconcile directly against the parent.
    Fragment,
}

/// The tagged union of what a node's `type` can be (§9, "Dynamic
/// dispatch over component kinds").
#[derive(Clone)]
pub enum NodeType {
    /// A built-in primitive.
    Host(HostPrimitive),
    /// A user-defined composite component. Identity for reuse across
    /// reconciliations is the component's `name()`, not pointer
    /// equality — matching the "represented as `(id, trait object)`
    /// pairs" design note.
    Composite(Arc<dyn Component>),
    /// A bare string tag — a content/semantic element the collector's
    /// content-block mapper recognizes (`strong`, `em`, `a`, headings,
    /// …) or, if unrecognized, preserves as a custom block.
    Tag(String),
}

impl std::fmt::Debug for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeType::Host(p) => write!(f, "Host({p:?})"),
            NodeType::Composite(c) => write!(f, "Composite({})", c.name()),
            NodeType::Tag(t) => write!(f, "Tag({t:?})"),
        }
    }
}

impl NodeType {
    /// A stable type identity string used for reconciliation's
    /// `oldFiber.type === newElement.type` comparison (§4.4).
    pub fn identity(&self) -> String {
        match self {
            NodeType::Host(p) => format!("host:{p:?}"),
            NodeType::Composite(c) => format!("composite:{}", c.name()),
            NodeType::Tag(t) => format!("tag:{t}"),
        }
    }

    /// Whether this type is the fragment primitive.
    pub fn is_fragment(&self) -> bool {
        matches!(self, NodeType::Host(HostPrimitive::Fragment))
    }
}

/// User-supplied identity for a node, used for stable matching across
/// reconciliations (§3 "Node", `key`). `None` falls back to positional
/// matching.
pub type NodeKey = Option<String>;

/// An immutable view of user intent — what the caller described, as
/// opposed to a [`crate::fiber::Fiber`], which is the mutable work
/// unit the reconciler builds from it.
#[derive(Clone)]
pub struct Node {
    /// The node's type.
    pub node_type: NodeType,
    /// Arbitrary props.
    pub props: Props,
    /// Stable identity for reconciliation.
    pub key: NodeKey,
    /// Ordered children. Normalization (flattening one level, dropping
    /// null/false, converting strings to text nodes) happens in the
    /// reconciler's begin-work step, not here — `Node` is the raw
    /// tree the caller handed in.
    pub children: Vec<Node>,
}

impl Node {
    /// Construct a node with no key and no props.
    pub fn new(node_type: NodeType, children: Vec<Node>) -> Self {
        Self {
            node_type,
            props: Props::new(),
            key: None,
            children,
        }
    }

    /// Attach a key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Attach props.
    pub fn with_props(mut self, props: Props) -> Self {
        self.props = props;
        self
    }

    /// A host-primitive node builder.
    pub fn host(primitive: HostPrimitive, props: Props, children: Vec<Node>) -> Self {
        Self {
            node_type: NodeType::Host(primitive),
            props,
            key: None,
            children,
        }
    }

    /// A plain text leaf node (the coercion target for bare strings
    /// during child normalization, §4.4).
    pub fn text(s: impl Into<String>) -> Self {
        let mut props = Props::new();
        props.insert("text".into(), serde_json::Value::String(s.into()));
        Self::host(HostPrimitive::Text, props, Vec::new())
    }
}
