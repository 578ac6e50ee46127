//! The compiler's output shape (§3 "CompiledStructure", §6.2).

use crate::component::{Formatter, PolicyDescriptor};
use crate::content::ContentBlock;
use serde_json::Map;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A conversational role (§3 "TimelineEntry").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The end user.
    User,
    /// The model.
    Assistant,
    /// A system-level instruction or notice.
    System,
    /// A tool's own voice (distinct from `ContentBlock::ToolResult`,
    /// used when a tool message is represented as a whole timeline entry).
    Tool,
}

/// Who a section/entry is meant to be seen by (§3 "Section").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Audience {
    /// Sent to the model.
    Model,
    /// Shown to a human operator.
    Human,
    /// Internal system bookkeeping only.
    System,
}

/// How visible a section/entry is to observers (§3 "Section").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Part of the model-facing prompt.
    Model,
    /// Visible to an external observer but not sent to the model.
    Observer,
    /// Logged only.
    Log,
}

/// A single message in the conversation timeline.
pub struct Message {
    /// The speaker.
    pub role: Role,
    /// The message's content blocks.
    pub content: Vec<ContentBlock>,
    /// Stable id, if the source supplied one.
    pub id: Option<String>,
    /// Arbitrary metadata.
    pub metadata: Map<String, serde_json::Value>,
    /// Creation timestamp, milliseconds since some epoch the host defines.
    pub created_at: Option<u64>,
}

/// A non-system conversation entry (§3 "TimelineEntry").
///
/// A formatter is only present when the entry was explicitly wrapped
/// in a formatter boundary (§4.6) — entries do not get a
/// default-formatter fallback the way sections do.
pub struct TimelineEntry {
    /// The underlying message.
    pub message: Message,
    /// The formatter captured at collection time, if explicitly wrapped.
    pub formatter: Option<Arc<dyn Formatter>>,
    /// Stable id.
    pub id: Option<String>,
    /// Visibility.
    pub visibility: Option<Visibility>,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Arbitrary metadata.
    pub metadata: Map<String, serde_json::Value>,
    /// Token cost, stamped by the annotator (§4.8). `None` until annotated.
    pub tokens: Option<u64>,
}

/// A named, merge-on-id container of content for the system/prompt
/// layer (§3 "Section").
pub struct Section {
    /// The section's id — explicit, or synthesized by the collector.
    pub id: String,
    /// Optional display title.
    pub title: Option<String>,
    /// Ordered content blocks. Merging concatenates this field
    /// (§4.7, "Id generation"; §8 invariant 6).
    pub content: Vec<ContentBlock>,
    /// The formatter resolved for this section — always present
    /// (§4.6, "sections always have a renderer"): either an explicit
    /// boundary or the default formatter.
    pub formatter: Option<Arc<dyn Formatter>>,
    /// Visibility.
    pub visibility: Option<Visibility>,
    /// Intended audience.
    pub audience: Option<Audience>,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Arbitrary metadata.
    pub metadata: Map<String, serde_json::Value>,
    /// Token cost, stamped by the annotator. `None` until annotated.
    pub tokens: Option<u64>,
}

impl Section {
    /// Merge `other` into `self` per the section merge rule (§3
    /// "Section", §8 invariant 6): content concatenates in encounter
    /// order; non-content fields take `other`'s value when present,
    /// falling back to `self`'s.
    pub fn merge_from(&mut self, other: Section) {
        self.content.extend(other.content);
        if other.title.is_some() {
            self.title = other.title;
        }
        if other.formatter.is_some() {
            self.formatter = other.formatter;
        }
        if other.visibility.is_some() {
            self.visibility = other.visibility;
        }
        if other.audience.is_some() {
            self.audience = other.audience;
        }
        if !other.tags.is_empty() {
            self.tags = other.tags;
        }
        for (k, v) in other.metadata {
            self.metadata.insert(k, v);
        }
        self.tokens = None;
    }
}

/// Where an ephemeral item should be spliced relative to the timeline
/// (§4.7 "Ephemeral").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EphemeralPosition {
    /// Before everything else.
    Start,
    /// After everything else.
    End,
    /// Immediately before the next user message.
    BeforeUser,
    /// Immediately after the preceding system message.
    AfterSystem,
    /// Inline, at its position in the source tree.
    Flow,
}

/// Content that does not persist across ticks; rebuilt every compile
/// (§3 "Lifecycles", §6.1 glossary "Ephemeral").
pub struct EphemeralItem {
    /// The ephemeral content.
    pub content: Vec<ContentBlock>,
    /// Where it should be spliced.
    pub position: EphemeralPosition,
    /// Relative ordering among ephemerals sharing a position (default 0).
    pub order: i32,
}

/// A tool declaration registered with the compiled structure (§4.7 "Tool").
pub struct ToolRef {
    /// The tool's registered name.
    pub name: String,
    /// Its metadata.
    pub tool: crate::component::ToolMetadata,
}

/// One ordered reference into the compiled output that preserves
/// source-tree order (§3 "CompiledStructure", §6.1 glossary "System item").
pub enum SystemItem {
    /// A reference to a section, by id.
    Section {
        /// The referenced section's id.
        section_id: String,
        /// Dense, source-order index (§8 invariant 1).
        index: u32,
    },
    /// A system-role message collected inline.
    Message {
        /// The message content.
        content: Vec<ContentBlock>,
        /// Dense, source-order index.
        index: u32,
        /// The formatter captured at collection time, if explicitly wrapped.
        formatter: Option<Arc<dyn Formatter>>,
    },
    /// Root-level content with no section/message wrapper.
    Loose {
        /// The content.
        content: Vec<ContentBlock>,
        /// Dense, source-order index.
        index: u32,
        /// The formatter captured at collection time, if explicitly wrapped.
        formatter: Option<Arc<dyn Formatter>>,
    },
}

impl SystemItem {
    /// This item's source-order index, regardless of variant.
    pub fn index(&self) -> u32 {
        match self {
            SystemItem::Section { index, .. } => *index,
            SystemItem::Message { index, .. } => *index,
            SystemItem::Loose { index, .. } => *index,
        }
    }
}

/// The compiler's output for one compile iteration (§6.2).
#[derive(Default)]
pub struct CompiledStructure {
    /// Sections, keyed by id.
    pub sections: BTreeMap<String, Section>,
    /// Non-system-role timeline entries, in source order.
    pub timeline_entries: Vec<TimelineEntry>,
    /// Section/message/loose references, in dense source order.
    pub system_message_items: Vec<SystemItem>,
    /// Registered tools, last-write-wins by name.
    pub tools: Vec<ToolRef>,
    /// Ephemeral content, rebuilt every compile.
    pub ephemeral: Vec<EphemeralItem>,
    /// Policies accumulated from policy boundaries, in encounter order.
    pub policy_boundaries: Option<Vec<PolicyDescriptor>>,
    /// Free-form metadata.
    pub metadata: Map<String, serde_json::Value>,
    /// Total estimated token cost. Present iff an estimator was supplied
    /// (§4.8, §8 invariant 8).
    pub total_tokens: Option<u64>,
}

impl std::fmt::Debug for CompiledStructure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledStructure")
            .field("sections", &self.sections.keys().collect::<Vec<_>>())
            .field("timeline_entries", &self.timeline_entries.len())
            .field("system_message_items", &self.system_message_items.len())
            .field("tools", &self.tools.len())
            .field("ephemeral", &self.ephemeral.len())
            .field("total_tokens", &self.total_tokens)
            .finish()
    }
}
