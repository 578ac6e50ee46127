//! Typed content blocks — the leaves of a compiled prompt.
//!
//! Every piece of text, code, media, or structured event that reaches
//! the model or an observer is normalized into an ordered list of
//! [`ContentBlock`] values. This is the "hand-rolled richer schema"
//! this implementation settles on (see the schema-naming design note):
//! content is always `Vec<ContentBlock>`, never a bare string or an
//! "unknown" escape hatch.

use serde::{Deserialize, Serialize};

/// A single block of structured content.
///
/// `#[non_exhaustive]` because new modalities are expected to arrive
/// over time; a downstream match must carry a wildcard arm.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text {
        /// The text content.
        text: String,
        /// Structural hint for how this block should be rendered.
        semantic: Option<Semantic>,
        /// Inline-formatting tree, when the text carries inline markup.
        semantic_node: Option<SemanticNode>,
    },

    /// A source-code fragment.
    Code {
        /// The code text.
        text: String,
        /// Language tag (e.g. `"py"`, `"rust"`), if known.
        language: Option<String>,
    },

    /// An image.
    Image {
        /// Where the image data comes from.
        source: MediaSource,
        /// Accessible alt text, if supplied.
        alt_text: Option<String>,
    },

    /// A non-image document (PDF, text file, etc).
    Document {
        /// Where the document data comes from.
        source: MediaSource,
        /// Display name of the document, if known.
        name: Option<String>,
    },

    /// An audio clip.
    Audio {
        /// Where the audio data comes from.
        source: MediaSource,
    },

    /// A video clip.
    Video {
        /// Where the video data comes from.
        source: MediaSource,
    },

    /// Structured JSON data, with an optional pre-rendered text form.
    Json {
        /// The structured value.
        data: serde_json::Value,
        /// A pre-rendered textual form, when the caller already has one
        /// (avoids re-serializing for token estimation).
        text: Option<String>,
    },

    /// A tool invocation requested by the model.
    ToolUse {
        /// Identifier correlating this use with its eventual result.
        tool_use_id: String,
        /// Name of the tool being invoked.
        name: String,
        /// Tool input parameters.
        input: serde_json::Value,
    },

    /// The result of a tool invocation.
    ToolResult {
        /// The `tool_use_id` this result answers.
        tool_use_id: String,
        /// The result content. A tool may return either a plain string
        /// or a nested list of content blocks (e.g. an image result).
        content: ToolResultContent,
        /// Whether the tool execution errored.
        is_error: bool,
    },

    /// Model-internal reasoning / scratchpad content.
    Reasoning {
        /// The reasoning text.
        text: String,
    },

    /// A recorded user action (e.g. a UI interaction), not free text.
    UserAction {
        /// The action identifier.
        action: String,
        /// Arbitrary structured payload describing the action.
        data: serde_json::Value,
    },

    /// A system-level event surfaced into content (e.g. "session resumed").
    SystemEvent {
        /// The event identifier.
        event: String,
        /// Arbitrary structured payload.
        data: serde_json::Value,
    },

    /// A recorded state transition.
    StateChange {
        /// What changed.
        key: String,
        /// The value before the change, if known.
        before: Option<serde_json::Value>,
        /// The value after the change.
        after: serde_json::Value,
    },
}

/// Result content for a [`ContentBlock::ToolResult`] — either a plain
/// string or a nested block list (some tools return rich results).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ToolResultContent {
    /// A plain string result.
    Text(String),
    /// A nested list of content blocks.
    Blocks(Vec<ContentBlock>),
}

/// Source for a media content block (image, document, audio, video).
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaSource {
    /// Base64-encoded inline data.
    Base64 {
        /// The base64-encoded payload.
        data: String,
        /// The MIME type of the payload.
        media_type: String,
    },
    /// A URL pointing at the media.
    Url {
        /// The URL.
        url: String,
    },
}

/// A structural hint attached to a [`ContentBlock`] describing how it
/// was authored in the source tree (a heading, a list item, …).
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Semantic {
    /// A heading at the given level (1-6).
    Heading {
        /// Heading level, 1 (largest) through 6.
        level: u8,
    },
    /// A paragraph.
    Paragraph,
    /// A list, ordered or unordered.
    List {
        /// Whether the list is numbered.
        ordered: bool,
    },
    /// A single list item.
    ListItem,
    /// A table.
    Table,
    /// Content that should render as collapsed/foldable by default.
    Collapsed,
    /// An explicit line break.
    LineBreak,
    /// A horizontal rule.
    HorizontalRule,
    /// An unrecognized tag, preserved so downstream renderers can extend
    /// behavior instead of silently dropping the content.
    Custom {
        /// The original tag name the collector did not recognize.
        renderer_tag: String,
        /// Whatever attributes were attached to that tag.
        renderer_attrs: serde_json::Value,
    },
}

/// An inline-formatting tree, used when a text block carries nested
/// inline markup (bold, emphasis, links, …) rather than flat text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SemanticNode {
    /// A leaf run of plain text.
    Text(String),
    /// Bold / strong emphasis.
    Strong(Vec<SemanticNode>),
    /// Italic / light emphasis.
    Emphasis(Vec<SemanticNode>),
    /// Inline code span.
    Code(String),
    /// A hyperlink.
    Link {
        /// The link target.
        href: String,
        /// The link's inline content.
        children: Vec<SemanticNode>,
    },
    /// A blockquote.
    Quote(Vec<SemanticNode>),
    /// A keyboard-input span.
    Kbd(String),
    /// An explicit inline break.
    Break,
    /// An unrecognized inline tag, preserved for extension.
    Custom {
        /// The original tag name.
        tag: String,
        /// Whatever attributes were attached.
        attrs: serde_json::Value,
        /// The tag's inline children.
        children: Vec<SemanticNode>,
    },
}

impl ContentBlock {
    /// Build a plain text block with no semantic hints.
    pub fn text(s: impl Into<String>) -> Self {
        ContentBlock::Text {
            text: s.into(),
            semantic: None,
            semantic_node: None,
        }
    }

    /// Build a code block.
    pub fn code(s: impl Into<String>, language: Option<String>) -> Self {
        ContentBlock::Code {
            text: s.into(),
            language,
        }
    }

    /// The plain-text rendering of this block, when one is meaningful
    /// (used by the default content-block mapper and, indirectly, by
    /// token annotation for blocks it does not specialize).
    pub fn as_plain_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text, .. } => Some(text),
            ContentBlock::Code { text, .. } => Some(text),
            ContentBlock::Reasoning { text } => Some(text),
            ContentBlock::Json { text: Some(t), .. } => Some(t),
            _ => None,
        }
    }
}
