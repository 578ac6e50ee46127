//! The content-block mapper (§4.7 "Content collection from children").
//!
//! Maps a subtree of the committed fiber tree into a flat
//! `Vec<ContentBlock>`: host content leaves map to their typed block
//! directly, `Fragment` and composite passthrough fibers flatten
//! transparently, recognized inline-semantic tags produce either a
//! block-level [`Semantic`] hint or an inline [`SemanticNode`] tree,
//! and anything else falls back to a custom block so downstream
//! renderers can still extend behavior instead of losing the content.

use pc_core::{ContentBlock, Fiber, FiberId, HostPrimitive, MediaSource, NodeType, Semantic, SemanticNode, ToolResultContent};
use pc_reconciler::FiberArena;
use serde_json::Value;

/// A renderer used when no formatter boundary wraps a section (§4.6,
/// "sections always have a renderer"). Joins each block's plain-text
/// rendering with newlines; non-text blocks degrade to a JSON dump.
pub struct DefaultFormatter;

impl pc_core::Formatter for DefaultFormatter {
    fn format(&self, blocks: &[ContentBlock]) -> String {
        blocks
            .iter()
            .map(|b| match b.as_plain_text() {
                Some(t) => t.to_owned(),
                None => serde_json::to_string(b).unwrap_or_default(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn media_source(props: &serde_json::Map<String, Value>) -> MediaSource {
    if let Some(data) = props.get("data").and_then(Value::as_str) {
        MediaSource::Base64 {
            data: data.to_owned(),
            media_type: props
                .get("media_type")
                .and_then(Value::as_str)
                .unwrap_or("application/octet-stream")
                .to_owned(),
        }
    } else {
        MediaSource::Url {
            url: props.get("source").or_else(|| props.get("url")).and_then(Value::as_str).unwrap_or("").to_owned(),
        }
    }
}

fn str_prop(props: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    props.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// Children (sibling chain) of `fiber_id`, outermost child first.
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

/// Recursively flattens a fiber's subtree into the plain text that
/// would be visible if all markup were stripped, used to build the
/// text payload of `Semantic`/`SemanticNode`-tagged blocks.
fn flatten_text(arena: &FiberArena, fiber_id: FiberId) -> String {
    let Some(fiber) = arena.get(fiber_id) else { return String::new() };
    match &fiber.node_type {
        NodeType::Host(HostPrimitive::Text) => str_prop(&fiber.props, "text").unwrap_or_default(),
        NodeType::Host(HostPrimitive::Code) => str_prop(&fiber.props, "text").unwrap_or_default(),
        NodeType::Host(HostPrimitive::Fragment) | NodeType::Composite(_) => children_of(arena, fiber_id)
            .into_iter()
            .map(|c| flatten_text(arena, c))
            .collect::<Vec<_>>()
            .join(""),
        NodeType::Tag(name) if name == "br" => "\n".to_owned(),
        NodeType::Tag(_) => children_of(arena, fiber_id)
            .into_iter()
            .map(|c| flatten_text(arena, c))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    }
}

/// Builds the inline `SemanticNode` tree for an inline tag's children.
fn semantic_children(arena: &FiberArena, fiber_id: FiberId) -> Vec<SemanticNode> {
    children_of(arena, fiber_id).into_iter().map(|c| semantic_node(arena, c)).collect()
}

fn semantic_node(arena: &FiberArena, fiber_id: FiberId) -> SemanticNode {
    let Some(fiber) = arena.get(fiber_id) else { return SemanticNode::Text(String::new()) };
    match &fiber.node_type {
        NodeType::Host(HostPrimitive::Text) => SemanticNode::Text(str_prop(&fiber.props, "text").unwrap_or_default()),
        NodeType::Tag(name) => match name.as_str() {
            "strong" => SemanticNode::Strong(semantic_children(arena, fiber_id)),
            "em" => SemanticNode::Emphasis(semantic_children(arena, fiber_id)),
            "code" => SemanticNode::Code(flatten_text(arena, fiber_id)),
            "a" => SemanticNode::Link {
                href: str_prop(&fiber.props, "href").unwrap_or_default(),
                children: semantic_children(arena, fiber_id),
            },
            "q" | "blockquote" => SemanticNode::Quote(semantic_children(arena, fiber_id)),
            "kbd" => SemanticNode::Kbd(flatten_text(arena, fiber_id)),
            "br" => SemanticNode::Break,
            other => SemanticNode::Custom {
                tag: other.to_owned(),
                attrs: Value::Object(fiber.props.clone()),
                children: semantic_children(arena, fiber_id),
            },
        },
        _ => SemanticNode::Text(flatten_text(arena, fiber_id)),
    }
}

/// Maps one fiber into zero or more content blocks, appending to `out`.
/// `Fragment` and composite-passthrough fibers flatten into their
/// children rather than producing a block of their own.
pub fn map_fiber(arena: &FiberArena, fiber_id: FiberId, out: &mut Vec<ContentBlock>) {
    let Some(fiber) = arena.get(fiber_id) else { return };
    match &fiber.node_type {
        NodeType::Host(HostPrimitive::Fragment) | NodeType::Composite(_) => {
            for child in children_of(arena, fiber_id) {
                map_fiber(arena, child, out);
            }
        }
        NodeType::Host(HostPrimitive::Text) => out.push(ContentBlock::Text {
            text: str_prop(&fiber.props, "text").unwrap_or_default(),
            semantic: None,
            semantic_node: None,
        }),
        NodeType::Host(HostPrimitive::Code) => out.push(ContentBlock::Code {
            text: str_prop(&fiber.props, "text").unwrap_or_default(),
            language: str_prop(&fiber.props, "language"),
        }),
        NodeType::Host(HostPrimitive::Image) => out.push(ContentBlock::Image {
            source: media_source(&fiber.props),
            alt_text: str_prop(&fiber.props, "alt_text"),
        }),
        NodeType::Host(HostPrimitive::Document) => out.push(ContentBlock::Document {
            source: media_source(&fiber.props),
            name: str_prop(&fiber.props, "name"),
        }),
        NodeType::Host(HostPrimitive::Audio) => out.push(ContentBlock::Audio { source: media_source(&fiber.props) }),
        NodeType::Host(HostPrimitive::Video) => out.push(ContentBlock::Video { source: media_source(&fiber.props) }),
        NodeType::Host(HostPrimitive::Json) => out.push(ContentBlock::Json {
            data: fiber.props.get("data").cloned().unwrap_or(Value::Null),
            text: str_prop(&fiber.props, "text"),
        }),
        NodeType::Host(other) => {
            tracing::warn!(fiber = %fiber_id, kind = ?other, "unexpected primitive found while collecting content; emitting a custom block");
            out.push(custom_block(fiber, &fiber.debug_name));
        }
        NodeType::Tag(name) => out.push(map_tag(arena, fiber_id, fiber, name)),
    }
}

fn custom_block(fiber: &Fiber, tag: &str) -> ContentBlock {
    ContentBlock::Text {
        text: String::new(),
        semantic: Some(Semantic::Custom {
            renderer_tag: tag.to_owned(),
            renderer_attrs: Value::Object(fiber.props.clone()),
        }),
        semantic_node: None,
    }
}

fn map_tag(arena: &FiberArena, fiber_id: FiberId, fiber: &Fiber, name: &str) -> ContentBlock {
    match name {
        "strong" | "em" | "code" | "a" | "q" | "kbd" | "blockquote" => ContentBlock::Text {
            text: flatten_text(arena, fiber_id),
            semantic: None,
            semantic_node: Some(semantic_node(arena, fiber_id)),
        },
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => ContentBlock::Text {
            text: flatten_text(arena, fiber_id),
            semantic: Some(Semantic::Heading { level: name[1..].parse().unwrap_or(1) }),
            semantic_node: None,
        },
        "p" | "paragraph" => ContentBlock::Text {
            text: flatten_text(arena, fiber_id),
            semantic: Some(Semantic::Paragraph),
            semantic_node: None,
        },
        "ul" | "ol" | "list" => ContentBlock::Text {
            text: flatten_text(arena, fiber_id),
            semantic: Some(Semantic::List { ordered: name == "ol" }),
            semantic_node: None,
        },
        "li" | "listitem" => ContentBlock::Text {
            text: flatten_text(arena, fiber_id),
            semantic: Some(Semantic::ListItem),
            semantic_node: None,
        },
        "table" => ContentBlock::Text {
            text: flatten_text(arena, fiber_id),
            semantic: Some(Semantic::Table),
            semantic_node: None,
        },
        "tr" | "row" | "td" | "column" => {
            // No dedicated Semantic variant for table cells/rows; flatten
            // transparently into the parent table's text the same way a
            // Fragment would.
            let mut blocks = Vec::new();
            for child in children_of(arena, fiber_id) {
                map_fiber(arena, child, &mut blocks);
            }
            if blocks.len() == 1 {
                blocks.into_iter().next().unwrap()
            } else {
                ContentBlock::Text { text: flatten_text(arena, fiber_id), semantic: None, semantic_node: None }
            }
        }
        "br" => ContentBlock::Text { text: String::new(), semantic: Some(Semantic::LineBreak), semantic_node: None },
        "hr" => ContentBlock::Text { text: String::new(), semantic: Some(Semantic::HorizontalRule), semantic_node: None },
        "img" | "image" => ContentBlock::Image {
            source: media_source(&fiber.props),
            alt_text: str_prop(&fiber.props, "alt_text"),
        },
        "tool_use" => ContentBlock::ToolUse {
            tool_use_id: str_prop(&fiber.props, "tool_use_id").unwrap_or_default(),
            name: str_prop(&fiber.props, "name").unwrap_or_default(),
            input: fiber.props.get("input").cloned().unwrap_or(Value::Null),
        },
        "tool_result" => ContentBlock::ToolResult {
            tool_use_id: str_prop(&fiber.props, "tool_use_id").unwrap_or_default(),
            content: match fiber.props.get("content") {
                Some(Value::String(s)) => ToolResultContent::Text(s.clone()),
                Some(Value::Array(items)) => {
                    let mut blocks = Vec::new();
                    for (i, item) in items.iter().enumerate() {
                        let _ = i;
                        blocks.push(json_value_to_block(item));
                    }
                    ToolResultContent::Blocks(blocks)
                }
                _ => ToolResultContent::Text(String::new()),
            },
            is_error: fiber.props.get("is_error").and_then(Value::as_bool).unwrap_or(false),
        },
        other => {
            tracing::warn!(fiber = %fiber_id, tag = other, "unrecognized tag; emitting a custom block");
            custom_block(fiber, other)
        }
    }
}

/// Best-effort mapping from a bare JSON value (as supplied via a
/// `content` prop array) into a [`ContentBlock`], used where the
/// source tree hands the collector data instead of child fibers.
pub fn json_value_to_block(value: &Value) -> ContentBlock {
    if let Some(s) = value.as_str() {
        return ContentBlock::text(s);
    }
    let Value::Object(obj) = value else {
        return ContentBlock::Json { data: value.clone(), text: None };
    };
    if obj.contains_key("type") {
        if let Ok(block) = serde_json::from_value::<ContentBlock>(value.clone()) {
            return block;
        }
    }
    if let Some(text) = obj.get("text").and_then(Value::as_str) {
        return ContentBlock::text(text);
    }
    if let Some(code) = obj.get("code").and_then(Value::as_str) {
        return ContentBlock::code(code, obj.get("language").and_then(Value::as_str).map(str::to_owned));
    }
    if obj.contains_key("url") || obj.contains_key("source") {
        return ContentBlock::Image { source: media_source(obj), alt_text: obj.get("alt_text").and_then(Value::as_str).map(str::to_owned) };
    }
    ContentBlock::Json { data: value.clone(), text: None }
}

/// Builds a block list from a `content` prop value (§6.1): a bare
/// string becomes one text block; an array maps each element.
pub fn blocks_from_prop_value(value: &Value) -> Vec<ContentBlock> {
    match value {
        Value::String(s) => vec![ContentBlock::text(s.clone())],
        Value::Array(items) => items.iter().map(json_value_to_block).collect(),
        Value::Null => Vec::new(),
        other => vec![json_value_to_block(other)],
    }
}
