#![deny(missing_docs)]
//! Token Annotator (C8): stamps a [`pc_core::CompiledStructure`] with
//! estimated token costs (§4.8).
//!
//! Annotation is a pure, optional post-pass over whatever `pc-collector`
//! produced — it never changes content, only adds `tokens`/`total_tokens`
//! fields. With no estimator supplied, `annotate` is a no-op and every
//! cost field stays `None` (§8 invariant 8).

use pc_core::{CompiledStructure, ContentBlock, ToolResultContent};

/// Per-message overhead added on top of a message's own block costs (§6.4).
pub const MESSAGE_OVERHEAD: u64 = 4;

/// Flat cost charged for an image block, regardless of size (§6.4).
pub const IMAGE_OVERHEAD: u64 = 85;

/// Estimates how many tokens a string costs.
///
/// A trait rather than a bare closure type so a host can plug in a
/// real tokenizer (tiktoken, sentencepiece, …) without this crate
/// needing to depend on one (§6.4, "obtained from the COM").
pub trait TokenEstimator: Send + Sync {
    /// Estimate the token cost of `text`.
    fn estimate(&self, text: &str) -> u64;
}

impl<F: Fn(&str) -> u64 + Send + Sync> TokenEstimator for F {
    fn estimate(&self, text: &str) -> u64 {
        self(text)
    }
}

/// The default estimator: `ceil(length(s) / 4)` (§4.8, "Default
/// estimator contract"), a common rough-character-per-token heuristic
/// used when the host hasn't wired in a real tokenizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEstimator;

impl TokenEstimator for DefaultEstimator {
    fn estimate(&self, text: &str) -> u64 {
        let len = text.chars().count() as u64;
        len.div_ceil(4)
    }
}

fn block_cost(block: &ContentBlock, estimator: &dyn TokenEstimator) -> u64 {
    match block {
        ContentBlock::Text { text, .. } => estimator.estimate(text),
        ContentBlock::Code { text, .. } => estimator.estimate(text),
        ContentBlock::Json { data, text } => match text {
            Some(t) => estimator.estimate(t),
            None => estimator.estimate(&serde_json::to_string(data).unwrap_or_default()),
        },
        ContentBlock::ToolUse { name, input, .. } => {
            let encoded = serde_json::to_string(input).unwrap_or_default();
            estimator.estimate(&format!("{name}{encoded}"))
        }
        ContentBlock::ToolResult { content, .. } => match content {
            ToolResultContent::Text(s) => estimator.estimate(s),
            ToolResultContent::Blocks(blocks) => blocks.iter().map(|b| block_cost(b, estimator)).sum(),
        },
        ContentBlock::Image { .. } => IMAGE_OVERHEAD,
        // Unknown/unlisted block kinds (§4.8: "unknown → estimator(JSON-encoding of block)"),
        // including any future `#[non_exhaustive]` additions.
        other => estimator.estimate(&serde_json::to_string(other).unwrap_or_default()),
    }
}

fn blocks_cost(blocks: &[ContentBlock], estimator: &dyn TokenEstimator) -> u64 {
    blocks.iter().map(|b| block_cost(b, estimator)).sum()
}

/// Annotate `compiled` in place with token costs (§4.8).
///
/// With `estimator = None`, this is a no-op: no `.tokens` field is
/// touched and `total_tokens` stays `None` (§8 invariant 8). Re-running
/// with the same estimator on an already-annotated structure reproduces
/// the same totals (§8 invariant 7), since this only ever overwrites
/// `tokens`/`total_tokens`, never reads them.
pub fn annotate(compiled: &mut CompiledStructure, estimator: Option<&dyn TokenEstimator>) {
    let Some(estimator) = estimator else {
        return;
    };

    let mut total = 0u64;

    for section in compiled.sections.values_mut() {
        let cost = blocks_cost(&section.content, estimator) + MESSAGE_OVERHEAD;
        section.tokens = Some(cost);
        total += cost;
    }

    for entry in &mut compiled.timeline_entries {
        let cost = blocks_cost(&entry.message.content, estimator) + MESSAGE_OVERHEAD;
        entry.tokens = Some(cost);
        total += cost;
    }

    for item in &mut compiled.system_message_items {
        if let pc_core::SystemItem::Message { content, .. } = item {
            total += blocks_cost(content, estimator) + MESSAGE_OVERHEAD;
        }
    }

    for ephemeral in &compiled.ephemeral {
        // Ephemerals contribute to the total but never receive a
        // stamped `tokens` field of their own (§4.8).
        total += blocks_cost(&ephemeral.content, estimator);
    }

    compiled.total_tokens = Some(total);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pc_core::{EphemeralItem, EphemeralPosition, Message, Role, Section, SystemItem, TimelineEntry};

    fn text_section(id: &str, text: &str) -> Section {
        Section {
            id: id.to_owned(),
            title: None,
            content: vec![ContentBlock::text(text)],
            formatter: None,
            visibility: None,
            audience: None,
            tags: Vec::new(),
            metadata: Default::default(),
            tokens: None,
        }
    }

    #[test]
    fn default_estimator_rounds_up_quarter_character_length() {
        assert_eq!(DefaultEstimator.estimate("Hello World"), 3); // ceil(11/4)
        assert_eq!(DefaultEstimator.estimate(""), 0);
        assert_eq!(DefaultEstimator.estimate("abcd"), 1);
        assert_eq!(DefaultEstimator.estimate("abcde"), 2);
    }

    #[test]
    fn section_tokens_are_block_sum_plus_overhead() {
        let mut compiled = CompiledStructure::default();
        compiled.sections.insert("test".into(), text_section("test", "Hello World"));

        annotate(&mut compiled, Some(&DefaultEstimator));

        let expected = DefaultEstimator.estimate("Hello World") + MESSAGE_OVERHEAD;
        assert_eq!(compiled.sections["test"].tokens, Some(expected));
        assert_eq!(compiled.total_tokens, Some(expected));
    }

    #[test]
    fn mixed_content_section_charges_flat_image_overhead() {
        let mut compiled = CompiledStructure::default();
        let section = Section {
            content: vec![
                ContentBlock::text("Hello World"),
                ContentBlock::code("x = 1", Some("py".into())),
                ContentBlock::Image { source: pc_core::MediaSource::Url { url: "https://img.png".into() }, alt_text: None },
            ],
            ..text_section("mixed", "")
        };
        compiled.sections.insert("mixed".into(), section);

        annotate(&mut compiled, Some(&DefaultEstimator));

        let expected = DefaultEstimator.estimate("Hello World") + DefaultEstimator.estimate("x = 1") + IMAGE_OVERHEAD + MESSAGE_OVERHEAD;
        assert_eq!(compiled.sections["mixed"].tokens, Some(expected));
    }

    #[test]
    fn multi_block_timeline_entry_sums_all_blocks() {
        let mut compiled = CompiledStructure::default();
        compiled.timeline_entries.push(TimelineEntry {
            message: Message {
                role: Role::User,
                content: vec![ContentBlock::text("First block"), ContentBlock::text("Second block")],
                id: None,
                metadata: Default::default(),
                created_at: None,
            },
            formatter: None,
            id: None,
            visibility: None,
            tags: Vec::new(),
            metadata: Default::default(),
            tokens: None,
        });

        annotate(&mut compiled, Some(&DefaultEstimator));

        let expected =
            DefaultEstimator.estimate("First block") + DefaultEstimator.estimate("Second block") + MESSAGE_OVERHEAD;
        assert_eq!(compiled.timeline_entries[0].tokens, Some(expected));
    }

    #[test]
    fn custom_estimator_is_honored() {
        let mut compiled = CompiledStructure::default();
        compiled.sections.insert("s".into(), text_section("s", "Hello"));

        let doubling = |s: &str| (s.chars().count() as u64) * 2;
        annotate(&mut compiled, Some(&doubling));

        assert_eq!(compiled.sections["s"].tokens, Some(10 + MESSAGE_OVERHEAD));
        assert_eq!(compiled.total_tokens, Some(14));
    }

    #[test]
    fn no_estimator_means_no_annotation() {
        let mut compiled = CompiledStructure::default();
        compiled.sections.insert("s".into(), text_section("s", "Hello"));
        compiled.ephemeral.push(EphemeralItem { content: vec![ContentBlock::text("x")], position: EphemeralPosition::Flow, order: 0 });

        annotate(&mut compiled, None);

        assert_eq!(compiled.sections["s"].tokens, None);
        assert_eq!(compiled.total_tokens, None);
    }

    #[test]
    fn system_message_items_contribute_to_total_without_their_own_field() {
        let mut compiled = CompiledStructure::default();
        compiled.system_message_items.push(SystemItem::Message { content: vec![ContentBlock::text("abcd")], index: 0, formatter: None });

        annotate(&mut compiled, Some(&DefaultEstimator));

        assert_eq!(compiled.total_tokens, Some(1 + MESSAGE_OVERHEAD));
    }

    #[test]
    fn annotation_is_idempotent_with_a_pure_estimator() {
        let mut compiled = CompiledStructure::default();
        compiled.sections.insert("s".into(), text_section("s", "Hello World"));

        annotate(&mut compiled, Some(&DefaultEstimator));
        let first = compiled.total_tokens;
        annotate(&mut compiled, Some(&DefaultEstimator));
        assert_eq!(compiled.total_tokens, first);
    }
}
