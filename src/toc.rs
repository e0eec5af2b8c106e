//! Table-of-contents generation from the compiled block sequence.
//!
//! The TOC is just more blocks: a bold title paragraph followed by one
//! list whose items are the collected heading texts, indented one level
//! shallower than their heading level. Serializer backends need no TOC
//! awareness at all.

use crate::model::{BlockNode, DocumentBuilder, ListItem};

/// One heading captured for the table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub text: String,
    /// Heading level, 1–6.
    pub level: u8,
}

/// Collect headings up to `max_level`, in document order. Heading text is
/// the concatenation of its runs with emphasis flattened away.
pub fn collect_headings(blocks: &[BlockNode], max_level: u8) -> Vec<TocEntry> {
    blocks
        .iter()
        .filter_map(|block| match block {
            BlockNode::Heading { level, runs } if *level <= max_level => Some(TocEntry {
                text: runs.iter().map(|r| r.text.as_str()).collect(),
                level: *level,
            }),
            _ => None,
        })
        .collect()
}

/// Build the TOC blocks: a bold title paragraph plus one unordered list of
/// entries, each at list level `heading_level - 1`.
pub fn toc_blocks(entries: &[TocEntry], title: &str) -> Vec<BlockNode> {
    if entries.is_empty() {
        return Vec::new();
    }
    let mut builder = DocumentBuilder::new();
    builder.push_paragraph(&format!("**{title}**"));
    builder.push_list(
        entries
            .iter()
            .map(|e| ListItem {
                text: e.text.clone(),
                level: e.level.saturating_sub(1) as usize,
            })
            .collect(),
        false,
    );
    builder.into_blocks()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DocumentBuilder;

    fn sample_blocks() -> Vec<BlockNode> {
        let mut b = DocumentBuilder::new();
        b.push_heading("One **strong**", 1);
        b.push_paragraph("body");
        b.push_heading("Two", 2);
        b.push_heading("Deep", 4);
        b.into_blocks()
    }

    #[test]
    fn collects_headings_up_to_the_level_cap() {
        let entries = collect_headings(&sample_blocks(), 3);
        assert_eq!(
            entries,
            vec![
                TocEntry { text: "One strong".into(), level: 1 },
                TocEntry { text: "Two".into(), level: 2 },
            ]
        );
    }

    #[test]
    fn toc_blocks_are_a_title_paragraph_and_one_list() {
        let entries = collect_headings(&sample_blocks(), 3);
        let blocks = toc_blocks(&entries, "Contents");
        assert_eq!(blocks.len(), 2);
        match &blocks[0] {
            BlockNode::Paragraph { runs, .. } => {
                assert_eq!(runs[0].text, "Contents");
                assert!(runs[0].bold);
            }
            other => panic!("expected paragraph, got {other:?}"),
        }
        match &blocks[1] {
            BlockNode::List { items, ordered } => {
                assert!(!ordered);
                assert_eq!(items[0].level, 0);
                assert_eq!(items[1].level, 1);
            }
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn no_headings_means_no_toc_blocks() {
        assert!(toc_blocks(&[], "Contents").is_empty());
    }
}
