//! The document model: block nodes, inline runs, and the builder.
//!
//! A compiled document is an ordered sequence of [`BlockNode`]s owned by the
//! [`DocumentBuilder`]. Nodes are appended once and never mutated afterwards;
//! the only accumulation (multi-level list items) happens inside the compiler
//! before a `List` node is emitted.
//!
//! Inline emphasis lives here too: [`parse_inline_runs`] is the single
//! left-to-right scanner shared by paragraph, heading, list and table text.

/// A contiguous span of text sharing one combination of emphasis attributes.
///
/// Produced by [`parse_inline_runs`]. The `color` override is never set by
/// the scanner; it exists for synthetic runs (the image-failure placeholder,
/// task-item coloring) where a serializer must deviate from the style table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineRun {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub code: bool,
    /// RRGGBB hex override, or `None` to use the block's table style.
    pub color: Option<String>,
}

impl InlineRun {
    /// A plain run with no emphasis.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
            italic: false,
            code: false,
            color: None,
        }
    }
}

/// Scan a text span into inline runs.
///
/// Single left-to-right pass: a backtick toggles code-span state, a doubled
/// `*`/`_` toggles bold (consuming both characters), a single `*`/`_`
/// toggles italic. Every toggle flushes the accumulated run first.
/// Last-toggle-wins — there is no marker stack, so unterminated markers at
/// end-of-span simply leave their state open and the final flush emits the
/// remaining text as-is.
pub fn parse_inline_runs(text: &str) -> Vec<InlineRun> {
    let chars: Vec<char> = text.chars().collect();
    let mut runs = Vec::new();
    let mut buf = String::new();
    let (mut bold, mut italic, mut code) = (false, false, false);

    fn flush(runs: &mut Vec<InlineRun>, buf: &mut String, bold: bool, italic: bool, code: bool) {
        if !buf.is_empty() {
            runs.push(InlineRun {
                text: std::mem::take(buf),
                bold,
                italic,
                code,
                color: None,
            });
        }
    }

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '`' {
            flush(&mut runs, &mut buf, bold, italic, code);
            code = !code;
        } else if (c == '*' || c == '_') && chars.get(i + 1) == Some(&c) {
            flush(&mut runs, &mut buf, bold, italic, code);
            bold = !bold;
            i += 1;
        } else if c == '*' || c == '_' {
            flush(&mut runs, &mut buf, bold, italic, code);
            italic = !italic;
        } else {
            buf.push(c);
        }
        i += 1;
    }
    flush(&mut runs, &mut buf, bold, italic, code);
    runs
}

/// One item of a (possibly multi-level) list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    pub text: String,
    /// Nesting level, zero-based (top-level items are level 0).
    pub level: usize,
}

/// Format family of a transcoded image.
///
/// The transcoder preserves the source family where it recognizes one and
/// falls back to `Jpeg` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    WebP,
}

impl ImageKind {
    /// File extension without the dot.
    pub fn ext(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
            ImageKind::WebP => "webp",
        }
    }

    /// MIME type for data-URI embedding.
    pub fn mime(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
            ImageKind::WebP => "image/webp",
        }
    }

    /// Canonical name stored in cache metadata.
    pub fn as_str(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpeg",
            ImageKind::Png => "png",
            ImageKind::WebP => "webp",
        }
    }

    /// Parse a cache-metadata name back into a kind.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "jpeg" | "jpg" => Some(ImageKind::Jpeg),
            "png" => Some(ImageKind::Png),
            "webp" => Some(ImageKind::WebP),
            _ => None,
        }
    }
}

/// A resolved, transcoded image ready for embedding.
#[derive(Debug, Clone)]
pub struct ImageBlock {
    /// Display width in pixels (capped at the display ceiling).
    pub width: u32,
    /// Display height in pixels (scaled by the same ratio as the width).
    pub height: u32,
    /// Transcoded image bytes.
    pub bytes: Vec<u8>,
    pub format: ImageKind,
    /// Caption rendered under the image (the reference's title text).
    pub caption: Option<String>,
}

/// One top-level renderable unit of the output document.
#[derive(Debug, Clone)]
pub enum BlockNode {
    Heading {
        /// 1–6.
        level: u8,
        runs: Vec<InlineRun>,
    },
    Paragraph {
        runs: Vec<InlineRun>,
        /// Rendered indented, gray and italic.
        quote: bool,
    },
    List {
        items: Vec<ListItem>,
        ordered: bool,
    },
    TaskItem {
        text: String,
        checked: bool,
        level: usize,
    },
    CodeBlock {
        text: String,
        lang: String,
    },
    Table {
        /// Row-major cell text; the first row is styled as a header at
        /// render time only.
        rows: Vec<Vec<String>>,
    },
    Image(ImageBlock),
}

/// The finished document handed to a serializer.
#[derive(Debug, Clone)]
pub struct Document {
    pub blocks: Vec<BlockNode>,
    pub title: Option<String>,
    pub author: Option<String>,
}

/// Mutable ordered sequence of block nodes with append operations.
///
/// The builder owns the blocks exclusively; callers append through the
/// `push_*` methods and take the finished sequence with
/// [`DocumentBuilder::into_blocks`].
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    blocks: Vec<BlockNode>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks appended so far, in order.
    pub fn blocks(&self) -> &[BlockNode] {
        &self.blocks
    }

    pub fn into_blocks(self) -> Vec<BlockNode> {
        self.blocks
    }

    pub fn push_heading(&mut self, text: &str, level: u8) {
        self.blocks.push(BlockNode::Heading {
            level: level.clamp(1, 6),
            runs: parse_inline_runs(text),
        });
    }

    /// Append a paragraph. A `"> "` prefix marks a quote block; the prefix
    /// is stripped before inline parsing.
    pub fn push_paragraph(&mut self, text: &str) {
        let quote = text.starts_with("> ");
        let clean = if quote { &text[2..] } else { text };
        self.blocks.push(BlockNode::Paragraph {
            runs: parse_inline_runs(clean),
            quote,
        });
    }

    pub fn push_list(&mut self, items: Vec<ListItem>, ordered: bool) {
        if !items.is_empty() {
            self.blocks.push(BlockNode::List { items, ordered });
        }
    }

    pub fn push_task_item(&mut self, text: &str, checked: bool, level: usize) {
        self.blocks.push(BlockNode::TaskItem {
            text: text.to_string(),
            checked,
            level,
        });
    }

    pub fn push_code_block(&mut self, code: &str, lang: &str) {
        self.blocks.push(BlockNode::CodeBlock {
            text: code.to_string(),
            lang: lang.to_string(),
        });
    }

    pub fn push_table(&mut self, rows: Vec<Vec<String>>) {
        if !rows.is_empty() {
            self.blocks.push(BlockNode::Table { rows });
        }
    }

    pub fn push_image(&mut self, image: ImageBlock) {
        self.blocks.push(BlockNode::Image(image));
    }

    /// Append the synthetic placeholder for a failed image: a single red,
    /// bold run naming the source, in place of the image itself.
    pub fn push_image_failure(&mut self, label: &str) {
        self.blocks.push(BlockNode::Paragraph {
            runs: vec![InlineRun {
                text: format!("[Failed to load image: {label}]"),
                bold: true,
                italic: false,
                code: false,
                color: Some("FF0000".to_string()),
            }],
            quote: false,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emphasis_scan_produces_expected_runs() {
        let runs = parse_inline_runs("**bold** and *italic* and `code`");
        let texts: Vec<(&str, bool, bool, bool)> = runs
            .iter()
            .map(|r| (r.text.as_str(), r.bold, r.italic, r.code))
            .collect();
        assert_eq!(
            texts,
            vec![
                ("bold", true, false, false),
                (" and ", false, false, false),
                ("italic", false, true, false),
                (" and ", false, false, false),
                ("code", false, false, true),
            ]
        );
    }

    #[test]
    fn underscores_behave_like_asterisks() {
        let runs = parse_inline_runs("__bold__ _it_");
        assert_eq!(runs[0].text, "bold");
        assert!(runs[0].bold);
        assert_eq!(runs[2].text, "it");
        assert!(runs[2].italic);
    }

    #[test]
    fn unterminated_marker_flushes_as_open_state() {
        // No closing `**`: the scanner toggles bold and the remaining text is
        // emitted with the open state; the marker itself does not render.
        let runs = parse_inline_runs("plain **dangling");
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].text, "plain ");
        assert!(!runs[0].bold);
        assert_eq!(runs[1].text, "dangling");
        assert!(runs[1].bold);
    }

    #[test]
    fn empty_input_yields_no_runs() {
        assert!(parse_inline_runs("").is_empty());
    }

    #[test]
    fn quote_prefix_is_detected_and_stripped() {
        let mut builder = DocumentBuilder::new();
        builder.push_paragraph("> quoted words");
        match &builder.blocks()[0] {
            BlockNode::Paragraph { runs, quote } => {
                assert!(quote);
                assert_eq!(runs[0].text, "quoted words");
            }
            other => panic!("expected paragraph, got {other:?}"),
        }
    }

    #[test]
    fn image_failure_placeholder_is_bold_and_red() {
        let mut builder = DocumentBuilder::new();
        builder.push_image_failure("broken.png");
        match &builder.blocks()[0] {
            BlockNode::Paragraph { runs, quote } => {
                assert!(!quote);
                assert_eq!(runs.len(), 1);
                assert_eq!(runs[0].text, "[Failed to load image: broken.png]");
                assert!(runs[0].bold);
                assert_eq!(runs[0].color.as_deref(), Some("FF0000"));
            }
            other => panic!("expected paragraph, got {other:?}"),
        }
    }

    #[test]
    fn empty_lists_and_tables_are_not_appended() {
        let mut builder = DocumentBuilder::new();
        builder.push_list(Vec::new(), false);
        builder.push_table(Vec::new());
        assert!(builder.blocks().is_empty());
    }
}
