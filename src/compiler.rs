//! Single-pass compiler from the flat token stream to the document model.
//!
//! The stream encodes nesting implicitly: paired open/close markers plus the
//! convention that a construct's text travels in an [`TokenKind::Inline`]
//! token inside its pair. Rather than chasing literal array offsets, the
//! compiler works through a [`TokenCursor`] whose methods name semantic
//! roles — "the text of the construct just opened", "the cells of this table
//! row" — so the logic survives a tokenizer that interleaves different
//! auxiliary tokens.
//!
//! ## List flattening
//!
//! Items accumulate (text + level) until the *outermost* list closes, then
//! flush grouped by ascending level: all level-0 items as one `List` block,
//! then all level-1 items, and so on. This deliberately does not reproduce
//! strict document order across mixed nesting depths — positional fidelity
//! is traded for simple level-grouped rendering, and downstream consumers
//! rely on that grouping. Relative order *within* a level is preserved.
//!
//! Task items (`[ ]` / `[x]` prefixed) bypass accumulation entirely and are
//! emitted in place the moment their item is seen.

use crate::error::ConvertError;
use crate::model::{DocumentBuilder, ListItem};
use crate::token::{Token, TokenKind};
use once_cell::sync::Lazy;
use regex::Regex;

/// Compile a token stream into the builder's block sequence.
///
/// # Errors
/// Returns [`ConvertError::TokenizerContract`] when open/close pairing is
/// violated — the stream ends inside an open construct, a close arrives
/// without its open, or a heading open marker carries no parsable level.
pub fn compile(tokens: &[Token], builder: &mut DocumentBuilder) -> Result<(), ConvertError> {
    let mut cur = TokenCursor::new(tokens);
    let mut state = ScanState::default();

    while let Some(tok) = cur.advance() {
        match tok.kind {
            TokenKind::HeadingOpen => {
                let level = tok.heading_level().ok_or_else(|| {
                    ConvertError::TokenizerContract {
                        detail: format!("heading open marker with unusable tag {:?}", tok.tag),
                    }
                })?;
                let text = cur.open_text(TokenKind::HeadingClose, "heading")?;
                builder.push_heading(&text, level);
            }

            TokenKind::ParagraphOpen => {
                let text = cur.open_text(TokenKind::ParagraphClose, "paragraph")?;
                if !text.is_empty() {
                    builder.push_paragraph(&text);
                }
            }

            TokenKind::BulletListOpen | TokenKind::OrderedListOpen => {
                state.depth += 1;
                if state.items.is_empty() {
                    state.ordered = tok.kind == TokenKind::OrderedListOpen;
                }
            }

            TokenKind::ListItemOpen => {
                if let Some(text) = cur.list_item_text()? {
                    if text.is_empty() {
                        continue;
                    }
                    let level = state.depth.saturating_sub(1);
                    if let Some((checked, rest)) = parse_task_marker(&text) {
                        builder.push_task_item(&rest, checked, level);
                    } else {
                        state.items.push(ListItem { text, level });
                    }
                }
            }

            TokenKind::BulletListClose | TokenKind::OrderedListClose => {
                if state.depth == 0 {
                    return Err(ConvertError::TokenizerContract {
                        detail: "list close marker without a matching open".into(),
                    });
                }
                state.depth -= 1;
                if state.depth == 0 {
                    state.flush_lists(builder);
                }
            }

            TokenKind::Fence => {
                builder.push_code_block(
                    tok.content.as_deref().unwrap_or(""),
                    tok.info.as_deref().unwrap_or(""),
                );
            }

            TokenKind::TableOpen => state.rows.clear(),

            TokenKind::TrOpen => {
                let row = cur.table_row()?;
                state.rows.push(row);
            }

            TokenKind::TableClose => {
                builder.push_table(std::mem::take(&mut state.rows));
            }

            // Structural noise at the top level: close markers whose opens
            // were consumed by a lookahead, stray inline tokens, cell
            // markers outside a row scan.
            _ => {}
        }
    }

    if state.depth != 0 {
        return Err(ConvertError::TokenizerContract {
            detail: format!("stream ended with {} unclosed list(s)", state.depth),
        });
    }
    Ok(())
}

// ── Scan state ───────────────────────────────────────────────────────────

/// The compiler's four pieces of mutable scan state.
#[derive(Debug, Default)]
struct ScanState {
    /// Current list nesting depth.
    depth: usize,
    /// Items accumulated since the last outermost list close.
    items: Vec<ListItem>,
    /// Orderedness of the active list run, recorded from the first open
    /// marker seen while the buffer was empty.
    ordered: bool,
    /// Rows of the table currently being scanned.
    rows: Vec<Vec<String>>,
}

impl ScanState {
    /// Flush accumulated items grouped by ascending level: one `List` block
    /// per populated level, relative order within each level preserved.
    fn flush_lists(&mut self, builder: &mut DocumentBuilder) {
        let items = std::mem::take(&mut self.items);
        if items.is_empty() {
            return;
        }
        let max_level = items.iter().map(|it| it.level).max().unwrap_or(0);
        for level in 0..=max_level {
            let group: Vec<ListItem> = items
                .iter()
                .filter(|it| it.level == level)
                .cloned()
                .collect();
            builder.push_list(group, self.ordered);
        }
    }
}

// ── Task markers ─────────────────────────────────────────────────────────

static TASK_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[([ xX])\]\s*(.*)$").expect("task marker regex"));

/// Split a `[ ]`/`[x]` task prefix off an item's text.
///
/// Returns `(checked, remaining_text)`, or `None` for ordinary items.
/// The bracket content is case-insensitive.
fn parse_task_marker(text: &str) -> Option<(bool, String)> {
    let caps = TASK_MARKER.captures(text)?;
    let checked = caps[1].eq_ignore_ascii_case("x");
    Some((checked, caps[2].to_string()))
}

// ── Cursor ───────────────────────────────────────────────────────────────

/// Forward-only cursor over the token stream with semantic lookahead.
struct TokenCursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> TokenCursor<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let tok = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(tok)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.tokens.get(self.pos).map(|t| t.kind)
    }

    /// Text of the construct whose open marker was just consumed: scan
    /// forward to the construct's `Inline` token, then consume through the
    /// matching close marker.
    fn open_text(&mut self, close: TokenKind, what: &str) -> Result<String, ConvertError> {
        let mut text = String::new();
        loop {
            match self.advance() {
                Some(tok) if tok.kind == close => return Ok(text),
                Some(tok) if tok.kind == TokenKind::Inline && text.is_empty() => {
                    text = tok.content.clone().unwrap_or_default();
                }
                Some(_) => {}
                None => {
                    return Err(ConvertError::TokenizerContract {
                        detail: format!("{what} never closed before end of stream"),
                    })
                }
            }
        }
    }

    /// Text of the list item whose open marker was just consumed.
    ///
    /// The item's text is carried either by a wrapped paragraph (the common
    /// tokenizer shape: `list_item_open, paragraph_open, inline, …`) or by a
    /// bare inline token. An item that starts with a nested list or closes
    /// immediately has no own text; the cursor is left untouched so the
    /// nested tokens are processed by the main loop.
    fn list_item_text(&mut self) -> Result<Option<String>, ConvertError> {
        match self.peek_kind() {
            Some(TokenKind::ParagraphOpen) => {
                self.pos += 1;
                self.open_text(TokenKind::ParagraphClose, "list item").map(Some)
            }
            Some(TokenKind::Inline) => {
                let tok = self.advance().expect("peeked inline token");
                Ok(Some(tok.content.clone().unwrap_or_default()))
            }
            _ => Ok(None),
        }
    }

    /// Cells of the table row whose open marker was just consumed: collect
    /// the inline text following every `th`/`td` open marker until the row
    /// closes, leaving the cursor just past the close.
    fn table_row(&mut self) -> Result<Vec<String>, ConvertError> {
        let mut row = Vec::new();
        loop {
            match self.advance() {
                Some(tok) if tok.kind == TokenKind::TrClose => return Ok(row),
                Some(tok)
                    if tok.kind == TokenKind::ThOpen || tok.kind == TokenKind::TdOpen =>
                {
                    // The cell's inline content immediately follows its open
                    // marker; an empty cell may omit it.
                    if self.peek_kind() == Some(TokenKind::Inline) {
                        let inline = self.advance().expect("peeked inline token");
                        row.push(inline.content.clone().unwrap_or_default());
                    } else {
                        row.push(String::new());
                    }
                }
                Some(_) => {}
                None => {
                    return Err(ConvertError::TokenizerContract {
                        detail: "table row never closed before end of stream".into(),
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BlockNode;
    use crate::token::{Token, TokenKind::*};

    fn compiled(tokens: &[Token]) -> Vec<BlockNode> {
        let mut builder = DocumentBuilder::new();
        compile(tokens, &mut builder).expect("compile");
        builder.into_blocks()
    }

    fn item(text: &str) -> Vec<Token> {
        vec![
            Token::marker(ListItemOpen),
            Token::marker(ParagraphOpen),
            Token::inline(text),
            Token::marker(ParagraphClose),
            Token::marker(ListItemClose),
        ]
    }

    #[test]
    fn heading_and_paragraph() {
        let tokens = vec![
            Token::heading_open(2),
            Token::inline("Title **here**"),
            Token::marker(HeadingClose),
            Token::marker(ParagraphOpen),
            Token::inline("body"),
            Token::marker(ParagraphClose),
        ];
        let blocks = compiled(&tokens);
        assert_eq!(blocks.len(), 2);
        match &blocks[0] {
            BlockNode::Heading { level, runs } => {
                assert_eq!(*level, 2);
                assert_eq!(runs[1].text, "here");
                assert!(runs[1].bold);
            }
            other => panic!("expected heading, got {other:?}"),
        }
    }

    #[test]
    fn empty_paragraphs_are_skipped() {
        let tokens = vec![
            Token::marker(ParagraphOpen),
            Token::inline(""),
            Token::marker(ParagraphClose),
        ];
        assert!(compiled(&tokens).is_empty());
    }

    #[test]
    fn mixed_levels_group_into_one_list_block_per_level() {
        // Levels [0, 1, 0, 1] — one top-level list with a nested list per
        // item. The buffer flushes grouped by level: exactly two blocks.
        let mut tokens = vec![Token::marker(BulletListOpen)];
        tokens.extend(item("a0"));
        tokens.push(Token::marker(BulletListOpen));
        tokens.extend(item("a1"));
        tokens.push(Token::marker(BulletListClose));
        tokens.extend(item("b0"));
        tokens.push(Token::marker(BulletListOpen));
        tokens.extend(item("b1"));
        tokens.push(Token::marker(BulletListClose));
        tokens.push(Token::marker(BulletListClose));

        let blocks = compiled(&tokens);
        assert_eq!(blocks.len(), 2, "got: {blocks:?}");
        match (&blocks[0], &blocks[1]) {
            (
                BlockNode::List { items: l0, ordered: o0 },
                BlockNode::List { items: l1, .. },
            ) => {
                assert!(!o0);
                let t0: Vec<&str> = l0.iter().map(|i| i.text.as_str()).collect();
                let t1: Vec<&str> = l1.iter().map(|i| i.text.as_str()).collect();
                assert_eq!(t0, vec!["a0", "b0"]);
                assert_eq!(t1, vec!["a1", "b1"]);
                assert!(l0.iter().all(|i| i.level == 0));
                assert!(l1.iter().all(|i| i.level == 1));
            }
            other => panic!("expected two lists, got {other:?}"),
        }
    }

    #[test]
    fn ordered_flag_comes_from_the_opening_marker() {
        let mut tokens = vec![Token::marker(OrderedListOpen)];
        tokens.extend(item("first"));
        tokens.extend(item("second"));
        tokens.push(Token::marker(OrderedListClose));
        let blocks = compiled(&tokens);
        match &blocks[0] {
            BlockNode::List { ordered, items } => {
                assert!(ordered);
                assert_eq!(items.len(), 2);
            }
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn task_items_bypass_list_accumulation() {
        let mut tokens = vec![Token::marker(BulletListOpen)];
        tokens.extend(item("[x] Done"));
        tokens.extend(item("[ ] Todo"));
        tokens.extend(item("plain"));
        tokens.push(Token::marker(BulletListClose));

        let blocks = compiled(&tokens);
        assert_eq!(blocks.len(), 3);
        match &blocks[0] {
            BlockNode::TaskItem { text, checked, level } => {
                assert_eq!(text, "Done");
                assert!(checked);
                assert_eq!(*level, 0);
            }
            other => panic!("expected task item, got {other:?}"),
        }
        match &blocks[1] {
            BlockNode::TaskItem { text, checked, .. } => {
                assert_eq!(text, "Todo");
                assert!(!checked);
            }
            other => panic!("expected task item, got {other:?}"),
        }
        match &blocks[2] {
            BlockNode::List { items, .. } => assert_eq!(items[0].text, "plain"),
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn uppercase_task_marker_counts_as_checked() {
        assert_eq!(parse_task_marker("[X] shouty"), Some((true, "shouty".into())));
        assert_eq!(parse_task_marker("no marker"), None);
    }

    #[test]
    fn table_rows_collect_literally() {
        let tokens = vec![
            Token::marker(TableOpen),
            Token::marker(TrOpen),
            Token::marker(ThOpen),
            Token::inline("H1"),
            Token::marker(ThClose),
            Token::marker(ThOpen),
            Token::inline("H2"),
            Token::marker(ThClose),
            Token::marker(TrClose),
            Token::marker(TrOpen),
            Token::marker(TdOpen),
            Token::inline("A"),
            Token::marker(TdClose),
            Token::marker(TdOpen),
            Token::inline("B"),
            Token::marker(TdClose),
            Token::marker(TrClose),
            Token::marker(TableClose),
        ];
        let blocks = compiled(&tokens);
        match &blocks[0] {
            BlockNode::Table { rows } => {
                assert_eq!(
                    rows,
                    &vec![
                        vec!["H1".to_string(), "H2".to_string()],
                        vec!["A".to_string(), "B".to_string()],
                    ]
                );
            }
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn fence_emits_code_block() {
        let tokens = vec![Token::fence("fn main() {}\n", "rust")];
        let blocks = compiled(&tokens);
        match &blocks[0] {
            BlockNode::CodeBlock { text, lang } => {
                assert_eq!(text, "fn main() {}\n");
                assert_eq!(lang, "rust");
            }
            other => panic!("expected code block, got {other:?}"),
        }
    }

    #[test]
    fn unbalanced_list_close_is_a_contract_violation() {
        let tokens = vec![Token::marker(BulletListClose)];
        let mut builder = DocumentBuilder::new();
        let err = compile(&tokens, &mut builder).unwrap_err();
        assert!(matches!(err, ConvertError::TokenizerContract { .. }));
    }

    #[test]
    fn unterminated_heading_is_a_contract_violation() {
        let tokens = vec![Token::heading_open(1), Token::inline("dangling")];
        let mut builder = DocumentBuilder::new();
        let err = compile(&tokens, &mut builder).unwrap_err();
        assert!(matches!(err, ConvertError::TokenizerContract { .. }));
    }

    #[test]
    fn unclosed_list_at_end_of_stream_is_a_contract_violation() {
        let mut tokens = vec![Token::marker(BulletListOpen)];
        tokens.extend(item("orphan"));
        let mut builder = DocumentBuilder::new();
        let err = compile(&tokens, &mut builder).unwrap_err();
        assert!(matches!(err, ConvertError::TokenizerContract { .. }));
    }
}
