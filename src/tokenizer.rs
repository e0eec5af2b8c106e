//! Markdown front-end: pulldown-cmark events flattened into the token stream.
//!
//! pulldown-cmark reports structure as nested `Start`/`End` events with
//! inline markup (emphasis, code spans) as separate events. The compiler
//! instead wants the flat stream described in [`crate::token`], with each
//! construct's text as one literal `Inline` payload whose emphasis markers
//! are still in markdown form (`**`, `*`, `` ` ``) for the downstream run
//! scanner. The [`Emitter`] does that flattening with a small frame stack of
//! text buffers.
//!
//! Image references never reach the token stream: they are extracted
//! separately from the raw markdown by [`extract_image_refs`] (resolution is
//! concurrent and cannot ride a sequential token walk), and the event
//! adapter drops image alt text so an image-only paragraph flattens to an
//! empty inline that the compiler skips.

use crate::pipeline::acquire::ImageRef;
use crate::token::{Token, TokenKind};
use once_cell::sync::Lazy;
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag};
use regex::Regex;

/// A markup front-end that produces the flat token stream.
pub trait Tokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token>;
}

/// CommonMark front-end with tables and strikethrough enabled.
///
/// Task-list syntax stays *disabled* so `[x]`/`[ ]` prefixes survive as
/// literal item text for the compiler's own task detection.
#[derive(Debug, Default)]
pub struct MarkdownTokenizer;

impl Tokenizer for MarkdownTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        let parser = Parser::new_ext(text, options);

        let mut emitter = Emitter::default();
        for event in parser {
            emitter.event(event);
        }
        emitter.tokens
    }
}

// ── Event flattening ─────────────────────────────────────────────────────

/// One text buffer on the emitter's stack.
#[derive(Debug)]
enum Frame {
    Heading { level: u8, buf: String },
    Paragraph { buf: String },
    /// The leading text of a list item, before any nested block. Emitted as
    /// a wrapped paragraph the moment a nested construct (or the item's
    /// end) arrives.
    ItemLead { buf: String },
    Cell { header: bool, buf: String },
    Code { info: String, buf: String },
}

impl Frame {
    fn buf_mut(&mut self) -> &mut String {
        match self {
            Frame::Heading { buf, .. }
            | Frame::Paragraph { buf }
            | Frame::ItemLead { buf }
            | Frame::Cell { buf, .. }
            | Frame::Code { buf, .. } => buf,
        }
    }
}

#[derive(Debug, Default)]
struct Emitter {
    tokens: Vec<Token>,
    stack: Vec<Frame>,
    /// Nesting depth of block quotes; paragraphs flushed while inside one
    /// carry the `"> "` prefix the model's quote detection looks for.
    quote_depth: usize,
    /// Inside the table's header row (`TableHead`), cells are `th`.
    table_head: bool,
    /// Depth of constructs whose inline text is dropped (image alt text).
    skip_depth: usize,
}

impl Emitter {
    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.push_text(&text),
            Event::Code(code) => {
                if self.skip_depth == 0 {
                    if let Some(frame) = self.stack.last_mut() {
                        let buf = frame.buf_mut();
                        buf.push('`');
                        buf.push_str(&code);
                        buf.push('`');
                    }
                }
            }
            Event::SoftBreak | Event::HardBreak => self.push_text(" "),
            // Raw HTML, rules and footnotes have no counterpart in the
            // output model.
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading(level, _, _) => self.stack.push(Frame::Heading {
                level: heading_level(level),
                buf: String::new(),
            }),
            Tag::Paragraph => {
                // A lead paragraph inside a list item reuses the item's
                // already-open frame instead of opening a second one.
                if !matches!(self.stack.last(), Some(Frame::ItemLead { buf }) if buf.is_empty()) {
                    self.stack.push(Frame::Paragraph { buf: String::new() });
                }
            }
            Tag::BlockQuote => self.quote_depth += 1,
            Tag::List(start) => {
                self.flush_item_lead();
                self.tokens.push(Token::marker(if start.is_some() {
                    TokenKind::OrderedListOpen
                } else {
                    TokenKind::BulletListOpen
                }));
            }
            Tag::Item => {
                self.tokens.push(Token::marker(TokenKind::ListItemOpen));
                self.stack.push(Frame::ItemLead { buf: String::new() });
            }
            Tag::CodeBlock(kind) => {
                let info = match kind {
                    CodeBlockKind::Fenced(info) => info.to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                self.stack.push(Frame::Code {
                    info,
                    buf: String::new(),
                });
            }
            Tag::Table(_) => self.tokens.push(Token::marker(TokenKind::TableOpen)),
            Tag::TableHead => {
                self.table_head = true;
                self.tokens.push(Token::marker(TokenKind::TrOpen));
            }
            Tag::TableRow => self.tokens.push(Token::marker(TokenKind::TrOpen)),
            Tag::TableCell => {
                let header = self.table_head;
                self.tokens.push(Token::marker(if header {
                    TokenKind::ThOpen
                } else {
                    TokenKind::TdOpen
                }));
                self.stack.push(Frame::Cell {
                    header,
                    buf: String::new(),
                });
            }
            Tag::Emphasis => self.push_text("*"),
            Tag::Strong => self.push_text("**"),
            Tag::Strikethrough => self.push_text("~~"),
            // Link text flows through; the destination is dropped.
            Tag::Link(..) => {}
            // Alt text would otherwise leak into the surrounding paragraph.
            Tag::Image(..) => self.skip_depth += 1,
            Tag::FootnoteDefinition(_) => {}
        }
    }

    fn end(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading(..) => {
                if let Some(Frame::Heading { level, buf }) = self.stack.pop() {
                    self.tokens.push(Token::heading_open(level));
                    self.tokens.push(Token::inline(buf));
                    self.tokens.push(Token::marker(TokenKind::HeadingClose));
                }
            }
            Tag::Paragraph => match self.stack.last() {
                // Lead paragraph of a list item.
                Some(Frame::ItemLead { .. }) => self.flush_item_lead(),
                Some(Frame::Paragraph { .. }) => {
                    if let Some(Frame::Paragraph { buf }) = self.stack.pop() {
                        let text = if self.quote_depth > 0 {
                            format!("> {buf}")
                        } else {
                            buf
                        };
                        self.tokens.push(Token::marker(TokenKind::ParagraphOpen));
                        self.tokens.push(Token::inline(text));
                        self.tokens.push(Token::marker(TokenKind::ParagraphClose));
                    }
                }
                _ => {}
            },
            Tag::BlockQuote => self.quote_depth = self.quote_depth.saturating_sub(1),
            Tag::List(start) => {
                self.tokens.push(Token::marker(if start.is_some() {
                    TokenKind::OrderedListClose
                } else {
                    TokenKind::BulletListClose
                }));
            }
            Tag::Item => {
                self.flush_item_lead();
                self.tokens.push(Token::marker(TokenKind::ListItemClose));
            }
            Tag::CodeBlock(_) => {
                if let Some(Frame::Code { info, buf }) = self.stack.pop() {
                    self.tokens.push(Token::fence(buf, info));
                }
            }
            Tag::Table(_) => self.tokens.push(Token::marker(TokenKind::TableClose)),
            Tag::TableHead => {
                self.table_head = false;
                self.tokens.push(Token::marker(TokenKind::TrClose));
            }
            Tag::TableRow => self.tokens.push(Token::marker(TokenKind::TrClose)),
            Tag::TableCell => {
                if let Some(Frame::Cell { header, buf }) = self.stack.pop() {
                    self.tokens.push(Token::inline(buf));
                    self.tokens.push(Token::marker(if header {
                        TokenKind::ThClose
                    } else {
                        TokenKind::TdClose
                    }));
                }
            }
            Tag::Emphasis => self.push_text("*"),
            Tag::Strong => self.push_text("**"),
            Tag::Strikethrough => self.push_text("~~"),
            Tag::Link(..) => {}
            Tag::Image(..) => self.skip_depth = self.skip_depth.saturating_sub(1),
            Tag::FootnoteDefinition(_) => {}
        }
    }

    fn push_text(&mut self, text: &str) {
        if self.skip_depth > 0 {
            return;
        }
        if let Some(frame) = self.stack.last_mut() {
            frame.buf_mut().push_str(text);
        }
    }

    /// If the top frame is a list item's lead text, emit it as a wrapped
    /// paragraph now. Called before any nested block inside the item and at
    /// the item's end, so the lead always precedes nested list tokens.
    fn flush_item_lead(&mut self) {
        if matches!(self.stack.last(), Some(Frame::ItemLead { .. })) {
            if let Some(Frame::ItemLead { buf }) = self.stack.pop() {
                self.tokens.push(Token::marker(TokenKind::ParagraphOpen));
                self.tokens.push(Token::inline(buf));
                self.tokens.push(Token::marker(TokenKind::ParagraphClose));
            }
        }
    }
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

// ── Image reference extraction ───────────────────────────────────────────

static IMAGE_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"!\[([^\]]*)\]\(([^)\s]+)(?:\s+"([^"]*)")?\)"#).expect("image ref regex")
});

/// Pull every `![alt](src "title")` reference out of raw markdown, in
/// document order. Runs on the source text (not the token stream) so
/// extraction and token compilation stay independent.
pub fn extract_image_refs(text: &str) -> Vec<ImageRef> {
    IMAGE_REF
        .captures_iter(text)
        .map(|caps| ImageRef {
            alt: caps[1].to_string(),
            src: caps[2].to_string(),
            title: caps.get(3).map(|m| m.as_str().to_string()),
        })
        .collect()
}
