//! The flat token stream the compiler consumes.
//!
//! Tokenizers produce an ordered, non-recursive sequence of [`Token`]s where
//! structural nesting is encoded entirely by paired `*Open`/`*Close` kinds.
//! The text of a heading, paragraph or list item travels in a separate
//! [`TokenKind::Inline`] token inside the construct's open/close pair.
//!
//! The contract: every open marker has a matching later close marker at the
//! same depth. The compiler surfaces violations as
//! [`crate::error::ConvertError::TokenizerContract`] rather than recovering —
//! a broken pairing means a broken tokenizer, not a malformed document.

/// Kind of one token in the flat stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    HeadingOpen,
    HeadingClose,
    ParagraphOpen,
    ParagraphClose,
    /// Carries the literal text content of the enclosing construct.
    Inline,
    /// A fenced or indented code block; content and language hint travel on
    /// this single token, never on a surrounding pair.
    Fence,
    BulletListOpen,
    BulletListClose,
    OrderedListOpen,
    OrderedListClose,
    ListItemOpen,
    ListItemClose,
    TableOpen,
    TableClose,
    TrOpen,
    TrClose,
    ThOpen,
    ThClose,
    TdOpen,
    TdClose,
}

/// One token of the flat stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// HTML-ish tag name, e.g. `"h2"` on a heading open marker.
    pub tag: Option<String>,
    /// Literal text for `Inline` and `Fence` tokens.
    pub content: Option<String>,
    /// Language hint on `Fence` tokens (the string after the opening fence).
    pub info: Option<String>,
}

impl Token {
    /// A bare structural marker with no payload.
    pub fn marker(kind: TokenKind) -> Self {
        Self {
            kind,
            tag: None,
            content: None,
            info: None,
        }
    }

    /// A heading open marker for the given level (tagged `h1`–`h6`).
    pub fn heading_open(level: u8) -> Self {
        Self {
            kind: TokenKind::HeadingOpen,
            tag: Some(format!("h{}", level.clamp(1, 6))),
            content: None,
            info: None,
        }
    }

    /// An inline text token.
    pub fn inline(text: impl Into<String>) -> Self {
        Self {
            kind: TokenKind::Inline,
            tag: None,
            content: Some(text.into()),
            info: None,
        }
    }

    /// A code fence token.
    pub fn fence(content: impl Into<String>, info: impl Into<String>) -> Self {
        Self {
            kind: TokenKind::Fence,
            tag: None,
            content: Some(content.into()),
            info: Some(info.into()),
        }
    }

    /// Heading level parsed from the `h<N>` tag of a heading open marker.
    pub fn heading_level(&self) -> Option<u8> {
        let tag = self.tag.as_deref()?;
        tag.strip_prefix('h')?.parse().ok().filter(|l| (1..=6).contains(l))
    }
}
