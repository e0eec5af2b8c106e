//! Static style table consulted by serializer backends.
//!
//! One [`StyleSheet`] maps every block kind (heading levels 1–6, paragraph,
//! code, table, quote, caption, task items) to a `{font, size, color}`
//! triple. The table is consulted, never mutated — theming beyond swapping
//! in a different `StyleSheet` value is a non-goal.
//!
//! Sizes are in half-points (`24` = 12 pt), the unit binary document
//! formats use natively, so serializers can pass them through unchanged.

/// Font, size and color for one kind of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextStyle {
    /// Font family name.
    pub font: &'static str,
    /// Size in half-points (24 = 12 pt).
    pub size: u32,
    /// RRGGBB hex color, no leading `#`.
    pub color: &'static str,
}

/// The full style lookup table for one conversion.
#[derive(Debug, Clone)]
pub struct StyleSheet {
    /// Body paragraph text.
    pub body: TextStyle,
    /// Heading styles, indexed by level 1–6 via [`StyleSheet::heading`].
    pub headings: [TextStyle; 6],
    /// Monospace code spans and fenced code blocks.
    pub code: TextStyle,
    /// Table cell text.
    pub table: TextStyle,
    /// Block quotes: gray, italic at render time.
    pub quote: TextStyle,
    /// Image captions (the title text of an image reference).
    pub caption: TextStyle,
    /// Color of a completed task item's text.
    pub task_checked_color: &'static str,
    /// Color of a pending task item's text.
    pub task_unchecked_color: &'static str,
    /// Color of the synthetic image-failure placeholder.
    pub failure_color: &'static str,
    /// Table-of-contents entry text.
    pub toc: TextStyle,
}

impl StyleSheet {
    /// Style for a heading level, clamped to 1–6.
    pub fn heading(&self, level: u8) -> &TextStyle {
        let idx = level.clamp(1, 6) as usize - 1;
        &self.headings[idx]
    }
}

impl Default for StyleSheet {
    fn default() -> Self {
        const BODY: TextStyle = TextStyle {
            font: "Calibri",
            size: 24,
            color: "000000",
        };
        Self {
            body: BODY,
            headings: [
                TextStyle { font: "Cambria", size: 36, color: "000000" },
                TextStyle { font: "Cambria", size: 32, color: "000000" },
                TextStyle { font: "Cambria", size: 28, color: "000000" },
                TextStyle { font: "Cambria", size: 24, color: "000000" },
                TextStyle { font: "Cambria", size: 24, color: "000000" },
                TextStyle { font: "Cambria", size: 24, color: "000000" },
            ],
            code: TextStyle {
                font: "Consolas",
                size: 21,
                color: "000000",
            },
            table: TextStyle {
                font: "Calibri",
                size: 21,
                color: "000000",
            },
            quote: TextStyle {
                font: "Calibri",
                size: 24,
                color: "666666",
            },
            caption: TextStyle {
                font: "Calibri",
                size: 21,
                color: "666666",
            },
            task_checked_color: "008000",
            task_unchecked_color: "FF0000",
            failure_color: "FF0000",
            toc: BODY,
        }
    }
}
