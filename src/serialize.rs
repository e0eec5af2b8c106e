//! Serializer backends: a document model in, output bytes out.
//!
//! The [`DocumentSerializer`] trait is the seam between the conversion
//! pipeline and any concrete output format. The built-in backend is the
//! HTML preview — a single self-contained file with every image embedded as
//! a data URI, so the rendered result of a conversion can be inspected in a
//! browser without unpacking anything.

use crate::error::ConvertError;
use crate::model::{BlockNode, Document, ImageBlock, InlineRun};
use crate::pipeline::transcode::display_size;
use crate::styles::{StyleSheet, TextStyle};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use html_escape::{encode_double_quoted_attribute, encode_text};
use std::fmt::Write;

/// A backend that turns the finished document into output bytes.
pub trait DocumentSerializer {
    fn serialize(&self, document: &Document, styles: &StyleSheet)
        -> Result<Vec<u8>, ConvertError>;
}

/// Self-contained HTML rendering of the document.
///
/// Styling comes from the [`StyleSheet`] (sizes converted from half-points
/// to CSS points); images are embedded as base64 data URIs at their display
/// geometry.
#[derive(Debug, Default)]
pub struct HtmlPreviewSerializer;

impl DocumentSerializer for HtmlPreviewSerializer {
    fn serialize(
        &self,
        document: &Document,
        styles: &StyleSheet,
    ) -> Result<Vec<u8>, ConvertError> {
        let mut out = String::new();
        render(&mut out, document, styles).map_err(|err| ConvertError::Serialization {
            detail: format!("html rendering failed: {err}"),
        })?;
        Ok(out.into_bytes())
    }
}

fn render(out: &mut String, document: &Document, styles: &StyleSheet) -> std::fmt::Result {
    let title = document.title.as_deref().unwrap_or("Document");
    writeln!(out, "<!DOCTYPE html>")?;
    writeln!(out, "<html lang=\"en\">")?;
    writeln!(out, "<head>")?;
    writeln!(out, "<meta charset=\"utf-8\">")?;
    writeln!(out, "<title>{}</title>", encode_text(title))?;
    if let Some(author) = &document.author {
        writeln!(
            out,
            "<meta name=\"author\" content=\"{}\">",
            encode_double_quoted_attribute(author)
        )?;
    }
    write_css(out, styles)?;
    writeln!(out, "</head>")?;
    writeln!(out, "<body>")?;
    for block in &document.blocks {
        write_block(out, block, styles)?;
    }
    writeln!(out, "</body>")?;
    writeln!(out, "</html>")?;
    Ok(())
}

fn write_css(out: &mut String, styles: &StyleSheet) -> std::fmt::Result {
    writeln!(out, "<style>")?;
    writeln!(
        out,
        "body {{ {} max-width: 760px; margin: 2em auto; padding: 0 1em; }}",
        css_text(&styles.body)
    )?;
    for level in 1..=6u8 {
        writeln!(out, "h{level} {{ {} }}", css_text(styles.heading(level)))?;
    }
    writeln!(
        out,
        "pre, code {{ {} background: #f5f5f5; }}",
        css_text(&styles.code)
    )?;
    writeln!(out, "pre {{ padding: 0.8em; overflow-x: auto; }}")?;
    writeln!(
        out,
        "table {{ border-collapse: collapse; }} th, td {{ {} border: 1px solid #999; padding: 0.3em 0.6em; }}",
        css_text(&styles.table)
    )?;
    writeln!(
        out,
        "blockquote {{ {} font-style: italic; border-left: 3px solid #ccc; margin-left: 0; padding-left: 1em; }}",
        css_text(&styles.quote)
    )?;
    writeln!(out, "figcaption {{ {} }}", css_text(&styles.caption))?;
    writeln!(out, "</style>")
}

/// Half-point sizes become CSS points.
fn css_text(style: &TextStyle) -> String {
    format!(
        "font-family: '{}'; font-size: {}pt; color: #{};",
        style.font,
        style.size as f32 / 2.0,
        style.color
    )
}

fn write_block(out: &mut String, block: &BlockNode, styles: &StyleSheet) -> std::fmt::Result {
    match block {
        BlockNode::Heading { level, runs } => {
            write!(out, "<h{level}>")?;
            write_runs(out, runs)?;
            writeln!(out, "</h{level}>")
        }
        BlockNode::Paragraph { runs, quote } => {
            let tag = if *quote { "blockquote" } else { "p" };
            write!(out, "<{tag}>")?;
            write_runs(out, runs)?;
            writeln!(out, "</{tag}>")
        }
        BlockNode::List { items, ordered } => {
            let tag = if *ordered { "ol" } else { "ul" };
            // Items in one block share a level; indent the whole list.
            let indent = items.first().map(|it| it.level).unwrap_or(0);
            writeln!(out, "<{tag} style=\"margin-left: {}em;\">", indent * 2)?;
            for item in items {
                write!(out, "<li>")?;
                write_runs(out, &crate::model::parse_inline_runs(&item.text))?;
                writeln!(out, "</li>")?;
            }
            writeln!(out, "</{tag}>")
        }
        BlockNode::TaskItem {
            text,
            checked,
            level,
        } => {
            let glyph = if *checked { "\u{2611}" } else { "\u{2610}" };
            let color = if *checked {
                styles.task_checked_color
            } else {
                styles.task_unchecked_color
            };
            writeln!(
                out,
                "<p style=\"margin-left: {}em; color: #{color};\">{glyph} {}</p>",
                level * 2,
                encode_text(text)
            )
        }
        BlockNode::CodeBlock { text, lang } => {
            if lang.is_empty() {
                write!(out, "<pre><code>")?;
            } else {
                write!(
                    out,
                    "<pre><code class=\"language-{}\">",
                    encode_double_quoted_attribute(lang)
                )?;
            }
            write!(out, "{}", encode_text(text))?;
            writeln!(out, "</code></pre>")
        }
        BlockNode::Table { rows } => {
            writeln!(out, "<table>")?;
            for (row_idx, row) in rows.iter().enumerate() {
                let cell = if row_idx == 0 { "th" } else { "td" };
                write!(out, "<tr>")?;
                for text in row {
                    write!(out, "<{cell}>{}</{cell}>", encode_text(text))?;
                }
                writeln!(out, "</tr>")?;
            }
            writeln!(out, "</table>")
        }
        BlockNode::Image(image) => write_image(out, image),
    }
}

fn write_image(out: &mut String, image: &ImageBlock) -> std::fmt::Result {
    let (width, height) = display_size(image.width, image.height);
    writeln!(out, "<figure>")?;
    writeln!(
        out,
        "<img src=\"data:{};base64,{}\" width=\"{width}\" height=\"{height}\" alt=\"\">",
        image.format.mime(),
        BASE64.encode(&image.bytes)
    )?;
    if let Some(caption) = &image.caption {
        writeln!(out, "<figcaption>{}</figcaption>", encode_text(caption))?;
    }
    writeln!(out, "</figure>")
}

fn write_runs(out: &mut String, runs: &[InlineRun]) -> std::fmt::Result {
    for run in runs {
        let mut close = Vec::new();
        if let Some(color) = &run.color {
            write!(out, "<span style=\"color: #{color};\">")?;
            close.push("</span>");
        }
        if run.bold {
            write!(out, "<strong>")?;
            close.push("</strong>");
        }
        if run.italic {
            write!(out, "<em>")?;
            close.push("</em>");
        }
        if run.code {
            write!(out, "<code>")?;
            close.push("</code>");
        }
        write!(out, "{}", encode_text(&run.text))?;
        for tag in close.iter().rev() {
            write!(out, "{tag}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DocumentBuilder, ImageKind};

    fn html_of(blocks: Vec<BlockNode>) -> String {
        let doc = Document {
            blocks,
            title: Some("T".to_string()),
            author: Some("A".to_string()),
        };
        let bytes = HtmlPreviewSerializer
            .serialize(&doc, &StyleSheet::default())
            .unwrap();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn emphasis_runs_render_as_nested_tags() {
        let mut b = DocumentBuilder::new();
        b.push_paragraph("**bold** and `code`");
        let html = html_of(b.into_blocks());
        assert!(html.contains("<strong>bold</strong>"), "got: {html}");
        assert!(html.contains("<code>code</code>"));
    }

    #[test]
    fn text_is_escaped() {
        let mut b = DocumentBuilder::new();
        b.push_paragraph("a < b & c");
        let html = html_of(b.into_blocks());
        assert!(html.contains("a &lt; b &amp; c"), "got: {html}");
    }

    #[test]
    fn failure_placeholder_renders_red_and_bold() {
        let mut b = DocumentBuilder::new();
        b.push_image_failure("broken.png");
        let html = html_of(b.into_blocks());
        assert!(html.contains("color: #FF0000"));
        assert!(html.contains("<strong>[Failed to load image: broken.png]</strong>"));
    }

    #[test]
    fn image_embeds_as_data_uri_at_display_size() {
        let html = html_of(vec![BlockNode::Image(ImageBlock {
            width: 1200,
            height: 600,
            bytes: vec![1, 2, 3],
            format: ImageKind::Png,
            caption: Some("A caption".to_string()),
        })]);
        assert!(html.contains("data:image/png;base64,AQID"));
        assert!(html.contains("width=\"600\" height=\"300\""), "got: {html}");
        assert!(html.contains("<figcaption>A caption</figcaption>"));
    }

    #[test]
    fn first_table_row_is_the_header() {
        let html = html_of(vec![BlockNode::Table {
            rows: vec![
                vec!["H".to_string()],
                vec!["v".to_string()],
            ],
        }]);
        assert!(html.contains("<th>H</th>"));
        assert!(html.contains("<td>v</td>"));
    }

    #[test]
    fn task_items_use_checkbox_glyphs_and_state_colors() {
        let mut b = DocumentBuilder::new();
        b.push_task_item("Done", true, 0);
        b.push_task_item("Todo", false, 1);
        let html = html_of(b.into_blocks());
        assert!(html.contains("\u{2611} Done"));
        assert!(html.contains("\u{2610} Todo"));
        assert!(html.contains("#008000"));
        assert!(html.contains("#FF0000"));
    }

    #[test]
    fn document_metadata_lands_in_the_head() {
        let html = html_of(Vec::new());
        assert!(html.contains("<title>T</title>"));
        assert!(html.contains("name=\"author\" content=\"A\""));
    }
}
