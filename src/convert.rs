//! Top-level conversion entry points.
//!
//! [`convert`] runs the whole pipeline on a markdown string: extract image
//! references, resolve them all concurrently, tokenize, compile, and
//! assemble the finished [`Document`]. [`convert_to_file`] wraps that with
//! input reading, a serializer backend and an atomic output write;
//! [`convert_sync`] is the blocking shim for callers without a runtime.
//!
//! Resolved images are appended ahead of the compiled text blocks, and a
//! failed image becomes a visible placeholder paragraph in the same slot —
//! image trouble shapes the document, it never aborts the conversion.

use crate::cache::CacheStore;
use crate::compiler::compile;
use crate::config::ConversionConfig;
use crate::error::ConvertError;
use crate::model::{Document, DocumentBuilder, ImageBlock};
use crate::pipeline::acquire::http_client;
use crate::pipeline::resolve::resolve_all;
use crate::pipeline::transcode::display_size;
use crate::serialize::DocumentSerializer;
use crate::styles::StyleSheet;
use crate::tokenizer::{extract_image_refs, MarkdownTokenizer, Tokenizer};
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Counters from one conversion run.
#[derive(Debug, Clone, Copy)]
pub struct ConversionStats {
    /// Top-level blocks in the finished document.
    pub blocks: usize,
    /// Image references found in the source.
    pub images_total: usize,
    /// References that ended as failure placeholders.
    pub images_failed: usize,
    pub duration_ms: u64,
}

/// A finished conversion: the document plus its run counters.
#[derive(Debug)]
pub struct ConversionOutput {
    pub document: Document,
    pub stats: ConversionStats,
}

/// Convert a markdown string into a document model.
pub async fn convert(
    markdown: &str,
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConvertError> {
    let started = Instant::now();

    let refs = extract_image_refs(markdown);
    let tokens = MarkdownTokenizer.tokenize(markdown);
    info!(
        tokens = tokens.len(),
        images = refs.len(),
        "parsed markdown source"
    );

    let cache = CacheStore::open(&config.cache_dir, config.cache_max_age_ms, config.cache_max_size)
        .await
        .map_err(|err| ConvertError::Internal(format!("failed to open image cache: {err}")))?;
    let client = http_client(config.download_timeout_secs)
        .map_err(|err| ConvertError::Internal(format!("failed to build http client: {err}")))?;

    let outcomes = resolve_all(&refs, &client, &cache, config).await;

    let mut builder = DocumentBuilder::new();
    let mut failed = 0usize;
    for outcome in outcomes {
        match outcome.result {
            Ok(image) => {
                let (width, height) = display_size(image.width, image.height);
                builder.push_image(ImageBlock {
                    width,
                    height,
                    bytes: image.bytes,
                    format: image.format,
                    caption: outcome
                        .reference
                        .title
                        .as_deref()
                        .filter(|t| !t.is_empty())
                        .map(str::to_string),
                });
            }
            Err(err) => {
                warn!(source = %outcome.reference.src, error = %err, "image failed");
                builder.push_image_failure(outcome.reference.label());
                failed += 1;
            }
        }
    }
    if !refs.is_empty() {
        info!(
            succeeded = refs.len() - failed,
            failed, "image processing complete"
        );
    }

    compile(&tokens, &mut builder)?;

    let mut blocks = builder.into_blocks();
    if config.toc {
        let entries = crate::toc::collect_headings(&blocks, config.toc_max_level);
        let mut front = crate::toc::toc_blocks(&entries, &config.toc_title);
        front.append(&mut blocks);
        blocks = front;
    }

    let stats = ConversionStats {
        blocks: blocks.len(),
        images_total: refs.len(),
        images_failed: failed,
        duration_ms: started.elapsed().as_millis() as u64,
    };
    info!(
        blocks = stats.blocks,
        duration_ms = stats.duration_ms,
        "conversion complete"
    );

    Ok(ConversionOutput {
        document: Document {
            blocks,
            title: config.title.clone(),
            author: config.author.clone(),
        },
        stats,
    })
}

/// Convert a markdown file and write the serialized document to `output`.
///
/// The write is atomic: bytes land in a temporary file next to the target
/// and are renamed into place, so a crash never leaves a half-written
/// output.
pub async fn convert_to_file(
    input: &Path,
    output: &Path,
    serializer: &dyn DocumentSerializer,
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConvertError> {
    let markdown =
        tokio::fs::read_to_string(input)
            .await
            .map_err(|source| ConvertError::InputRead {
                path: input.to_path_buf(),
                source,
            })?;

    let out = convert(&markdown, config).await?;
    let bytes = serializer.serialize(&out.document, &StyleSheet::default())?;

    let parent = output.parent().unwrap_or_else(|| Path::new("."));
    let write = || -> std::io::Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(&bytes)?;
        tmp.flush()?;
        tmp.persist(output).map_err(|err| err.error)?;
        Ok(())
    };
    write().map_err(|source| ConvertError::OutputWrite {
        path: output.to_path_buf(),
        source,
    })?;

    info!(output = %output.display(), size = bytes.len(), "wrote output document");
    Ok(out)
}

/// Blocking wrapper around [`convert_to_file`] for synchronous callers.
pub fn convert_sync(
    input: &Path,
    output: &Path,
    serializer: &dyn DocumentSerializer,
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConvertError> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|err| ConvertError::Internal(format!("failed to start runtime: {err}")))?;
    runtime.block_on(convert_to_file(input, output, serializer, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BlockNode;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> ConversionConfig {
        ConversionConfig::builder()
            .cache_dir(dir.path().join("cache"))
            .fetch_attempts(1)
            .retry_step_ms(1)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn plain_document_converts_without_images() {
        let dir = TempDir::new().unwrap();
        let out = convert("# Title\n\nsome text\n", &config_in(&dir))
            .await
            .unwrap();
        assert_eq!(out.stats.blocks, 2);
        assert_eq!(out.stats.images_total, 0);
        assert!(matches!(out.document.blocks[0], BlockNode::Heading { .. }));
    }

    #[tokio::test]
    async fn failed_image_becomes_a_placeholder_not_an_error() {
        let dir = TempDir::new().unwrap();
        let out = convert("![gone](/missing/pic.png)\n\ntext\n", &config_in(&dir))
            .await
            .unwrap();
        assert_eq!(out.stats.images_failed, 1);
        match &out.document.blocks[0] {
            BlockNode::Paragraph { runs, .. } => {
                assert_eq!(runs[0].text, "[Failed to load image: gone]");
            }
            other => panic!("expected placeholder, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn toc_is_prepended_when_enabled() {
        let dir = TempDir::new().unwrap();
        let config = ConversionConfig::builder()
            .cache_dir(dir.path().join("cache"))
            .toc(true)
            .build()
            .unwrap();
        let out = convert("# One\n\n## Two\n", &config).await.unwrap();
        // Title paragraph, TOC list, then the two headings.
        assert_eq!(out.document.blocks.len(), 4);
        match &out.document.blocks[1] {
            BlockNode::List { items, .. } => {
                assert_eq!(items[0].text, "One");
                assert_eq!(items[1].text, "Two");
            }
            other => panic!("expected toc list, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_input_file_is_an_input_read_error() {
        let dir = TempDir::new().unwrap();
        let err = convert_to_file(
            Path::new("/no/such/input.md"),
            &dir.path().join("out.html"),
            &crate::serialize::HtmlPreviewSerializer,
            &config_in(&dir),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ConvertError::InputRead { .. }));
    }
}
