//! # md2docx
//!
//! Convert Markdown into a rich binary-document model, images included.
//!
//! ## Why this crate?
//!
//! Pasting Markdown into a word processor loses everything that makes the
//! source useful — emphasis, nested lists, task states, tables, and above
//! all the images. This crate compiles Markdown into a typed document model
//! and resolves every image reference along the way: remote URLs are
//! downloaded with retry, inline data URIs decoded, local files read; all
//! of them resized, re-encoded and cached on disk. A reference that cannot
//! be resolved becomes a visible placeholder in the document, never a
//! failed conversion.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Markdown
//!  │
//!  ├─ 1. Extract   image references pulled from the raw source
//!  ├─ 2. Tokenize  pulldown-cmark events flattened to open/close tokens
//!  ├─ 3. Resolve   all images concurrently: cache → fetch → transcode
//!  ├─ 4. Compile   tokens → typed block nodes (lists, tables, tasks, …)
//!  └─ 5. Serialize document model → output bytes (HTML preview built in)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use md2docx::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let output = convert("# Hello\n\n![logo](https://example.com/logo.png)\n", &config).await?;
//!     eprintln!(
//!         "{} blocks, {} images ({} failed)",
//!         output.stats.blocks,
//!         output.stats.images_total,
//!         output.stats.images_failed
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `md2docx` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only
//! deps:
//! ```toml
//! md2docx = { version = "0.4", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cache;
pub mod compiler;
pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod serialize;
pub mod styles;
pub mod toc;
pub mod token;
pub mod tokenizer;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cache::{CacheStats, CacheStore};
pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use convert::{convert, convert_sync, convert_to_file, ConversionOutput, ConversionStats};
pub use error::{ConvertError, ImageError};
pub use model::{BlockNode, Document, DocumentBuilder, ImageBlock, ImageKind, InlineRun};
pub use serialize::{DocumentSerializer, HtmlPreviewSerializer};
pub use styles::{StyleSheet, TextStyle};
pub use tokenizer::{extract_image_refs, MarkdownTokenizer, Tokenizer};
