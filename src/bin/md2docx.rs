//! CLI binary for md2docx.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig`, runs the conversion with a spinner, and prints a
//! short summary.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use md2docx::{convert_to_file, CacheStore, ConversionConfig, HtmlPreviewSerializer};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

#[derive(Parser, Debug)]
#[command(
    name = "md2docx",
    version,
    about = "Convert Markdown files to rich documents with embedded images",
    long_about = "Convert Markdown into a rich document, resolving every image reference on \
the way: remote URLs are downloaded with retry, inline data URIs decoded, local files read. \
Images are resized, re-encoded and cached on disk; a broken reference becomes a visible \
placeholder instead of failing the conversion.",
    arg_required_else_help = true
)]
struct Cli {
    /// Input Markdown file.
    input: PathBuf,

    /// Output file path. Default: the input path with an `.html` extension.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Prepend a table of contents built from headings.
    #[arg(long)]
    toc: bool,

    /// Table-of-contents title.
    #[arg(long, default_value = "Contents")]
    toc_title: String,

    /// Maximum stored image width in pixels.
    #[arg(long, default_value_t = 800)]
    max_width: u32,

    /// JPEG re-encode quality (1-100).
    #[arg(long, default_value_t = 85)]
    quality: u8,

    /// Image cache directory. Default: a per-user directory under the
    /// system temp dir.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Number of images resolved concurrently.
    #[arg(long, default_value_t = 8)]
    concurrency: usize,

    /// Document title written into the output metadata.
    #[arg(long)]
    title: Option<String>,

    /// Document author written into the output metadata.
    #[arg(long)]
    author: Option<String>,

    /// Print cache statistics and exit.
    #[arg(long)]
    cache_stats: bool,

    /// Debug-level logging.
    #[arg(short, long)]
    verbose: bool,

    /// Errors only, no spinner.
    #[arg(short, long)]
    quiet: bool,
}

fn build_config(cli: &Cli) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .max_image_width(cli.max_width)
        .image_quality(cli.quality)
        .concurrency(cli.concurrency)
        .toc(cli.toc)
        .toc_title(cli.toc_title.clone());
    if let Some(dir) = &cli.cache_dir {
        builder = builder.cache_dir(dir.clone());
    }
    if let Some(title) = &cli.title {
        builder = builder.title(title.clone());
    }
    if let Some(author) = &cli.author {
        builder = builder.author(author.clone());
    }
    builder.build().context("Invalid configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner carries user feedback; library logs go to stderr only
    // when asked for.
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;

    // ── Cache stats mode ─────────────────────────────────────────────────
    if cli.cache_stats {
        let cache = CacheStore::open(
            &config.cache_dir,
            config.cache_max_age_ms,
            config.cache_max_size,
        )
        .await
        .context("Failed to open image cache")?;
        let stats = cache.stats().await;
        println!("Cache dir:    {}", config.cache_dir.display());
        println!("Entries:      {}", stats.item_count);
        println!(
            "Size:         {:.1} MB of {:.0} MB",
            stats.total_size as f64 / (1024.0 * 1024.0),
            stats.max_size as f64 / (1024.0 * 1024.0)
        );
        println!(
            "Max age:      {:.1} days",
            stats.max_age_ms as f64 / (24.0 * 60.0 * 60.0 * 1000.0)
        );
        return Ok(());
    }

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.input.with_extension("html"));

    let spinner = if cli.quiet {
        None
    } else {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(format!("Converting {}…", cli.input.display()));
        bar.enable_steady_tick(Duration::from_millis(80));
        Some(bar)
    };

    let result = convert_to_file(&cli.input, &output, &HtmlPreviewSerializer, &config).await;

    if let Some(bar) = &spinner {
        bar.finish_and_clear();
    }

    let out = result.context("Conversion failed")?;

    if !cli.quiet {
        let images = if out.stats.images_failed > 0 {
            red(&format!(
                "{} of {} images failed",
                out.stats.images_failed, out.stats.images_total
            ))
        } else {
            green(&format!("{} images", out.stats.images_total))
        };
        eprintln!(
            "{} {} → {}  ({} blocks, {}, {} ms)",
            green("✓"),
            bold(&cli.input.display().to_string()),
            output.display(),
            out.stats.blocks,
            images,
            out.stats.duration_ms
        );
    }
    Ok(())
}
