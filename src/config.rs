//! Configuration types for Markdown-to-document conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across tasks and to diff two runs to understand
//! why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A dozen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::ConvertError;
use std::path::PathBuf;

/// Configuration for a single conversion run.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use md2docx::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .max_image_width(1200)
///     .concurrency(4)
///     .toc(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ConversionConfig {
    /// Maximum transcoded image width in pixels. Default: 800.
    ///
    /// Wider source images are resized down proportionally before embedding;
    /// images are never enlarged. 800 px comfortably exceeds the display
    /// ceiling while keeping embedded blob sizes small.
    pub max_image_width: u32,

    /// JPEG re-encode quality, 1–100. Default: 85.
    ///
    /// Applies to the jpeg family (and to the jpeg fallback for unrecognized
    /// formats). PNG and WebP are re-encoded losslessly, so the setting has
    /// no effect on them.
    pub image_quality: u8,

    /// Directory holding the image cache (index file + blob per key).
    /// Default: `<system temp dir>/md2docx-cache`.
    pub cache_dir: PathBuf,

    /// Cache entry time-to-live in milliseconds. Default: 7 days.
    ///
    /// Entries older than this are treated as misses on lookup and removed.
    /// Timestamps are fixed at creation — a cache hit does not refresh them.
    pub cache_max_age_ms: u64,

    /// Total cache size ceiling in bytes. Default: 500 MB.
    ///
    /// After every write the store evicts oldest-first until back under the
    /// ceiling.
    pub cache_max_size: u64,

    /// Network fetch attempts per image. Default: 3.
    ///
    /// Backoff between attempts is linear: the wait before attempt *n* is
    /// `n * retry_step_ms`. Only network fetches retry; malformed inline
    /// data and missing local files fail immediately.
    pub fetch_attempts: u32,

    /// Linear backoff step in milliseconds. Default: 1000.
    pub retry_step_ms: u64,

    /// Per-request download timeout in seconds. Default: 30.
    pub download_timeout_secs: u64,

    /// Number of image resolutions in flight at once. Default: 8.
    ///
    /// All queued references are dispatched together and settle
    /// independently; a slow or failing fetch never delays the others.
    pub concurrency: usize,

    /// Prepend a table of contents built from headings. Default: false.
    pub toc: bool,

    /// Table-of-contents title. Default: "Contents".
    pub toc_title: String,

    /// Deepest heading level included in the TOC. Default: 3.
    pub toc_max_level: u8,

    /// Document title carried through to serializers.
    pub title: Option<String>,

    /// Document author carried through to serializers.
    pub author: Option<String>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            max_image_width: 800,
            image_quality: 85,
            cache_dir: std::env::temp_dir().join("md2docx-cache"),
            cache_max_age_ms: 7 * 24 * 60 * 60 * 1000,
            cache_max_size: 500 * 1024 * 1024,
            fetch_attempts: 3,
            retry_step_ms: 1000,
            download_timeout_secs: 30,
            concurrency: 8,
            toc: false,
            toc_title: "Contents".to_string(),
            toc_max_level: 3,
            title: None,
            author: None,
        }
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn max_image_width(mut self, px: u32) -> Self {
        self.config.max_image_width = px.max(16);
        self
    }

    pub fn image_quality(mut self, q: u8) -> Self {
        self.config.image_quality = q.clamp(1, 100);
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cache_dir = dir.into();
        self
    }

    pub fn cache_max_age_ms(mut self, ms: u64) -> Self {
        self.config.cache_max_age_ms = ms;
        self
    }

    pub fn cache_max_size(mut self, bytes: u64) -> Self {
        self.config.cache_max_size = bytes;
        self
    }

    pub fn fetch_attempts(mut self, n: u32) -> Self {
        self.config.fetch_attempts = n.max(1);
        self
    }

    pub fn retry_step_ms(mut self, ms: u64) -> Self {
        self.config.retry_step_ms = ms;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn toc(mut self, enabled: bool) -> Self {
        self.config.toc = enabled;
        self
    }

    pub fn toc_title(mut self, title: impl Into<String>) -> Self {
        self.config.toc_title = title.into();
        self
    }

    pub fn toc_max_level(mut self, level: u8) -> Self {
        self.config.toc_max_level = level.clamp(1, 6);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.config.author = Some(author.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, ConvertError> {
        let c = &self.config;
        if c.max_image_width < 16 {
            return Err(ConvertError::InvalidConfig(format!(
                "max_image_width must be ≥ 16, got {}",
                c.max_image_width
            )));
        }
        if c.image_quality == 0 || c.image_quality > 100 {
            return Err(ConvertError::InvalidConfig(format!(
                "image_quality must be 1–100, got {}",
                c.image_quality
            )));
        }
        if c.fetch_attempts == 0 {
            return Err(ConvertError::InvalidConfig(
                "fetch_attempts must be ≥ 1".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(ConvertError::InvalidConfig(
                "concurrency must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_clamps_out_of_range_values() {
        let config = ConversionConfig::builder()
            .image_quality(250)
            .concurrency(0)
            .max_image_width(1)
            .build()
            .unwrap();
        assert_eq!(config.image_quality, 100);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.max_image_width, 16);
    }

    #[test]
    fn defaults_are_valid() {
        assert!(ConversionConfig::builder().build().is_ok());
    }
}
