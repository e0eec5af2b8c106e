//! Error types for the md2docx library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ConvertError`] — **Fatal**: the conversion cannot proceed at all
//!   (unreadable input, a tokenizer that broke its open/close contract, a
//!   serializer failure). Returned as `Err(ConvertError)` from the top-level
//!   `convert*` functions, wrapped with a stage-identifying message so the
//!   caller can tell parsing from generation from saving.
//!
//! * [`ImageError`] — **Non-fatal**: a single image reference failed
//!   (network, decode, read). Recovered locally as a visible placeholder
//!   block in the output document; the conversion always continues.
//!
//! Cache I/O failures form a third, invisible category: they are logged
//! inside [`crate::cache::CacheStore`] and surface only as cache misses.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the md2docx library.
///
/// Per-image failures use [`ImageError`] and become placeholder blocks
/// rather than propagating here.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Parsing errors ────────────────────────────────────────────────────
    /// The tokenizer broke its contract: an `_open` marker with no matching
    /// `_close` at the same depth, or a close with no open. The compiler
    /// does not attempt recovery; this indicates a broken tokenizer, not a
    /// malformed document.
    #[error("tokenizer contract violation: {detail}")]
    TokenizerContract { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not read the input markup file.
    #[error("failed to read input '{path}': {source}")]
    InputRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the output document file.
    #[error("failed to write output '{path}': {source}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Generation errors ─────────────────────────────────────────────────
    /// The serializer backend failed to produce output bytes.
    #[error("failed to serialize document: {detail}")]
    Serialization { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single image reference.
///
/// Resolution failures never abort the document: the pipeline synthesizes a
/// red, bold placeholder paragraph naming the failed source and keeps going.
#[derive(Debug, Error)]
pub enum ImageError {
    /// Network fetch exhausted all attempts.
    #[error("failed to download image '{url}' after {attempts} attempts: {reason}")]
    Download {
        url: String,
        attempts: u32,
        reason: String,
    },

    /// Inline data did not match the `data:image/<fmt>;base64,<payload>`
    /// shape, or the payload was not valid base64. Never retried.
    #[error("invalid inline image data: {reason}")]
    InvalidData { reason: String },

    /// Local file read failed.
    #[error("failed to read local image '{path}': {reason}")]
    Read { path: String, reason: String },

    /// The codec could not decode the fetched bytes.
    #[error("failed to decode image '{source}': {reason}")]
    Decode { source: String, reason: String },

    /// The codec could not re-encode the resized image.
    #[error("failed to encode image: {reason}")]
    Encode { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_display_names_source_and_cause() {
        let e = ImageError::Download {
            url: "https://example.com/a.png".into(),
            attempts: 3,
            reason: "connection refused".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("https://example.com/a.png"), "got: {msg}");
        assert!(msg.contains("3 attempts"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn contract_violation_display() {
        let e = ConvertError::TokenizerContract {
            detail: "heading never closed".into(),
        };
        assert!(e.to_string().contains("tokenizer contract violation"));
    }
}
