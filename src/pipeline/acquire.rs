//! Stage one of the image pipeline: turning a reference into raw bytes.
//!
//! A reference's source string picks one of three acquisition paths:
//! * `http://` / `https://` — download, retrying with linear backoff;
//! * `data:image/...;base64,` — decode inline, never retried;
//! * anything else — read as a local file path, never retried.
//!
//! Retry only makes sense for the network path: malformed inline data and a
//! missing file will not improve on a second look.

use crate::config::ConversionConfig;
use crate::error::ImageError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::{debug, warn};

/// One `![alt](src "title")` reference pulled from the source markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub src: String,
    pub alt: String,
    pub title: Option<String>,
}

impl ImageRef {
    /// Human-readable name for logs and the failure placeholder: the alt
    /// text when present, the source string otherwise.
    pub fn label(&self) -> &str {
        if self.alt.is_empty() {
            &self.src
        } else {
            &self.alt
        }
    }
}

/// Acquisition path for a reference, decided by source-string prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    Url,
    Data,
    Local,
}

/// Classify a source string. Anything that is neither an HTTP(S) URL nor an
/// inline image data URI is treated as a local path.
pub fn classify(src: &str) -> ImageSource {
    if src.starts_with("http://") || src.starts_with("https://") {
        ImageSource::Url
    } else if src.starts_with("data:image/") {
        ImageSource::Data
    } else {
        ImageSource::Local
    }
}

/// Shared HTTP client for all downloads of one conversion.
///
/// Some image hosts reject clients without a browser-like user agent.
pub fn http_client(timeout_secs: u64) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent("Mozilla/5.0 (compatible; md2docx)")
        .build()
}

/// Download a URL, retrying up to `config.fetch_attempts` times.
///
/// The wait before attempt *n* (zero-based) is `n * retry_step_ms` — no
/// wait before the first attempt, one step before the second, two before
/// the third. A non-2xx status counts as a failed attempt like a transport
/// error does.
pub async fn fetch_url(
    client: &reqwest::Client,
    url: &str,
    config: &ConversionConfig,
) -> Result<Vec<u8>, ImageError> {
    let mut last_reason = String::new();
    for attempt in 0..config.fetch_attempts {
        if attempt > 0 {
            let wait = Duration::from_millis(attempt as u64 * config.retry_step_ms);
            debug!(url, attempt, wait_ms = wait.as_millis() as u64, "retrying download");
            tokio::time::sleep(wait).await;
        }
        match client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.bytes().await {
                Ok(bytes) => {
                    debug!(url, size = bytes.len(), "downloaded image");
                    return Ok(bytes.to_vec());
                }
                Err(err) => last_reason = format!("body read failed: {err}"),
            },
            Ok(resp) => last_reason = format!("HTTP {}", resp.status()),
            Err(err) => last_reason = err.to_string(),
        }
        warn!(url, attempt = attempt + 1, reason = %last_reason, "download attempt failed");
    }
    Err(ImageError::Download {
        url: url.to_string(),
        attempts: config.fetch_attempts,
        reason: last_reason,
    })
}

static DATA_URI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^data:image/([a-zA-Z+]+);base64,(.+)$").expect("data uri regex"));

/// Decode an inline `data:image/<fmt>;base64,<payload>` source.
///
/// Whitespace anywhere in the string is stripped before matching (markdown
/// wrapping inserts line breaks into long URIs). Returns the normalized
/// (whitespace-free) source string, which doubles as the cache identifier,
/// together with the decoded bytes.
pub fn decode_data_uri(src: &str) -> Result<(String, Vec<u8>), ImageError> {
    let normalized: String = src.chars().filter(|c| !c.is_whitespace()).collect();
    let caps = DATA_URI
        .captures(&normalized)
        .ok_or_else(|| ImageError::InvalidData {
            reason: "not a base64 image data URI".to_string(),
        })?;
    let bytes = BASE64
        .decode(&caps[2])
        .map_err(|err| ImageError::InvalidData {
            reason: format!("base64 decode failed: {err}"),
        })?;
    Ok((normalized, bytes))
}

/// Read a local image file. No retry: the path either resolves or it does
/// not.
pub async fn read_local(path: &str) -> Result<Vec<u8>, ImageError> {
    tokio::fs::read(path).await.map_err(|err| ImageError::Read {
        path: path.to_string(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_picks_the_right_path() {
        assert_eq!(classify("https://example.com/a.png"), ImageSource::Url);
        assert_eq!(classify("http://example.com/a.png"), ImageSource::Url);
        assert_eq!(classify("data:image/png;base64,AAAA"), ImageSource::Data);
        assert_eq!(classify("images/local.png"), ImageSource::Local);
        assert_eq!(classify("/abs/path.jpg"), ImageSource::Local);
    }

    #[test]
    fn label_prefers_alt_text() {
        let with_alt = ImageRef {
            src: "a.png".into(),
            alt: "A chart".into(),
            title: None,
        };
        assert_eq!(with_alt.label(), "A chart");
        let without = ImageRef {
            src: "a.png".into(),
            alt: String::new(),
            title: None,
        };
        assert_eq!(without.label(), "a.png");
    }

    #[test]
    fn data_uri_round_trips_payload() {
        let payload = BASE64.encode(b"hello");
        let src = format!("data:image/png;base64,{payload}");
        let (normalized, bytes) = decode_data_uri(&src).unwrap();
        assert_eq!(normalized, src);
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn data_uri_whitespace_is_normalized_away() {
        let payload = BASE64.encode(b"hello");
        let (head, tail) = payload.split_at(4);
        let src = format!("data:image/png;base64,{head}\n  {tail}");
        let (normalized, bytes) = decode_data_uri(&src).unwrap();
        assert!(!normalized.contains(char::is_whitespace));
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn malformed_data_uri_is_invalid_data() {
        assert!(matches!(
            decode_data_uri("data:image/png;base64,!!!not-base64!!!"),
            Err(ImageError::InvalidData { .. })
        ));
        assert!(matches!(
            decode_data_uri("data:text/plain;base64,AAAA"),
            Err(ImageError::InvalidData { .. })
        ));
    }

    #[tokio::test]
    async fn missing_local_file_is_a_read_error() {
        let err = read_local("/definitely/not/here.png").await.unwrap_err();
        match err {
            ImageError::Read { path, .. } => assert_eq!(path, "/definitely/not/here.png"),
            other => panic!("expected read error, got {other}"),
        }
    }

    #[tokio::test]
    async fn exhausted_download_reports_attempts_and_reason() {
        // Unroutable port on localhost: connection refused immediately.
        let config = crate::config::ConversionConfig::builder()
            .fetch_attempts(2)
            .retry_step_ms(1)
            .download_timeout_secs(2)
            .build()
            .unwrap();
        let client = http_client(config.download_timeout_secs).unwrap();
        let err = fetch_url(&client, "http://127.0.0.1:1/x.png", &config)
            .await
            .unwrap_err();
        match err {
            ImageError::Download { attempts, url, .. } => {
                assert_eq!(attempts, 2);
                assert_eq!(url, "http://127.0.0.1:1/x.png");
            }
            other => panic!("expected download error, got {other}"),
        }
    }
}
