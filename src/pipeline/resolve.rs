//! Stage three of the image pipeline: cache-aware, concurrent resolution.
//!
//! [`resolve_all`] dispatches every reference at once through a bounded
//! concurrent stream and lets each settle independently — one slow host or
//! dead link never delays or aborts the others. Each outcome carries its
//! original position so results come back in document order regardless of
//! completion order.
//!
//! The cache is consulted *before* any fetch, keyed on the source
//! identifier itself, so a hit skips the network and the transcoder
//! entirely.

use crate::cache::{CacheStore, ImageMeta};
use crate::config::ConversionConfig;
use crate::error::ImageError;
use crate::model::ImageKind;
use crate::pipeline::acquire::{
    classify, decode_data_uri, fetch_url, read_local, ImageRef, ImageSource,
};
use crate::pipeline::transcode::{probe, transcode, TranscodedImage};
use futures::stream::{self, StreamExt};
use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// The settled result for one reference, tagged with its document position.
#[derive(Debug)]
pub struct ImageOutcome {
    /// Zero-based position of the reference in the source document.
    pub index: usize,
    pub reference: ImageRef,
    pub result: Result<TranscodedImage, ImageError>,
}

/// Resolve every reference concurrently (at most `config.concurrency` in
/// flight) and return the settled outcomes in document order.
pub async fn resolve_all(
    refs: &[ImageRef],
    client: &reqwest::Client,
    cache: &CacheStore,
    config: &ConversionConfig,
) -> Vec<ImageOutcome> {
    let mut outcomes: Vec<ImageOutcome> = stream::iter(refs.iter().cloned().enumerate())
        .map(|(index, reference)| async move {
            let result = resolve(&reference, client, cache, config).await;
            ImageOutcome {
                index,
                reference,
                result,
            }
        })
        .buffer_unordered(config.concurrency)
        .collect()
        .await;
    outcomes.sort_by_key(|o| o.index);
    outcomes
}

/// Resolve one reference: cache first, then acquire and transcode, storing
/// the result for next time.
pub async fn resolve(
    reference: &ImageRef,
    client: &reqwest::Client,
    cache: &CacheStore,
    config: &ConversionConfig,
) -> Result<TranscodedImage, ImageError> {
    let src = reference.src.as_str();
    match classify(src) {
        ImageSource::Url => {
            if let Some(hit) = lookup(cache, src).await {
                return Ok(hit);
            }
            let bytes = fetch_url(client, src, config).await?;
            transcode_and_store(cache, &bytes, src, config).await
        }
        ImageSource::Data => {
            // Normalize first so the cache identifier is whitespace-stable.
            let (normalized, bytes) = decode_data_uri(src)?;
            if let Some(hit) = lookup(cache, &normalized).await {
                return Ok(hit);
            }
            transcode_and_store(cache, &bytes, &normalized, config).await
        }
        ImageSource::Local => {
            if let Some(hit) = lookup(cache, src).await {
                return Ok(hit);
            }
            let bytes = read_local(src).await?;
            transcode_and_store(cache, &bytes, src, config).await
        }
    }
}

/// Cache lookup by source identifier. Geometry comes from the stored
/// metadata when present, from re-probing the blob otherwise.
async fn lookup(cache: &CacheStore, source_id: &str) -> Option<TranscodedImage> {
    let key = CacheStore::key(source_id);
    let bytes = cache.get(&key).await?;
    match cache.metadata(&key).await {
        Some(meta) => {
            let format = ImageKind::from_name(&meta.format).unwrap_or(ImageKind::Jpeg);
            debug!(source = source_id, "image cache hit");
            Some(TranscodedImage {
                bytes,
                width: meta.width,
                height: meta.height,
                format,
            })
        }
        None => match probe(&bytes, source_id) {
            Ok((width, height, format)) => Some(TranscodedImage {
                bytes,
                width,
                height,
                format,
            }),
            Err(err) => {
                warn!(source = source_id, error = %err, "cached blob undecodable, refetching");
                cache.remove(&key).await;
                None
            }
        },
    }
}

async fn transcode_and_store(
    cache: &CacheStore,
    bytes: &[u8],
    source_id: &str,
    config: &ConversionConfig,
) -> Result<TranscodedImage, ImageError> {
    let out = transcode(bytes, source_id, config.max_image_width, config.image_quality)?;
    cache
        .set(
            &CacheStore::key(source_id),
            &out.bytes,
            ImageMeta {
                width: out.width,
                height: out.height,
                format: out.format.as_str().to_string(),
            },
        )
        .await;
    Ok(out)
}

/// Write transcoded bytes to a named temporary file, for consumers that
/// need a path-based handle rather than in-memory bytes. The file is
/// deleted when the returned guard drops.
pub fn spool_image(image: &TranscodedImage) -> std::io::Result<tempfile::NamedTempFile> {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let mut file = tempfile::Builder::new()
        .prefix(&format!("md2docx-{stamp}-"))
        .suffix(&format!(".{}", image.format.ext()))
        .tempfile()?;
    file.write_all(&image.bytes)?;
    file.flush()?;
    Ok(file)
}
