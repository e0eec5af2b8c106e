//! Content-addressed image cache: an `index.json` plus one blob file per key.
//!
//! Keys are the SHA-256 hex digest of the image's source identifier (URL,
//! local path, or the normalized data URI itself), so the same reference
//! across runs hits the same entry without any URL parsing.
//!
//! The cache is strictly best-effort. Every I/O failure on the write path is
//! logged at `warn` and swallowed — a broken cache degrades to slower
//! conversions, never to failed ones. Reads self-heal: an index entry whose
//! blob has gone missing is dropped and reported as a miss.
//!
//! Two policies bound the store:
//! * **TTL** — entries older than `max_age_ms` are misses; lookup removes
//!   them on sight. Timestamps are fixed at write time (a hit does not
//!   refresh them).
//! * **Size ceiling** — after every write, oldest-first eviction runs until
//!   the total is back under `max_size`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Image dimensions and format stored alongside a cached blob, so a hit
/// skips re-decoding the bytes just to learn the display size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageMeta {
    pub width: u32,
    pub height: u32,
    /// Canonical format name ("jpeg", "png", "webp").
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    /// Unix epoch milliseconds at write time.
    timestamp: u64,
    /// Blob size in bytes.
    size: u64,
    metadata: ImageMeta,
}

/// Aggregate cache statistics, for logging and the CLI's `--cache-stats`.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub total_size: u64,
    pub item_count: usize,
    pub max_size: u64,
    pub max_age_ms: u64,
}

/// On-disk image cache with TTL and size-bounded eviction.
///
/// The in-memory index mirrors `index.json` and is guarded by a single async
/// mutex; every public operation locks it for its full duration, so index
/// and blob files never race within one store instance.
#[derive(Debug)]
pub struct CacheStore {
    dir: PathBuf,
    max_age_ms: u64,
    max_size: u64,
    index: Mutex<HashMap<String, CacheEntry>>,
}

impl CacheStore {
    /// Open (or create) a cache at `dir`, loading the index and dropping
    /// already-expired entries.
    ///
    /// # Errors
    /// Only directory creation is fatal; a corrupt or missing index file
    /// starts the store empty.
    pub async fn open(dir: &Path, max_age_ms: u64, max_size: u64) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let index = load_index(&dir.join("index.json")).await;
        let store = Self {
            dir: dir.to_path_buf(),
            max_age_ms,
            max_size,
            index: Mutex::new(index),
        };
        store.cleanup_expired().await;
        Ok(store)
    }

    /// Cache key for a source identifier: SHA-256 hex of the identifier
    /// string.
    pub fn key(source: &str) -> String {
        let digest = Sha256::digest(source.as_bytes());
        format!("{digest:x}")
    }

    /// Look up a blob by key. Expired entries and entries whose blob file
    /// has vanished are removed and reported as misses.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut index = self.index.lock().await;
        let entry = index.get(key)?;
        if now_ms().saturating_sub(entry.timestamp) > self.max_age_ms {
            debug!(key, "cache entry expired");
            index.remove(key);
            self.remove_blob(key).await;
            self.save_index(&index).await;
            return None;
        }
        match tokio::fs::read(self.blob_path(key)).await {
            Ok(bytes) => {
                debug!(key, size = bytes.len(), "cache hit");
                Some(bytes)
            }
            Err(err) => {
                warn!(key, error = %err, "cache blob missing, dropping entry");
                index.remove(key);
                self.save_index(&index).await;
                None
            }
        }
    }

    /// Metadata of a cached entry, without touching the blob.
    pub async fn metadata(&self, key: &str) -> Option<ImageMeta> {
        let index = self.index.lock().await;
        index.get(key).map(|e| e.metadata.clone())
    }

    /// Store a blob with its metadata, then enforce the size ceiling.
    /// Failures are logged and swallowed.
    pub async fn set(&self, key: &str, bytes: &[u8], metadata: ImageMeta) {
        let mut index = self.index.lock().await;
        if let Err(err) = tokio::fs::write(self.blob_path(key), bytes).await {
            warn!(key, error = %err, "failed to write cache blob");
            return;
        }
        index.insert(
            key.to_string(),
            CacheEntry {
                timestamp: now_ms(),
                size: bytes.len() as u64,
                metadata,
            },
        );
        self.enforce_max_size(&mut index).await;
        self.save_index(&index).await;
        debug!(key, size = bytes.len(), "cached image");
    }

    /// Drop a single entry and its blob.
    pub async fn remove(&self, key: &str) {
        let mut index = self.index.lock().await;
        if index.remove(key).is_some() {
            self.remove_blob(key).await;
            self.save_index(&index).await;
        }
    }

    /// Remove every entry past its TTL.
    pub async fn cleanup_expired(&self) {
        let mut index = self.index.lock().await;
        let cutoff = now_ms().saturating_sub(self.max_age_ms);
        let expired: Vec<String> = index
            .iter()
            .filter(|(_, e)| e.timestamp < cutoff)
            .map(|(k, _)| k.clone())
            .collect();
        if expired.is_empty() {
            return;
        }
        debug!(count = expired.len(), "removing expired cache entries");
        for key in &expired {
            index.remove(key);
            self.remove_blob(key).await;
        }
        self.save_index(&index).await;
    }

    /// Current totals.
    pub async fn stats(&self) -> CacheStats {
        let index = self.index.lock().await;
        CacheStats {
            total_size: index.values().map(|e| e.size).sum(),
            item_count: index.len(),
            max_size: self.max_size,
            max_age_ms: self.max_age_ms,
        }
    }

    // ── Internals (index lock held by the caller) ────────────────────────

    /// Oldest-first eviction until the total is back under the ceiling.
    async fn enforce_max_size(&self, index: &mut HashMap<String, CacheEntry>) {
        let mut total: u64 = index.values().map(|e| e.size).sum();
        if total <= self.max_size {
            return;
        }
        let mut by_age: Vec<(String, u64, u64)> = index
            .iter()
            .map(|(k, e)| (k.clone(), e.timestamp, e.size))
            .collect();
        by_age.sort_by_key(|(_, timestamp, _)| *timestamp);
        for (key, _, size) in by_age {
            if total <= self.max_size {
                break;
            }
            debug!(key, size, "evicting cache entry for size");
            index.remove(&key);
            self.remove_blob(&key).await;
            total = total.saturating_sub(size);
        }
    }

    async fn save_index(&self, index: &HashMap<String, CacheEntry>) {
        let path = self.dir.join("index.json");
        let json = match serde_json::to_vec_pretty(index) {
            Ok(json) => json,
            Err(err) => {
                warn!(error = %err, "failed to serialize cache index");
                return;
            }
        };
        if let Err(err) = tokio::fs::write(&path, json).await {
            warn!(path = %path.display(), error = %err, "failed to write cache index");
        }
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    async fn remove_blob(&self, key: &str) {
        if let Err(err) = tokio::fs::remove_file(self.blob_path(key)).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(key, error = %err, "failed to remove cache blob");
            }
        }
    }
}

async fn load_index(path: &Path) -> HashMap<String, CacheEntry> {
    match tokio::fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(index) => index,
            Err(err) => {
                warn!(error = %err, "cache index corrupt, starting empty");
                HashMap::new()
            }
        },
        Err(_) => HashMap::new(),
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn meta() -> ImageMeta {
        ImageMeta {
            width: 10,
            height: 20,
            format: "png".to_string(),
        }
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::open(dir.path(), 60_000, 1024 * 1024)
            .await
            .unwrap();
        let key = CacheStore::key("https://example.com/a.png");
        store.set(&key, b"bytes", meta()).await;
        assert_eq!(store.get(&key).await.as_deref(), Some(&b"bytes"[..]));
        let m = store.metadata(&key).await.unwrap();
        assert_eq!((m.width, m.height), (10, 20));
    }

    #[tokio::test]
    async fn distinct_sources_get_distinct_keys() {
        let a = CacheStore::key("https://example.com/a.png");
        let b = CacheStore::key("https://example.com/b.png");
        assert_ne!(a, b);
        // Keys are stable hex digests.
        assert_eq!(a, CacheStore::key("https://example.com/a.png"));
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss_and_gets_removed() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::open(dir.path(), 0, 1024 * 1024).await.unwrap();
        let key = CacheStore::key("src");
        store.set(&key, b"old", meta()).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert!(store.get(&key).await.is_none());
        assert!(store.metadata(&key).await.is_none());
        assert!(!dir.path().join(&key).exists());
    }

    #[tokio::test]
    async fn missing_blob_self_heals_to_a_miss() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::open(dir.path(), 60_000, 1024 * 1024)
            .await
            .unwrap();
        let key = CacheStore::key("src");
        store.set(&key, b"bytes", meta()).await;
        std::fs::remove_file(dir.path().join(&key)).unwrap();
        assert!(store.get(&key).await.is_none());
        // Entry was dropped from the index too.
        assert_eq!(store.stats().await.item_count, 0);
    }

    #[tokio::test]
    async fn size_ceiling_evicts_oldest_first() {
        let dir = TempDir::new().unwrap();
        // Ceiling fits two 4-byte blobs but not three.
        let store = CacheStore::open(dir.path(), 60_000, 8).await.unwrap();
        store.set("k1", b"aaaa", meta()).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.set("k2", b"bbbb", meta()).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.set("k3", b"cccc", meta()).await;
        assert!(store.get("k1").await.is_none(), "oldest entry evicted");
        assert!(store.get("k2").await.is_some());
        assert!(store.get("k3").await.is_some());
        assert!(store.stats().await.total_size <= 8);
    }

    #[tokio::test]
    async fn index_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let key = CacheStore::key("persist");
        {
            let store = CacheStore::open(dir.path(), 60_000, 1024 * 1024)
                .await
                .unwrap();
            store.set(&key, b"kept", meta()).await;
        }
        let store = CacheStore::open(dir.path(), 60_000, 1024 * 1024)
            .await
            .unwrap();
        assert_eq!(store.get(&key).await.as_deref(), Some(&b"kept"[..]));
    }

    #[tokio::test]
    async fn corrupt_index_starts_empty() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.json"), b"not json").unwrap();
        let store = CacheStore::open(dir.path(), 60_000, 1024 * 1024)
            .await
            .unwrap();
        assert_eq!(store.stats().await.item_count, 0);
    }
}
