use super::{CachedResponse, ResponseCache};
use crate::cache_key::CacheKey;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sled::Db;
use std::path::Path;

/// Default maximum cache size: 10GB
pub const DEFAULT_MAX_CACHE_SIZE: u64 = 10 * 1024 * 1024 * 1024;

/// Metadata stored alongside cached bodies
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CacheMetadata {
    pub key: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub size: usize,
    pub created_at: i64,
    pub accessed_at: i64,
}

/// Statistics about the cache
#[derive(Debug, Serialize)]
pub struct CacheStats {
    pub total_size_bytes: u64,
    pub entry_count: usize,
    pub max_size_bytes: u64,
}

fn now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

/// Sled-backed response cache with LRU eviction.
///
/// Each entry is split into a `data:` record holding the body and a `meta:`
/// record holding status, headers and access times. Both are addressed by
/// the SHA-256 digest of the cache key.
pub struct SledCache {
    db: Db,
    max_size: u64,
}

impl SledCache {
    /// Create a new Sled cache
    ///
    /// # Arguments
    /// * `path` - Directory to store the Sled database
    /// * `max_size` - Optional maximum size in bytes (default: 10GB)
    pub fn new(path: impl AsRef<Path>, max_size: Option<u64>) -> Result<Self, String> {
        let db = sled::open(path).map_err(|e| format!("Failed to open Sled database: {}", e))?;

        Ok(Self {
            db,
            max_size: max_size.unwrap_or(DEFAULT_MAX_CACHE_SIZE),
        })
    }

    fn metadata_key(id: &str) -> String {
        format!("meta:{}", id)
    }

    fn data_key(id: &str) -> String {
        format!("data:{}", id)
    }

    fn entries(&self) -> Vec<(String, CacheMetadata)> {
        self.db
            .scan_prefix(b"meta:")
            .filter_map(|item| item.ok())
            .filter_map(|(key, value)| {
                let id = std::str::from_utf8(&key).ok()?.strip_prefix("meta:")?.to_string();
                let meta = serde_json::from_slice::<CacheMetadata>(&value).ok()?;
                Some((id, meta))
            })
            .collect()
    }

    /// Evict least recently used entries until under 90% of the size limit
    fn evict_if_needed(&self) -> Result<(), String> {
        let mut entries = self.entries();
        let current: u64 = entries.iter().map(|(_, m)| m.size as u64).sum();

        if current <= self.max_size {
            return Ok(());
        }

        tracing::info!("Cache size {} exceeds limit {}, starting eviction", current, self.max_size);

        entries.sort_by_key(|(_, m)| m.accessed_at);

        let target_to_free = current.saturating_sub(self.max_size * 90 / 100);
        let mut freed = 0u64;
        let mut evicted_count = 0;

        for (id, meta) in entries {
            if freed >= target_to_free {
                break;
            }
            let mut batch = sled::Batch::default();
            batch.remove(Self::metadata_key(&id).as_bytes());
            batch.remove(Self::data_key(&id).as_bytes());
            self.db.apply_batch(batch).map_err(|e| e.to_string())?;

            freed += meta.size as u64;
            evicted_count += 1;
            tracing::debug!("Evicted cache entry: key={}, size={}", meta.key, meta.size);
        }

        self.db.flush().map_err(|e| e.to_string())?;
        tracing::info!("Eviction complete: freed {} bytes by removing {} entries", freed, evicted_count);
        Ok(())
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries();
        CacheStats {
            total_size_bytes: entries.iter().map(|(_, m)| m.size as u64).sum(),
            entry_count: entries.len(),
            max_size_bytes: self.max_size,
        }
    }
}

#[async_trait::async_trait]
impl ResponseCache for SledCache {
    async fn lookup(&self, key: &CacheKey) -> Result<Option<CachedResponse>, String> {
        let id = key.digest();
        let meta_key = Self::metadata_key(&id);

        let Some(meta_bytes) = self.db.get(meta_key.as_bytes()).map_err(|e| e.to_string())? else {
            return Ok(None);
        };
        let Some(data) = self.db.get(Self::data_key(&id).as_bytes()).map_err(|e| e.to_string())? else {
            return Ok(None);
        };
        let mut meta: CacheMetadata = serde_json::from_slice(&meta_bytes).map_err(|e| e.to_string())?;

        // Update access time (cache hit)
        meta.accessed_at = now();
        match serde_json::to_vec(&meta) {
            Ok(bytes) => {
                if let Err(e) = self.db.insert(meta_key.as_bytes(), bytes) {
                    tracing::debug!("Failed to record access for key={}: {}", meta.key, e);
                }
            }
            Err(e) => tracing::debug!("Failed to serialize metadata for key={}: {}", meta.key, e),
        }

        Ok(Some(CachedResponse {
            status: meta.status,
            headers: meta.headers,
            body: Bytes::copy_from_slice(&data),
        }))
    }

    async fn store(&self, key: &CacheKey, response: &CachedResponse) -> Result<(), String> {
        let id = key.digest();
        let ts = now();
        let metadata = CacheMetadata {
            key: key.to_string(),
            status: response.status,
            headers: response.headers.clone(),
            size: response.body.len(),
            created_at: ts,
            accessed_at: ts,
        };
        let meta_bytes = serde_json::to_vec(&metadata).map_err(|e| e.to_string())?;

        // Body and metadata land together or not at all
        let mut batch = sled::Batch::default();
        batch.insert(Self::data_key(&id).as_bytes(), response.body.as_ref());
        batch.insert(Self::metadata_key(&id).as_bytes(), meta_bytes);
        self.db
            .apply_batch(batch)
            .map_err(|e| format!("Failed to write cache entry: {}", e))?;
        self.db.flush().map_err(|e| e.to_string())?;

        self.evict_if_needed()
    }
}
