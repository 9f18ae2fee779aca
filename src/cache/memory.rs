use super::{CachedResponse, ResponseCache};
use crate::cache_key::CacheKey;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-process cache. Entries live as long as the process.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<CacheKey, CachedResponse>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn contains(&self, key: &CacheKey) -> bool {
        self.entries.read().await.contains_key(key)
    }
}

#[async_trait::async_trait]
impl ResponseCache for MemoryCache {
    async fn lookup(&self, key: &CacheKey) -> Result<Option<CachedResponse>, String> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn store(&self, key: &CacheKey, response: &CachedResponse) -> Result<(), String> {
        self.entries.write().await.insert(key.clone(), response.clone());
        Ok(())
    }
}
