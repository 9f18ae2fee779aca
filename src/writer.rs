use crate::cache::{CachedResponse, ResponseCache};
use crate::cache_key::CacheKey;
use std::sync::Arc;
use tokio_util::task::TaskTracker;

/// Stores finished responses in the background.
///
/// Writes are detached from the request that scheduled them: the client
/// response never waits on the cache. The tracker lets the host wait for
/// outstanding writes before the process exits.
#[derive(Clone)]
pub struct CacheWriter {
    cache: Arc<dyn ResponseCache>,
    tracker: TaskTracker,
}

impl CacheWriter {
    pub fn new(cache: Arc<dyn ResponseCache>) -> Self {
        Self { cache, tracker: TaskTracker::new() }
    }

    /// Spawns the store and returns immediately. Failures are only logged.
    pub fn schedule(&self, key: CacheKey, response: CachedResponse) {
        let cache = self.cache.clone();
        self.tracker.spawn(async move {
            match cache.store(&key, &response).await {
                Ok(()) => tracing::debug!("Cached response for key={}", key),
                Err(e) => tracing::warn!("Failed to cache response for key={}: {}", key, e),
            }
        });
    }

    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Waits for every write scheduled so far; new writes are still accepted.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Waits for outstanding writes. Call once the server has stopped.
    pub async fn shutdown(&self) {
        self.tracker.close();
        tracing::info!("Waiting for {} pending cache writes", self.tracker.len());
        self.tracker.wait().await;
    }
}
