pub mod memory;
pub mod sled_cache;

pub use memory::MemoryCache;
pub use sled_cache::{CacheStats, SledCache};

use crate::cache_key::CacheKey;
use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Response, StatusCode};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A finished response as stored in, and replayed from, the edge cache.
///
/// Header order and duplicates are preserved so a cache hit is
/// byte-identical to what was stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl CachedResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Builds the HTTP response. Headers that are not valid HTTP are skipped.
    pub fn to_http(&self) -> Response<Body> {
        let mut resp = Response::new(Body::from(self.body.clone()));
        *resp.status_mut() = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        let headers = resp.headers_mut();
        for (name, value) in &self.headers {
            match (HeaderName::try_from(name.as_str()), HeaderValue::from_str(value)) {
                (Ok(n), Ok(v)) => {
                    headers.append(n, v);
                }
                _ => tracing::debug!("Skipping unrepresentable header {}", name),
            }
        }
        resp
    }
}

/// Shared key-value store for finished responses.
///
/// Concurrent writes to one key are last-writer-wins.
#[async_trait::async_trait]
pub trait ResponseCache: Send + Sync {
    async fn lookup(&self, key: &CacheKey) -> Result<Option<CachedResponse>, String>;

    async fn store(&self, key: &CacheKey, response: &CachedResponse) -> Result<(), String>;
}
