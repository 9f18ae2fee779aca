use crate::cache::{CachedResponse, ResponseCache};
use crate::cache_key::CacheKey;
use crate::classify::ImageRequest;
use crate::codec::Codec;
use crate::config::ProxyConfig;
use crate::fetch::{origin_url, OriginFetcher};
use crate::metrics::METRICS;
use crate::transform::Transformer;
use crate::writer::CacheWriter;
use crate::Result;
use axum::http::{HeaderMap, Uri};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Request resolution from inbound URL to cached, transformed response.
///
/// Classify, resolve the cache key, look it up, and on a miss fetch the
/// origin, transform it and hand the result to the background writer.
pub struct Pipeline {
    cache: Arc<dyn ResponseCache>,
    origin: Arc<dyn OriginFetcher>,
    transformer: Transformer,
    writer: CacheWriter,
    origin_scheme: String,
}

impl Pipeline {
    pub fn new(
        config: &ProxyConfig,
        cache: Arc<dyn ResponseCache>,
        origin: Arc<dyn OriginFetcher>,
        codec: Arc<dyn Codec>,
    ) -> Self {
        Self {
            writer: CacheWriter::new(cache.clone()),
            cache,
            origin,
            transformer: Transformer::new(codec, config.cache_max_age, config.max_dimension),
            origin_scheme: config.origin_scheme.clone(),
        }
    }

    pub fn writer(&self) -> &CacheWriter {
        &self.writer
    }

    pub async fn handle(&self, uri: &Uri, headers: &HeaderMap) -> Result<CachedResponse> {
        let req = ImageRequest::classify(uri, headers)?;
        let key = CacheKey::resolve(&req);

        match self.cache.lookup(&key).await {
            Ok(Some(hit)) => {
                tracing::info!("Cache hit for key={}", key);
                METRICS.cache_hits.fetch_add(1, Ordering::Relaxed);
                return Ok(hit);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Cache lookup failed for key={}, treating as miss: {}", key, e),
        }

        METRICS.cache_misses.fetch_add(1, Ordering::Relaxed);
        let url = origin_url(&self.origin_scheme, &req.pathname);
        tracing::info!("Cache miss for key={}, fetching from {}", key, url);

        let origin = self.origin.fetch(&url).await?;
        let response = self.transformer.apply(&req, origin).await?;

        self.writer.schedule(key, response.clone());
        Ok(response)
    }
}
