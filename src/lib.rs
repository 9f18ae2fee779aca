use axum::{
    extract::State,
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;

pub mod cache;
pub mod cache_key;
pub mod classify;
pub mod codec;
pub mod config;
pub mod fetch;
pub mod metrics;
pub mod pipeline;
pub mod transform;
pub mod writer;

use crate::cache::{MemoryCache, ResponseCache, SledCache};
use crate::codec::{CodecOptions, ImageCodec};
use crate::config::{CacheBackend, ImageFormat, ProxyConfig, NOT_FOUND_BODY};
use crate::fetch::HttpOrigin;
use crate::metrics::METRICS;
use crate::pipeline::Pipeline;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Unsupported extension: {0}")]
    UnsupportedExtension(String),
    #[error("Origin unavailable: {0}")]
    OriginUnavailable(String),
    #[error("Input exceeds size limit: {0} bytes")]
    InputTooLarge(usize),
    #[error("Unsupported codec format: {0}")]
    UnsupportedCodecFormat(ImageFormat),
    #[error("Transformation error: {0}")]
    TransformError(String),
    #[error("Cache error: {0}")]
    CacheError(String),
}

pub type Result<T> = std::result::Result<T, ProxyError>;

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        match self {
            ProxyError::UnsupportedExtension(_) | ProxyError::OriginUnavailable(_) => {
                (StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response()
            }
            ProxyError::InputTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, self.to_string()).into_response(),
            ProxyError::UnsupportedCodecFormat(_)
            | ProxyError::TransformError(_)
            | ProxyError::CacheError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
            }
        }
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    /// Present when the sled backend is in use; feeds `/stats/cache`.
    pub sled: Option<Arc<SledCache>>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline: Arc::new(pipeline), sled: None }
    }

    /// Wires the production collaborators described by `config`.
    pub fn from_config(config: &ProxyConfig) -> Result<Self> {
        let codec = Arc::new(ImageCodec::new(CodecOptions::default()));
        let origin = Arc::new(HttpOrigin::new(config.max_input_size));

        let (cache, sled): (Arc<dyn ResponseCache>, Option<Arc<SledCache>>) = match config.cache_backend {
            CacheBackend::Sled => {
                let sled = Arc::new(
                    SledCache::new(&config.cache_dir, config.max_cache_size).map_err(ProxyError::CacheError)?,
                );
                (sled.clone() as Arc<dyn ResponseCache>, Some(sled))
            }
            CacheBackend::Memory => (Arc::new(MemoryCache::new()) as Arc<dyn ResponseCache>, None),
        };

        let pipeline = Pipeline::new(config, cache, origin, codec);
        Ok(Self { pipeline: Arc::new(pipeline), sled })
    }
}

async fn image_handler(State(state): State<AppState>, uri: Uri, headers: HeaderMap) -> Response {
    match state.pipeline.handle(&uri, &headers).await {
        Ok(cached) => cached.to_http(),
        Err(e) => {
            match &e {
                ProxyError::UnsupportedExtension(_) | ProxyError::OriginUnavailable(_) => {
                    tracing::debug!("Not serving {}: {}", uri, e)
                }
                _ => tracing::error!("Request for {} failed: {}", uri, e),
            }
            METRICS.errors.fetch_add(1, Ordering::Relaxed);
            e.into_response()
        }
    }
}

/// Health check endpoint
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "pixelproxy"
    }))
}

/// Metrics endpoint (Prometheus-compatible plain text)
async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        METRICS.render(),
    )
}

/// Cache statistics endpoint
async fn cache_stats_handler(State(state): State<AppState>) -> impl IntoResponse {
    let hits = METRICS.cache_hits.load(Ordering::Relaxed);
    let misses = METRICS.cache_misses.load(Ordering::Relaxed);
    let total = hits + misses;
    let hit_rate = if total > 0 { hits as f64 / total as f64 * 100.0 } else { 0.0 };

    let storage = match &state.sled {
        Some(sled) => {
            let stats = sled.stats().await;
            json!({
                "total_size_bytes": stats.total_size_bytes,
                "entry_count": stats.entry_count,
                "max_size_bytes": stats.max_size_bytes,
                "pending_writes": state.pipeline.writer().pending(),
            })
        }
        None => json!({ "pending_writes": state.pipeline.writer().pending() }),
    };

    Json(json!({
        "cache": storage,
        "requests": {
            "cache_hits": hits,
            "cache_misses": misses,
            "total": total,
            "hit_rate_percent": hit_rate,
        },
        "transforms": {
            "total": METRICS.transforms.load(Ordering::Relaxed),
            "errors": METRICS.errors.load(Ordering::Relaxed),
        }
    }))
}

/// Builds the service router.
///
/// Observability endpoints are matched first; every other `GET` path is
/// treated as an encoded origin URL.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/stats/cache", get(cache_stats_handler))
        .route("/*origin", get(image_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
