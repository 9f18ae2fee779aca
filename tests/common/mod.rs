#![allow(dead_code)]

use axum::http::{header, HeaderMap, HeaderValue};
use bytes::Bytes;
use pixelproxy::cache::MemoryCache;
use pixelproxy::codec::ImageCodec;
use pixelproxy::config::{CacheBackend, ProxyConfig};
use pixelproxy::fetch::{OriginFetcher, OriginResponse};
use pixelproxy::pipeline::Pipeline;
use pixelproxy::ProxyError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Encodes a blank image of the given size in `format`.
pub fn encoded_image(width: u32, height: u32, format: image::ImageFormat) -> Vec<u8> {
    let img = image::DynamicImage::new_rgb8(width, height);
    let mut out = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut out), format).unwrap();
    out
}

pub fn request_headers(accept: Option<&str>) -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(header::HOST, HeaderValue::from_static("edge.test"));
    if let Some(a) = accept {
        h.insert(header::ACCEPT, HeaderValue::from_str(a).unwrap());
    }
    h
}

/// Origin double that serves one canned response and records every call.
pub struct SpyOrigin {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Bytes,
    pub calls: AtomicUsize,
    pub urls: Mutex<Vec<String>>,
}

impl SpyOrigin {
    pub fn serving(content_type: &'static str, body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type,
            body: Bytes::from(body),
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self { status, ..Self::serving("text/plain", b"upstream error".to_vec()) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl OriginFetcher for SpyOrigin {
    async fn fetch(&self, url: &str) -> Result<OriginResponse, ProxyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());
        if !(200..300).contains(&self.status) {
            return Err(ProxyError::OriginUnavailable(format!("Upstream status: {}", self.status)));
        }
        Ok(OriginResponse {
            status: self.status,
            headers: vec![("content-type".into(), self.content_type.into())],
            body: self.body.clone(),
        })
    }
}

pub fn memory_config() -> ProxyConfig {
    ProxyConfig { cache_backend: CacheBackend::Memory, ..ProxyConfig::default() }
}

/// Pipeline over an in-memory cache, the given origin and the real codec.
pub fn pipeline(origin: Arc<SpyOrigin>) -> (Pipeline, Arc<MemoryCache>) {
    pipeline_with(&memory_config(), origin)
}

pub fn pipeline_with(config: &ProxyConfig, origin: Arc<SpyOrigin>) -> (Pipeline, Arc<MemoryCache>) {
    let cache = Arc::new(MemoryCache::new());
    let pipeline = Pipeline::new(config, cache.clone(), origin, Arc::new(ImageCodec::default()));
    (pipeline, cache)
}
