use crate::ProxyError;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::Client;

/// Headers that describe the origin connection rather than the image and
/// must not be replayed to clients or into the cache.
const DROPPED_HEADERS: &[&str] = &[
    "connection",
    "content-length",
    "keep-alive",
    "proxy-connection",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// A successful (2xx) origin response, fully buffered.
#[derive(Debug, Clone)]
pub struct OriginResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

/// Builds the upstream URL from the request path: the leading slash is
/// dropped and the scheme is reattached.
pub fn origin_url(scheme: &str, pathname: &str) -> String {
    format!("{}://{}", scheme, pathname.trim_start_matches('/'))
}

/// Retrieves origin images. Attempted exactly once per request.
#[async_trait::async_trait]
pub trait OriginFetcher: Send + Sync {
    /// # Errors
    /// `OriginUnavailable` for any non-2xx status or transport failure.
    async fn fetch(&self, url: &str) -> Result<OriginResponse, ProxyError>;
}

/// [`OriginFetcher`] over a shared `reqwest` client.
#[derive(Clone)]
pub struct HttpOrigin {
    client: Client,
    max_size: usize,
}

impl HttpOrigin {
    /// # Parameters
    /// * `max_size` - Maximum accepted body size in bytes
    pub fn new(max_size: usize) -> Self {
        Self { client: Client::new(), max_size }
    }
}

#[async_trait::async_trait]
impl OriginFetcher for HttpOrigin {
    async fn fetch(&self, url: &str) -> Result<OriginResponse, ProxyError> {
        let resp = self.client.get(url).send().await.map_err(|e| {
            tracing::warn!("Origin request to {} failed: {}", url, e);
            ProxyError::OriginUnavailable(e.to_string())
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ProxyError::OriginUnavailable(format!("Upstream status: {}", status)));
        }

        // Pre-flight size check based on Content-Length header
        if let Some(len) = resp.content_length() {
            if len as usize > self.max_size {
                return Err(ProxyError::InputTooLarge(len as usize));
            }
        }

        let headers = resp
            .headers()
            .iter()
            .filter(|(name, _)| !DROPPED_HEADERS.contains(&name.as_str()))
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        // Stream response with size enforcement to prevent header spoofing
        let mut buf = BytesMut::with_capacity(8192);
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream
            .next()
            .await
            .transpose()
            .map_err(|e| ProxyError::OriginUnavailable(e.to_string()))?
        {
            if buf.len() + chunk.len() > self.max_size {
                return Err(ProxyError::InputTooLarge(buf.len() + chunk.len()));
            }
            buf.extend_from_slice(&chunk);
        }

        Ok(OriginResponse { status: status.as_u16(), headers, body: buf.freeze() })
    }
}
