use axum::http::{header, HeaderMap, Uri};
use mime::Mime;

use crate::config::{ImageFormat, DEFAULT_QUALITY};
use crate::{ProxyError, Result};

/// Everything the pipeline needs to know about one inbound image request.
///
/// Built once by [`ImageRequest::classify`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    /// Request URL as received, used as the base of the cache key.
    pub url: String,
    pub pathname: String,
    pub extension: String,
    pub format: ImageFormat,
    pub accepts_next_gen: bool,
    /// Requested width; 0 means "derive from the aspect ratio".
    pub width: u32,
    /// Requested height; 0 means "derive from the aspect ratio".
    pub height: u32,
    pub quality: u8,
}

impl ImageRequest {
    /// Classifies a raw request.
    ///
    /// Fails with [`ProxyError::UnsupportedExtension`] when the path does not
    /// end in one of the served image extensions. No I/O happens here.
    pub fn classify(uri: &Uri, headers: &HeaderMap) -> Result<Self> {
        let pathname = uri.path().to_string();
        let extension = pathname.rsplit('.').next().unwrap_or_default().to_string();
        let format = ImageFormat::from_extension(&extension)
            .ok_or_else(|| ProxyError::UnsupportedExtension(extension.clone()))?;

        let params = query_pairs(uri.query());
        let width = parse_dimension(first_param(&params, "w"));
        let height = parse_dimension(first_param(&params, "h"));
        let quality = parse_quality(first_param(&params, "q"));

        Ok(Self {
            url: original_url(uri, headers),
            pathname,
            extension,
            format,
            accepts_next_gen: accepts_next_gen(headers),
            width,
            height,
            quality,
        })
    }

    pub fn is_decodable(&self) -> bool {
        self.format.is_decodable()
    }

    /// Content negotiation substitutes the output format.
    pub fn negotiates_next_gen(&self) -> bool {
        self.accepts_next_gen && self.is_decodable()
    }

    pub fn wants_resize(&self) -> bool {
        self.width > 0 || self.height > 0
    }
}

fn original_url(uri: &Uri, headers: &HeaderMap) -> String {
    if uri.authority().is_some() {
        return uri.to_string();
    }
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    match headers.get(header::HOST).and_then(|h| h.to_str().ok()) {
        Some(host) => format!("http://{}{}", host, target),
        None => target.to_string(),
    }
}

fn query_pairs(query: Option<&str>) -> Vec<(String, String)> {
    query
        .and_then(|q| serde_urlencoded::from_str::<Vec<(String, String)>>(q).ok())
        .unwrap_or_default()
}

fn first_param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

/// Missing, empty, negative or non-numeric values all collapse to 0.
fn parse_dimension(raw: Option<&str>) -> u32 {
    raw.and_then(|v| v.trim().parse::<u32>().ok()).unwrap_or(0)
}

fn parse_quality(raw: Option<&str>) -> u8 {
    match raw.and_then(|v| v.trim().parse::<u32>().ok()) {
        None | Some(0) => DEFAULT_QUALITY,
        Some(q) => q.min(100) as u8,
    }
}

/// True when the `Accept` header lists the next-gen MIME type with a
/// non-zero weight. A missing or unreadable header counts as "not accepted".
///
/// `q=0` is an explicit refusal, so `image/webp;q=0` never negotiates WebP
/// even though the token is present.
pub fn accepts_next_gen(headers: &HeaderMap) -> bool {
    let Some(accept) = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let token = ImageFormat::NEXT_GEN.content_type();
    accept
        .split(',')
        .filter_map(|entry| entry.trim().parse::<Mime>().ok())
        .any(|m| {
            let weight = m
                .get_param("q")
                .and_then(|q| q.as_str().parse::<f32>().ok())
                .unwrap_or(1.0);
            m.essence_str() == token && weight > 0.0
        })
}
