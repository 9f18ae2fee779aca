use sha2::{Digest, Sha256};
use std::fmt;

use crate::classify::ImageRequest;
use crate::config::ImageFormat;

/// Canonical URL under which a served response is stored.
///
/// Equal to the request URL unless content negotiation changes the output
/// format, in which case the path extension names the negotiated format.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn resolve(req: &ImageRequest) -> Self {
        if !req.negotiates_next_gen() {
            return CacheKey(req.url.clone());
        }
        let (path, query) = match req.url.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (req.url.as_str(), None),
        };
        // The classifier guarantees the path ends with ".<extension>".
        let stem = path.strip_suffix(req.extension.as_str()).unwrap_or(path);
        let mut key = format!("{}{}", stem, ImageFormat::NEXT_GEN.extension());
        if let Some(q) = query {
            key.push('?');
            key.push_str(q);
        }
        CacheKey(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fixed-length storage id for backends that prefer compact keys.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
