pub mod plan;

use crate::cache::CachedResponse;
use crate::classify::ImageRequest;
use crate::codec::{target_dimensions, Codec, EncodeOptions};
use crate::fetch::OriginResponse;
use crate::metrics::METRICS;
use crate::Result;
use bytes::Bytes;
use std::sync::atomic::Ordering;
use std::sync::Arc;

pub use plan::TransformPlan;

/// Turns a successful origin response into the response that is served
/// and cached, following the request's [`TransformPlan`].
#[derive(Clone)]
pub struct Transformer {
    codec: Arc<dyn Codec>,
    cache_max_age: u32,
    max_dimension: u32,
}

impl Transformer {
    /// # Parameters
    /// * `codec` - Codec adapter, initialised once per process
    /// * `cache_max_age` - `s-maxage` seconds attached to every response
    /// * `max_dimension` - Upper bound for either side of a resized image
    pub fn new(codec: Arc<dyn Codec>, cache_max_age: u32, max_dimension: u32) -> Self {
        Self { codec, cache_max_age, max_dimension }
    }

    /// Runs decode, resize and encode strictly in sequence.
    ///
    /// Codec failures are returned as-is; there is no fallback to the
    /// origin bytes once a transform has been planned.
    pub async fn apply(&self, req: &ImageRequest, origin: OriginResponse) -> Result<CachedResponse> {
        let plan = TransformPlan::for_request(req);
        let target = plan.output_format(req.format);
        tracing::debug!("Applying plan {} to {}", plan, req.pathname);

        let OriginResponse { status, mut headers, body } = origin;

        let body = match plan {
            TransformPlan::Passthrough => body,
            TransformPlan::ResizeOnly
            | TransformPlan::ReencodeOnly(_)
            | TransformPlan::DecodeResizeEncode(_) => {
                METRICS.transforms.fetch_add(1, Ordering::Relaxed);
                let mut pixels = self.codec.decode(&body, req.format).await?;

                if plan.resizes() {
                    let (w, h) = target_dimensions(
                        pixels.width,
                        pixels.height,
                        req.width,
                        req.height,
                        self.max_dimension,
                    );
                    tracing::debug!("Resizing {}x{} -> {}x{}", pixels.width, pixels.height, w, h);
                    pixels = self.codec.resize(pixels, w, h).await?;
                }

                // Same-format re-encodes keep the codec's default quality
                let options = match plan {
                    TransformPlan::ResizeOnly => EncodeOptions::default(),
                    _ => EncodeOptions { quality: Some(req.quality) },
                };
                Bytes::from(self.codec.encode(&pixels, target, options).await?)
            }
        };

        if plan.rewrites_content_type() {
            headers.retain(|(k, _)| !k.eq_ignore_ascii_case("content-type"));
            headers.push(("content-type".into(), target.content_type().into()));
        }
        headers.push(("cache-control".into(), format!("s-maxage={}", self.cache_max_age)));

        Ok(CachedResponse { status, headers, body })
    }
}
