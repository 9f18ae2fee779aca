use crate::classify::ImageRequest;
use crate::config::ImageFormat;

/// What the orchestrator does with an origin image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformPlan {
    /// Origin bytes and headers are served unchanged.
    Passthrough,
    /// Decode, then encode to `target` without resizing.
    ReencodeOnly(ImageFormat),
    /// Decode, resize, then encode back to the source format.
    ResizeOnly,
    /// Decode, resize, then encode to `target`.
    DecodeResizeEncode(ImageFormat),
}

impl TransformPlan {
    pub fn for_request(req: &ImageRequest) -> Self {
        match (req.negotiates_next_gen(), req.is_decodable(), req.wants_resize()) {
            (true, _, true) => TransformPlan::DecodeResizeEncode(ImageFormat::NEXT_GEN),
            (true, _, false) => TransformPlan::ReencodeOnly(ImageFormat::NEXT_GEN),
            (false, true, true) => TransformPlan::ResizeOnly,
            _ => TransformPlan::Passthrough,
        }
    }

    /// Format of the served body given the source format.
    pub fn output_format(self, source: ImageFormat) -> ImageFormat {
        match self {
            TransformPlan::ReencodeOnly(target) | TransformPlan::DecodeResizeEncode(target) => target,
            TransformPlan::Passthrough | TransformPlan::ResizeOnly => source,
        }
    }

    pub fn resizes(self) -> bool {
        matches!(self, TransformPlan::ResizeOnly | TransformPlan::DecodeResizeEncode(_))
    }

    /// Only format-changing plans replace the origin `Content-Type`.
    pub fn rewrites_content_type(self) -> bool {
        matches!(self, TransformPlan::ReencodeOnly(_) | TransformPlan::DecodeResizeEncode(_))
    }
}

impl std::fmt::Display for TransformPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransformPlan::Passthrough => write!(f, "passthrough"),
            TransformPlan::ReencodeOnly(t) => write!(f, "reencode:{}", t),
            TransformPlan::ResizeOnly => write!(f, "resize"),
            TransformPlan::DecodeResizeEncode(t) => write!(f, "decode-resize-encode:{}", t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderMap, HeaderValue, Uri};

    fn plan(target: &str, webp: bool) -> TransformPlan {
        let mut headers = HeaderMap::new();
        if webp {
            headers.insert(header::ACCEPT, HeaderValue::from_static("image/webp,*/*"));
        }
        let uri: Uri = target.parse().unwrap();
        TransformPlan::for_request(&ImageRequest::classify(&uri, &headers).unwrap())
    }

    #[test]
    fn all_four_branches_are_reachable() {
        assert_eq!(plan("/h/a.jpg?w=50", true), TransformPlan::DecodeResizeEncode(ImageFormat::Webp));
        assert_eq!(plan("/h/a.png", true), TransformPlan::ReencodeOnly(ImageFormat::Webp));
        assert_eq!(plan("/h/a.png?h=20", false), TransformPlan::ResizeOnly);
        assert_eq!(plan("/h/a.jpeg", false), TransformPlan::Passthrough);
    }

    #[test]
    fn non_decodable_sources_pass_through() {
        assert_eq!(plan("/h/a.gif?w=50&h=50", true), TransformPlan::Passthrough);
        assert_eq!(plan("/h/a.webp?w=50", true), TransformPlan::Passthrough);
        assert_eq!(plan("/h/a.webp?w=50", false), TransformPlan::Passthrough);
    }

    #[test]
    fn output_format_follows_plan() {
        assert_eq!(TransformPlan::ResizeOnly.output_format(ImageFormat::Png), ImageFormat::Png);
        assert_eq!(
            TransformPlan::ReencodeOnly(ImageFormat::Webp).output_format(ImageFormat::Jpeg),
            ImageFormat::Webp
        );
        assert!(!TransformPlan::ResizeOnly.rewrites_content_type());
        assert!(TransformPlan::DecodeResizeEncode(ImageFormat::Webp).resizes());
    }
}
