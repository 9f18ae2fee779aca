use crate::config::{ImageFormat, WEBP_MAX_DIMENSION};
use crate::ProxyError;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbaImage};

/// Decoded raster: tightly packed RGBA8 pixels plus dimensions.
///
/// Owned by a single request for its whole life; never shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl PixelBuffer {
    fn into_image(self) -> Result<RgbaImage, ProxyError> {
        let (w, h) = (self.width, self.height);
        RgbaImage::from_raw(w, h, self.data).ok_or_else(|| {
            ProxyError::TransformError(format!("pixel buffer does not match {}x{}", w, h))
        })
    }

    fn from_image(img: RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self { data: img.into_raw(), width, height }
    }
}

/// Per-call encoder settings. `None` leaves the codec default in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeOptions {
    pub quality: Option<u8>,
}

/// Uniform contract over the concrete decoders, encoders and resizer.
#[async_trait::async_trait]
pub trait Codec: Send + Sync {
    async fn decode(&self, bytes: &[u8], format: ImageFormat) -> Result<PixelBuffer, ProxyError>;

    async fn encode(
        &self,
        pixels: &PixelBuffer,
        format: ImageFormat,
        options: EncodeOptions,
    ) -> Result<Vec<u8>, ProxyError>;

    async fn resize(&self, pixels: PixelBuffer, width: u32, height: u32) -> Result<PixelBuffer, ProxyError>;
}

/// Construction-time settings for [`ImageCodec`].
#[derive(Debug, Clone, Copy)]
pub struct CodecOptions {
    pub resize_filter: FilterType,
    /// Used when a JPEG encode carries no explicit quality.
    pub jpeg_quality: u8,
    /// Used when a WebP encode carries no explicit quality.
    pub webp_quality: u8,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            // Lanczos3 provides best quality for downsampling
            resize_filter: FilterType::Lanczos3,
            jpeg_quality: 75,
            webp_quality: 75,
        }
    }
}

/// Codec adapter backed by the `image` crate and libwebp.
///
/// Created once at startup and shared behind an `Arc<dyn Codec>`.
#[derive(Debug, Clone, Default)]
pub struct ImageCodec {
    options: CodecOptions,
}

impl ImageCodec {
    pub fn new(options: CodecOptions) -> Self {
        Self { options }
    }
}

#[async_trait::async_trait]
impl Codec for ImageCodec {
    /// Decodes JPEG or PNG bytes into RGBA8 pixels.
    ///
    /// # Errors
    /// - `UnsupportedCodecFormat` for any other format
    /// - `TransformError` for corrupt data or a zero-sized image
    async fn decode(&self, bytes: &[u8], format: ImageFormat) -> Result<PixelBuffer, ProxyError> {
        let fmt = match format {
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
            ImageFormat::Png => image::ImageFormat::Png,
            other => return Err(ProxyError::UnsupportedCodecFormat(other)),
        };
        let img = image::load_from_memory_with_format(bytes, fmt)
            .map_err(|e| ProxyError::TransformError(e.to_string()))?;
        let pixels = PixelBuffer::from_image(img.to_rgba8());
        if pixels.width == 0 || pixels.height == 0 {
            return Err(ProxyError::TransformError("Invalid image dimensions".into()));
        }
        Ok(pixels)
    }

    /// Encodes pixels to JPEG, PNG or WebP.
    ///
    /// Quality is clamped to [1, 100] and ignored for PNG.
    async fn encode(
        &self,
        pixels: &PixelBuffer,
        format: ImageFormat,
        options: EncodeOptions,
    ) -> Result<Vec<u8>, ProxyError> {
        let (w, h) = (pixels.width, pixels.height);
        let mut out = Vec::new();

        match format {
            ImageFormat::Jpeg => {
                let q = options.quality.unwrap_or(self.options.jpeg_quality).clamp(1, 100);
                // JPEG has no alpha channel
                let rgb = DynamicImage::ImageRgba8(pixels.clone().into_image()?).to_rgb8();
                let enc = JpegEncoder::new_with_quality(&mut out, q);
                enc.write_image(rgb.as_raw(), w, h, ExtendedColorType::Rgb8)
                    .map_err(|e| ProxyError::TransformError(e.to_string()))?;
            }
            ImageFormat::Png => {
                let enc = PngEncoder::new(&mut out);
                enc.write_image(&pixels.data, w, h, ExtendedColorType::Rgba8)
                    .map_err(|e| ProxyError::TransformError(e.to_string()))?;
            }
            ImageFormat::Webp => {
                let q = options.quality.unwrap_or(self.options.webp_quality).clamp(1, 100) as f32;
                let encoder = webp::Encoder::from_rgba(&pixels.data, w, h);
                let encoded = encoder
                    .encode_simple(false, q)
                    .map_err(|e| ProxyError::TransformError(format!("WebP encoding failed: {:?}", e)))?;
                out.extend_from_slice(&encoded);
            }
            other => return Err(ProxyError::UnsupportedCodecFormat(other)),
        }

        Ok(out)
    }

    /// # Errors
    /// `TransformError` when either side exceeds [`WEBP_MAX_DIMENSION`];
    /// the output buffer is never allocated in that case.
    async fn resize(&self, pixels: PixelBuffer, width: u32, height: u32) -> Result<PixelBuffer, ProxyError> {
        if width > WEBP_MAX_DIMENSION || height > WEBP_MAX_DIMENSION {
            return Err(ProxyError::TransformError(format!(
                "resize target {}x{} exceeds {} px per side",
                width, height, WEBP_MAX_DIMENSION
            )));
        }
        let img = pixels.into_image()?;
        let resized = image::imageops::resize(&img, width.max(1), height.max(1), self.options.resize_filter);
        Ok(PixelBuffer::from_image(resized))
    }
}

/// Computes the output size for a resize request.
///
/// A zero `width` or `height` is derived from the source aspect ratio.
/// When the larger side exceeds `max_dimension` both sides are scaled down
/// by the same factor. Results are clamped to at least one pixel. Callers
/// skip resizing when both are zero.
pub fn target_dimensions(
    src_width: u32,
    src_height: u32,
    width: u32,
    height: u32,
    max_dimension: u32,
) -> (u32, u32) {
    let ratio = src_width as f64 / src_height as f64;
    let mut new_width = if width > 0 { width as f64 } else { (height as f64 * ratio).round() };
    let mut new_height = if height > 0 { height as f64 } else { (width as f64 / ratio).round() };

    let limit = max_dimension.max(1) as f64;
    let largest = new_width.max(new_height);
    if largest > limit {
        let scale = limit / largest;
        new_width = (new_width * scale).round().min(limit);
        new_height = (new_height * scale).round().min(limit);
    }
    (new_width.max(1.0) as u32, new_height.max(1.0) as u32)
}
