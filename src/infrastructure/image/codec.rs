//! Codec adapter backed by the `image` crate.

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use tracing::{debug, warn};

use crate::domain::entities::ImageFormat;
use crate::domain::errors::TransformError;
use crate::domain::ports::{CodecPort, TransformOptions};

/// Lowest JPEG quality tried when shrinking towards `max_bytes`.
const MIN_JPEG_QUALITY: u8 = 10;
/// Quality decrement per attempt.
const QUALITY_STEP: u8 = 10;
/// Encode attempts before giving up on `max_bytes`.
const MAX_ATTEMPTS: usize = 12;

/// Resizes and re-encodes images on the blocking thread pool.
///
/// WebP output is lossless, so `quality` only affects JPEG. When the output
/// exceeds `max_bytes`, JPEG quality is lowered first and then the image is
/// downscaled; the last attempt is returned even if it is still too large.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateCodec;

impl ImageCrateCodec {
    /// Creates the codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn transform_error(context: &str, err: impl std::fmt::Display) -> TransformError {
    TransformError::new(format!("{context}: {err}"))
}

fn encode(
    image: &DynamicImage,
    format: ImageFormat,
    quality: u8,
) -> Result<Vec<u8>, TransformError> {
    let mut buf = Vec::new();
    let result = match format {
        ImageFormat::Png => image.write_with_encoder(PngEncoder::new(&mut buf)),
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8())
            .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))),
        ImageFormat::Webp => DynamicImage::ImageRgba8(image.to_rgba8())
            .write_with_encoder(WebPEncoder::new_lossless(&mut buf)),
        ImageFormat::Gif => {
            return Err(TransformError::new("GIF is not supported as an output format"));
        }
    };
    result.map_err(|e| transform_error("Failed to encode image", e))?;
    Ok(buf)
}

fn fit_within(image: DynamicImage, max_dimension: Option<u32>) -> DynamicImage {
    match max_dimension {
        Some(max) if max > 0 && (image.width() > max || image.height() > max) => {
            image.resize(max, max, FilterType::Lanczos3)
        }
        _ => image,
    }
}

fn transform_blocking(bytes: &[u8], options: TransformOptions) -> Result<Vec<u8>, TransformError> {
    let decoded =
        image::load_from_memory(bytes).map_err(|e| transform_error("Failed to decode source", e))?;
    let mut image = fit_within(decoded, options.max_dimension);
    let mut quality = options.quality;

    for attempt in 1..=MAX_ATTEMPTS {
        let encoded = encode(&image, options.format, quality)?;
        let Some(max_bytes) = options.max_bytes else {
            return Ok(encoded);
        };
        if encoded.len() as u64 <= max_bytes {
            return Ok(encoded);
        }
        if attempt == MAX_ATTEMPTS || (image.width() <= 1 && image.height() <= 1) {
            warn!(
                size = encoded.len(),
                max_bytes, "Could not reach target size, returning best effort"
            );
            return Ok(encoded);
        }

        if options.format == ImageFormat::Jpeg && quality > MIN_JPEG_QUALITY {
            quality = quality.saturating_sub(QUALITY_STEP).max(MIN_JPEG_QUALITY);
        } else {
            let (w, h) = (image.width(), image.height());
            image = image.resize_exact(
                (w * 4 / 5).max(1),
                (h * 4 / 5).max(1),
                FilterType::Triangle,
            );
        }
        debug!(attempt, quality, size = encoded.len(), "Output too large, retrying");
    }

    Err(TransformError::new("exhausted encode attempts"))
}

#[async_trait]
impl CodecPort for ImageCrateCodec {
    async fn transform(
        &self,
        bytes: Bytes,
        options: TransformOptions,
    ) -> Result<Bytes, TransformError> {
        if !options.format.is_encodable() {
            return Err(TransformError::new(format!(
                "{} is not supported as an output format",
                options.format
            )));
        }
        let encoded = tokio::task::spawn_blocking(move || transform_blocking(&bytes, options))
            .await
            .map_err(|e| transform_error("Transform task panicked", e))??;
        Ok(Bytes::from(encoded))
    }
}
