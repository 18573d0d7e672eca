//! Decoder adapter backed by the `image` crate.

use std::io::Cursor;

use async_trait::async_trait;
use bytes::Bytes;
use image::AnimationDecoder;
use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use tracing::trace;

use crate::domain::entities::{Dimensions, PixelBuffer};
use crate::domain::errors::DecodeError;
use crate::domain::ports::DecoderPort;

/// Decodes images on the blocking thread pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateDecoder;

impl ImageCrateDecoder {
    /// Creates the decoder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// Runs CPU-bound decoding off the async workers.
async fn run_blocking<T, F>(job: F) -> Result<T, DecodeError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, DecodeError> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| DecodeError::new(format!("Decode task panicked: {e}")))?
}

fn decode_error(context: &str, err: impl std::fmt::Display) -> DecodeError {
    DecodeError::new(format!("{context}: {err}"))
}

#[async_trait]
impl DecoderPort for ImageCrateDecoder {
    async fn probe(&self, bytes: Bytes) -> Result<Dimensions, DecodeError> {
        run_blocking(move || {
            let (width, height) = image::ImageReader::new(Cursor::new(&bytes[..]))
                .with_guessed_format()
                .map_err(|e| decode_error("Failed to read header", e))?
                .into_dimensions()
                .map_err(|e| decode_error("Failed to read dimensions", e))?;
            trace!(width, height, "Probed image");
            Ok(Dimensions::new(width, height))
        })
        .await
    }

    async fn decode(&self, bytes: Bytes) -> Result<PixelBuffer, DecodeError> {
        run_blocking(move || {
            let decoded = image::load_from_memory(&bytes)
                .map_err(|e| decode_error("Failed to decode image", e))?
                .to_rgba8();
            let dimensions = Dimensions::new(decoded.width(), decoded.height());
            PixelBuffer::new(dimensions, decoded.into_raw())
                .ok_or_else(|| DecodeError::new("Decoded buffer has unexpected length"))
        })
        .await
    }

    async fn is_animated(&self, bytes: Bytes) -> Result<bool, DecodeError> {
        run_blocking(move || {
            let format = image::guess_format(&bytes)
                .map_err(|e| decode_error("Unrecognized image format", e))?;
            let reader = Cursor::new(&bytes[..]);
            match format {
                image::ImageFormat::Gif => {
                    let decoder =
                        GifDecoder::new(reader).map_err(|e| decode_error("Invalid GIF", e))?;
                    Ok(decoder.into_frames().take(2).count() > 1)
                }
                image::ImageFormat::Png => PngDecoder::new(reader)
                    .and_then(|decoder| decoder.is_apng())
                    .map_err(|e| decode_error("Invalid PNG", e)),
                image::ImageFormat::WebP => WebPDecoder::new(reader)
                    .map(|decoder| decoder.has_animation())
                    .map_err(|e| decode_error("Invalid WebP", e)),
                _ => Ok(false),
            }
        })
        .await
    }
}
