//! Cached image analysis.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::entities::{Dimensions, ImageFormat, ImageInfo, ImageInput, Rgb};
use crate::domain::errors::DecodeError;
use crate::domain::ports::DecoderPort;
use crate::infrastructure::cache::{AnalysisCache, AnalysisCacheStats, CacheConfig, CacheKey};

/// Answers questions about images, memoizing the expensive ones per input.
///
/// Results are keyed by [`CacheKey`], so inputs with the same name, size
/// and timestamp share entries.
pub struct ImageAnalyzer {
    decoder: Arc<dyn DecoderPort>,
    cache: AnalysisCache,
}

impl ImageAnalyzer {
    /// Creates an analyzer with empty caches.
    #[must_use]
    pub fn new(decoder: Arc<dyn DecoderPort>, config: CacheConfig) -> Self {
        Self {
            decoder,
            cache: AnalysisCache::new(config),
        }
    }

    /// Pixel dimensions, read from the header.
    ///
    /// # Errors
    /// Returns `DecodeError` if the header cannot be read. Failures are not cached.
    pub async fn dimensions(&self, input: &ImageInput) -> Result<Dimensions, DecodeError> {
        self.cache
            .dimensions
            .get_or_compute(CacheKey::for_input(input), || {
                self.decoder.probe(input.bytes().clone())
            })
            .await
    }

    /// Full metadata for an input.
    ///
    /// # Errors
    /// Returns `DecodeError` if the dimensions cannot be read.
    pub async fn info(&self, input: &ImageInput) -> Result<ImageInfo, DecodeError> {
        self.cache
            .info
            .get_or_compute(CacheKey::for_input(input), || async {
                let dimensions = self.dimensions(input).await?;
                let format = input.format();
                let mime_type = input
                    .mime_type()
                    .map(str::to_owned)
                    .or_else(|| format.map(|f| f.mime_type().to_owned()));

                Ok::<_, DecodeError>(ImageInfo {
                    name: input.name().to_owned(),
                    byte_size: input.size(),
                    last_modified: input.last_modified(),
                    dimensions,
                    format,
                    mime_type,
                    aspect_ratio: dimensions.aspect_ratio(),
                    megapixels: dimensions.megapixels(),
                })
            })
            .await
    }

    /// Returns true if any pixel is not fully opaque. JPEG is never transparent.
    ///
    /// Decode failures yield `false` and are not cached.
    pub async fn has_transparency(&self, input: &ImageInput) -> bool {
        self.cache
            .transparency
            .get_or_compute(CacheKey::for_input(input), || async {
                if input.format() == Some(ImageFormat::Jpeg) {
                    return Ok(false);
                }
                let pixels = self.decoder.decode(input.bytes().clone()).await?;
                Ok::<_, DecodeError>(pixels.has_transparency())
            })
            .await
            .unwrap_or_else(|e| {
                warn!(name = input.name(), error = %e, "Transparency check failed");
                false
            })
    }

    /// Most common color among opaque pixels.
    ///
    /// Decode failures yield black and are not cached.
    pub async fn dominant_color(&self, input: &ImageInput) -> Rgb {
        self.cache
            .dominant_color
            .get_or_compute(CacheKey::for_input(input), || async {
                let pixels = self.decoder.decode(input.bytes().clone()).await?;
                Ok::<_, DecodeError>(pixels.dominant_color())
            })
            .await
            .unwrap_or_else(|e| {
                warn!(name = input.name(), error = %e, "Dominant color extraction failed");
                Rgb::BLACK
            })
    }

    /// Returns true if the image has more than one frame. Not cached.
    pub async fn is_animated(&self, input: &ImageInput) -> bool {
        self.decoder
            .is_animated(input.bytes().clone())
            .await
            .unwrap_or_else(|e| {
                warn!(name = input.name(), error = %e, "Animation check failed");
                false
            })
    }

    /// Current cache sizes and hit counters.
    #[must_use]
    pub fn cache_stats(&self) -> AnalysisCacheStats {
        self.cache.stats()
    }

    /// Drops every cached result.
    pub fn clear_cache(&self) {
        self.cache.clear_all();
        debug!("Analysis caches cleared");
    }
}

impl std::fmt::Debug for ImageAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageAnalyzer")
            .field("cache", &self.cache.stats())
            .finish_non_exhaustive()
    }
}
