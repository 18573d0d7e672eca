//! Port definition for image transformation.

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::entities::ImageFormat;
use crate::domain::errors::TransformError;

/// Target constraints for a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformOptions {
    /// Output format.
    pub format: ImageFormat,
    /// Encoder quality, 0-100. Ignored by lossless formats.
    pub quality: u8,
    /// Best-effort upper bound on the output size.
    pub max_bytes: Option<u64>,
    /// Upper bound on the longest side; larger images are downscaled.
    pub max_dimension: Option<u32>,
}

impl TransformOptions {
    /// Creates options for a format and quality (clamped to 100).
    #[must_use]
    pub fn new(format: ImageFormat, quality: u8) -> Self {
        Self {
            format,
            quality: quality.min(100),
            max_bytes: None,
            max_dimension: None,
        }
    }

    /// Sets the output size limit.
    #[must_use]
    pub const fn with_max_bytes(mut self, max_bytes: Option<u64>) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Sets the longest edge allowed.
    #[must_use]
    pub const fn with_max_dimension(mut self, max_dimension: Option<u32>) -> Self {
        self.max_dimension = max_dimension;
        self
    }
}

/// Port for the external codec.
/// Implementations must be thread-safe.
#[async_trait]
pub trait CodecPort: Send + Sync {
    /// Transforms raw image bytes according to `options`.
    async fn transform(
        &self,
        bytes: Bytes,
        options: TransformOptions,
    ) -> Result<Bytes, TransformError>;
}
