//! Port definition for image decoding.

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::entities::{Dimensions, PixelBuffer};
use crate::domain::errors::DecodeError;

/// Port for the external decoder.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DecoderPort: Send + Sync {
    /// Reads the pixel dimensions without decoding the full image.
    async fn probe(&self, bytes: Bytes) -> Result<Dimensions, DecodeError>;

    /// Decodes the image into RGBA8 pixels.
    async fn decode(&self, bytes: Bytes) -> Result<PixelBuffer, DecodeError>;

    /// Returns true if the image has more than one frame.
    async fn is_animated(&self, bytes: Bytes) -> Result<bool, DecodeError>;
}
