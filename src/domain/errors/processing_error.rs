//! Per-item processing error types.

use thiserror::Error;

/// The codec failed to transform an image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transform failed: {message}")]
pub struct TransformError {
    message: String,
}

impl TransformError {
    /// Creates a transform error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Human-readable cause.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The decoder could not read an image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("decode failed: {message}")]
pub struct DecodeError {
    message: String,
}

impl DecodeError {
    /// Creates a decode error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Human-readable cause.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Failure of a single batch item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum ProcessingError {
    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The batch was aborted before this item was dispatched.
    #[error("cancelled before processing started")]
    Cancelled,
}

impl ProcessingError {
    /// Returns whether the item was cancelled rather than failed.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
