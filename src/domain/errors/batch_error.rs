//! Programmer-error conditions raised synchronously by the batch pipeline.

use thiserror::Error;

/// Batch-level errors. Per-item failures are never reported through this type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum BatchError {
    #[error("concurrency limit must be at least 1, got {limit}")]
    InvalidConcurrency { limit: usize },

    #[error("state store has been torn down")]
    StoreClosed,
}
