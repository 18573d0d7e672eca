//! Domain error types.

mod batch_error;
mod processing_error;

pub use batch_error::BatchError;
pub use processing_error::{DecodeError, ProcessingError, TransformError};
