//! Domain layer with core entities, errors, and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{BatchItemRecord, ImageInput, ItemId, ItemStatus};
pub use errors::{BatchError, DecodeError, ProcessingError, TransformError};
pub use ports::{CodecPort, DecoderPort, ResourcePort, TransformOptions};
