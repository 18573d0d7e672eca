//! Application layer with services and DTOs.

/// Data transfer objects.
pub mod dto;
/// Service implementations.
pub mod services;

pub use dto::{BatchOptions, BatchOutcome, BatchReport, ItemResult, OperationKind};
pub use services::{ImageAnalyzer, ImageBatchService};
