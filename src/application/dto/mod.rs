//! Data transfer objects for the application layer.

mod batch_dto;

pub use batch_dto::{BatchOptions, BatchOutcome, BatchReport, ItemResult, OperationKind};
