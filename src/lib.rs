//! Imagepress - image conversion and analysis toolkit.
//!
//! This crate runs batches of images through a codec with bounded
//! concurrency and cooperative cancellation, tracks each item in an
//! observable state store, and memoizes image analysis in bounded LRU caches.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing services and DTOs.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing caches, batching, and adapters.
pub mod infrastructure;

pub use application::{BatchOptions, BatchReport, ImageAnalyzer, ImageBatchService, OperationKind};
pub use domain::{ImageInput, ItemId, ItemStatus};

/// Current version of the library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = "imagepress";
