//! Application services.

pub mod analysis_service;
pub mod batch_service;

pub use analysis_service::ImageAnalyzer;
pub use batch_service::ImageBatchService;
