//! Infrastructure layer with caches, batch scheduling and adapters.

/// Batch ordering, concurrency limiting and cancellation.
pub mod batch;
/// Bounded LRU caches for image analysis.
pub mod cache;
/// Application configuration.
pub mod config;
/// Image decoding and encoding backed by the `image` crate.
pub mod image;
/// Tracing subscriber setup.
pub mod logging;
/// In-memory resource handles.
pub mod resources;
/// Batch item state store.
pub mod state;

pub use batch::{AbortableBatch, BatchController, ConcurrencyLimiter, order_by_size};
pub use cache::{AnalysisCache, AnalysisCacheStats, BoundedCache, CacheConfig, CacheKey};
pub use config::{AppConfig, BatchConfig, ConfigError, ConfigStore, LogLevel};
pub use image::{ImageCrateCodec, ImageCrateDecoder};
pub use logging::init_logging;
pub use resources::InMemoryResources;
pub use state::{StateStore, StoreSummary, SubscriptionId};
