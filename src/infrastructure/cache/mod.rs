//! Caching infrastructure.
//!
//! This module provides:
//! - A fixed-capacity LRU cache
//! - Cache key derivation from file metadata
//! - The memoization layer for image analysis

pub mod analysis_cache;
pub mod bounded_cache;
pub mod cache_key;

pub use analysis_cache::{AnalysisCache, AnalysisCacheStats, CacheConfig, CacheSlot};
pub use bounded_cache::BoundedCache;
pub use cache_key::CacheKey;
