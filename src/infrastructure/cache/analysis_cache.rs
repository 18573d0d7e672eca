//! Memoization layer for image analysis results.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::domain::entities::{Dimensions, ImageInfo, Rgb};

use super::bounded_cache::BoundedCache;
use super::cache_key::CacheKey;

/// Default capacity of the dimensions cache.
pub const DEFAULT_DIMENSIONS_CAPACITY: usize = 100;
/// Default capacity of the full-info cache.
pub const DEFAULT_INFO_CAPACITY: usize = 50;
/// Default capacity of the transparency cache.
pub const DEFAULT_TRANSPARENCY_CAPACITY: usize = 100;
/// Default capacity of the dominant-color cache.
pub const DEFAULT_DOMINANT_COLOR_CAPACITY: usize = 50;

/// Capacities of the four analysis caches.
///
/// Dimension and transparency checks are cheap and repeated often, so they
/// get more slots than full info and color extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Dimensions cache capacity.
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    /// Full-info cache capacity.
    #[serde(default = "default_info")]
    pub info: usize,
    /// Transparency cache capacity.
    #[serde(default = "default_transparency")]
    pub transparency: usize,
    /// Dominant-color cache capacity.
    #[serde(default = "default_dominant_color")]
    pub dominant_color: usize,
}

const fn default_dimensions() -> usize {
    DEFAULT_DIMENSIONS_CAPACITY
}

const fn default_info() -> usize {
    DEFAULT_INFO_CAPACITY
}

const fn default_transparency() -> usize {
    DEFAULT_TRANSPARENCY_CAPACITY
}

const fn default_dominant_color() -> usize {
    DEFAULT_DOMINANT_COLOR_CAPACITY
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_DIMENSIONS_CAPACITY,
            info: DEFAULT_INFO_CAPACITY,
            transparency: DEFAULT_TRANSPARENCY_CAPACITY,
            dominant_color: DEFAULT_DOMINANT_COLOR_CAPACITY,
        }
    }
}

/// One named LRU cache with hit/miss counters.
pub struct CacheSlot<V> {
    name: &'static str,
    entries: Mutex<BoundedCache<CacheKey, V>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> CacheSlot<V> {
    fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            entries: Mutex::new(BoundedCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Returns the cached value for `key`, or computes and stores it.
    ///
    /// Errors from `compute` are returned as-is and nothing is cached. Two
    /// concurrent misses for the same key both compute; the later store wins.
    ///
    /// # Errors
    /// Returns whatever `compute` fails with.
    pub async fn get_or_compute<E, F, Fut>(&self, key: CacheKey, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.lookup(&key) {
            return Ok(value);
        }

        let value = compute().await?;
        self.entries.lock().set(key, value.clone());
        Ok(value)
    }

    fn lookup(&self, key: &CacheKey) -> Option<V> {
        let mut entries = self.entries.lock();
        if let Some(value) = entries.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(cache = self.name, key = %key, "Analysis cache hit");
            Some(value.clone())
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(cache = self.name, key = %key, "Analysis cache miss");
            None
        }
    }

    /// Returns true if `key` is cached, without touching its recency.
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.lock().has(key)
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entries.lock().capacity()
    }

    fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// The four analysis caches owned by one service instance.
pub struct AnalysisCache {
    /// Header dimensions per input.
    pub dimensions: CacheSlot<Dimensions>,
    /// Full metadata per input.
    pub info: CacheSlot<ImageInfo>,
    /// Transparency flag per input.
    pub transparency: CacheSlot<bool>,
    /// Dominant color per input.
    pub dominant_color: CacheSlot<Rgb>,
}

impl AnalysisCache {
    /// Creates empty caches with the given capacities.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            dimensions: CacheSlot::new("dimensions", config.dimensions),
            info: CacheSlot::new("info", config.info),
            transparency: CacheSlot::new("transparency", config.transparency),
            dominant_color: CacheSlot::new("dominant_color", config.dominant_color),
        }
    }

    /// Drops every entry in all four caches.
    pub fn clear_all(&self) {
        self.dimensions.clear();
        self.info.clear();
        self.transparency.clear();
        self.dominant_color.clear();
        debug!("Cleared analysis caches");
    }

    /// Returns the current size of each cache.
    #[must_use]
    pub fn stats(&self) -> AnalysisCacheStats {
        let slots = [
            (&self.dimensions.hits, &self.dimensions.misses),
            (&self.info.hits, &self.info.misses),
            (&self.transparency.hits, &self.transparency.misses),
            (&self.dominant_color.hits, &self.dominant_color.misses),
        ];
        let (hits, misses) = slots.iter().fold((0, 0), |(h, m), (hits, misses)| {
            (
                h + hits.load(Ordering::Relaxed),
                m + misses.load(Ordering::Relaxed),
            )
        });

        AnalysisCacheStats {
            dimensions: self.dimensions.len(),
            info: self.info.len(),
            transparency: self.transparency.len(),
            dominant_color: self.dominant_color.len(),
            hits,
            misses,
        }
    }
}

impl Default for AnalysisCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

/// Sizes of the analysis caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnalysisCacheStats {
    /// Entries in the dimensions cache.
    pub dimensions: usize,
    /// Entries in the full-info cache.
    pub info: usize,
    /// Entries in the transparency cache.
    pub transparency: usize,
    /// Entries in the dominant-color cache.
    pub dominant_color: usize,
    /// Lookups answered from any cache.
    pub hits: u64,
    /// Lookups that had to compute.
    pub misses: u64,
}

impl AnalysisCacheStats {
    /// Hit rate across all caches as a percentage.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total > 0 {
            (self.hits as f64 / total as f64) * 100.0
        } else {
            0.0
        }
    }
}

impl std::fmt::Display for AnalysisCacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Analysis cache: dimensions={} info={} transparency={} dominant_color={}, {:.1}% hit rate",
            self.dimensions,
            self.info,
            self.transparency,
            self.dominant_color,
            self.hit_rate()
        )
    }
}
