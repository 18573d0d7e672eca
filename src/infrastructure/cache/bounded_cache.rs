//! Fixed-capacity LRU cache.

use std::hash::Hash;
use std::num::NonZeroUsize;

use lru::LruCache;

/// Fixed-capacity cache with least-recently-used eviction.
///
/// Both [`get`](Self::get) hits and [`set`](Self::set) refresh an entry's
/// recency; [`has`](Self::has) does not. When full, inserting a new key
/// silently evicts the single least-recently-used entry. All operations are
/// O(1).
///
/// Not synchronized: reads mutate recency order, so shared use needs a lock.
#[derive(Debug)]
pub struct BoundedCache<K: Hash + Eq, V> {
    entries: LruCache<K, V>,
}

impl<K: Hash + Eq, V> BoundedCache<K, V> {
    /// Creates a cache holding at most `capacity` entries (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(cap),
        }
    }

    /// Returns the value for `key`, marking it most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// Inserts or replaces `key`, marking it most recently used.
    ///
    /// Returns the evicted entry when a new key pushed out the oldest one.
    pub fn set(&mut self, key: K, value: V) -> Option<(K, V)> {
        if self.entries.contains(&key) {
            self.entries.put(key, value);
            return None;
        }
        self.entries.push(key, value)
    }

    /// Returns true if `key` is cached, without touching its recency.
    #[must_use]
    pub fn has(&self, key: &K) -> bool {
        self.entries.contains(key)
    }

    /// Drops all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}
