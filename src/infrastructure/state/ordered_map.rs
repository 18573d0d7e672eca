//! Insertion-ordered map with amortized O(1) removal.

use std::collections::HashMap;
use std::hash::Hash;

/// Dead slots tolerated before compaction is considered.
const MIN_COMPACT_TOMBSTONES: usize = 16;

/// Hash map that iterates in insertion order.
///
/// Removal leaves a tombstone in the order list instead of shifting it. The
/// list is rebuilt once tombstones outnumber live entries, which keeps
/// removal O(1) amortized and iteration O(live + dead) with dead ≤ live.
/// There is no eviction: entries leave only through explicit removal.
#[derive(Debug, Clone)]
pub struct OrderedMap<K, V> {
    entries: HashMap<K, (usize, V)>,
    order: Vec<Option<K>>,
    tombstones: usize,
}

impl<K: Hash + Eq + Clone, V> OrderedMap<K, V> {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            tombstones: 0,
        }
    }

    /// Inserts at the tail. Replacing an existing key keeps its position and
    /// returns the old value.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Some((_, slot)) = self.entries.get_mut(&key) {
            return Some(std::mem::replace(slot, value));
        }
        self.order.push(Some(key.clone()));
        self.entries.insert(key, (self.order.len() - 1, value));
        None
    }

    /// Returns the value for a key.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|(_, v)| v)
    }

    /// Replaces the value of an existing key in place.
    pub fn replace(&mut self, key: &K, value: V) -> Option<V> {
        self.entries
            .get_mut(key)
            .map(|(_, slot)| std::mem::replace(slot, value))
    }

    /// Returns true if the key is present.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Removes a key, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let (position, value) = self.entries.remove(key)?;
        self.order[position] = None;
        self.tombstones += 1;
        self.maybe_compact();
        Some(value)
    }

    /// Removes every entry matching `predicate`, returning them in order.
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&K, &V) -> bool) -> Vec<(K, V)> {
        let doomed: Vec<K> = self
            .iter()
            .filter(|&(k, v)| predicate(k, v))
            .map(|(k, _)| k.clone())
            .collect();

        doomed
            .into_iter()
            .filter_map(|k| self.remove(&k).map(|v| (k, v)))
            .collect()
    }

    /// Removes everything, returning the entries in order.
    pub fn drain(&mut self) -> Vec<(K, V)> {
        let order = std::mem::take(&mut self.order);
        let mut entries = std::mem::take(&mut self.entries);
        self.tombstones = 0;
        order
            .into_iter()
            .flatten()
            .filter_map(|k| entries.remove(&k).map(|(_, v)| (k, v)))
            .collect()
    }

    /// Iterates in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.order
            .iter()
            .flatten()
            .filter_map(|k| self.entries.get(k).map(|(_, v)| (k, v)))
    }

    /// Values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, v)| v)
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entry is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn maybe_compact(&mut self) {
        if self.tombstones < MIN_COMPACT_TOMBSTONES || self.tombstones * 2 <= self.order.len() {
            return;
        }
        self.order.retain(Option::is_some);
        for (position, key) in self.order.iter().enumerate() {
            if let Some((slot, _)) = key.as_ref().and_then(|k| self.entries.get_mut(k)) {
                *slot = position;
            }
        }
        self.tombstones = 0;
    }
}

impl<K: Hash + Eq + Clone, V> Default for OrderedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(map: &OrderedMap<u32, &str>) -> Vec<u32> {
        map.iter().map(|(k, _)| *k).collect()
    }

    #[test]
    fn test_iterates_in_insertion_order() {
        let mut map = OrderedMap::new();
        for (k, v) in [(3, "c"), (1, "a"), (2, "b")] {
            map.insert(k, v);
        }
        assert_eq!(keys(&map), vec![3, 1, 2]);
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut map = OrderedMap::new();
        for k in [1, 2, 3] {
            map.insert(k, "x");
        }
        assert_eq!(map.remove(&2), Some("x"));
        assert_eq!(map.remove(&2), None);
        assert_eq!(keys(&map), vec![1, 3]);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_reinsert_existing_keeps_position() {
        let mut map = OrderedMap::new();
        map.insert(1, "a");
        map.insert(2, "b");
        assert_eq!(map.insert(1, "z"), Some("a"));
        assert_eq!(keys(&map), vec![1, 2]);
        assert_eq!(map.get(&1), Some(&"z"));
    }

    #[test]
    fn test_compaction_keeps_positions_consistent() {
        let mut map = OrderedMap::new();
        for k in 0..100 {
            map.insert(k, "v");
        }
        for k in (0..100).filter(|k| k % 3 != 0) {
            map.remove(&k);
        }
        assert!(map.order.len() < 100);

        // Removals after compaction must hit the right slots.
        map.remove(&3);
        map.remove(&99);
        map.insert(1000, "tail");

        let expected: Vec<u32> = (0..100)
            .filter(|k| k % 3 == 0 && *k != 3 && *k != 99)
            .chain(std::iter::once(1000))
            .collect();
        assert_eq!(keys(&map), expected);
    }

    #[test]
    fn test_remove_where_and_drain() {
        let mut map = OrderedMap::new();
        for (k, v) in [(1, "keep"), (2, "drop"), (3, "keep"), (4, "drop")] {
            map.insert(k, v);
        }

        let removed = map.remove_where(|_, v| *v == "drop");
        assert_eq!(removed, vec![(2, "drop"), (4, "drop")]);
        assert_eq!(keys(&map), vec![1, 3]);

        let drained = map.drain();
        assert_eq!(drained, vec![(1, "keep"), (3, "keep")]);
        assert!(map.is_empty());
        assert_eq!(map.iter().count(), 0);
    }
}
