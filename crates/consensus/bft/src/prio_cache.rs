//! Priority-keyed cache for partially built vote sets.
//!
//! Unlike the recency-based LRU caches, eviction here follows an
//! explicit priority: entries are keyed by block id with priority set to
//! the block number, so stale partial sets from older blocks fall out
//! first while the tips of live branches stay resident.

use std::{collections::HashMap, hash::Hash};

#[derive(Debug)]
struct Entry<V> {
    value: V,
    priority: u32,
}

/// Bounded map evicting the lowest-priority entry on overflow.
#[derive(Debug)]
pub(crate) struct PrioCache<K, V> {
    capacity: usize,
    entries: HashMap<K, Entry<V>>,
}

impl<K: Eq + Hash + Copy, V> PrioCache<K, V> {
    /// Create a cache holding at most `capacity` entries.
    pub(crate) fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be positive");
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
        }
    }

    /// Insert `value` under `key`. When the cache is full and the key is
    /// new, the entry with the lowest priority is dropped first.
    pub(crate) fn insert(&mut self, key: K, value: V, priority: u32) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            self.evict_lowest();
        }
        self.entries.insert(key, Entry { value, priority });
    }

    /// Take the entry stored under `key` out of the cache.
    pub(crate) fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|entry| entry.value)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn evict_lowest(&mut self) {
        // Capacity is small (16 for vote sets); a scan beats keeping a
        // heap coherent under removals.
        if let Some(key) = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.priority)
            .map(|(key, _)| *key)
        {
            self.entries.remove(&key);
        }
    }
}
