//! # LRU Cache
//!
//! A simple Least Recently Used (LRU) cache implementation.
//! Used by the process-wide road-graph cache to bound memory to a fixed
//! number of loaded graphs.

use std::collections::HashMap;
use std::hash::Hash;

/// A simple LRU cache with O(n) eviction.
///
/// The road-graph cache holds at most a handful of entries (4), so the
/// linear scan for eviction is acceptable and simpler than maintaining a
/// linked list.
#[derive(Debug)]
pub struct LruCache<K, V> {
    capacity: usize,
    entries: HashMap<K, CacheEntry<V>>,
    access_counter: u64,
}

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    last_access: u64,
}

impl<K: Eq + Hash + Clone, V: Clone> LruCache<K, V> {
    /// Create a new LRU cache with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            access_counter: 0,
        }
    }

    /// Get a value from the cache, updating its access time.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        if let Some(entry) = self.entries.get_mut(key) {
            self.access_counter += 1;
            entry.last_access = self.access_counter;
            Some(&entry.value)
        } else {
            None
        }
    }

    /// Get a cloned value from the cache (useful when you can't hold a reference).
    pub fn get_cloned(&mut self, key: &K) -> Option<V> {
        self.get(key).cloned()
    }

    /// Insert a value into the cache, evicting the oldest if at capacity.
    pub fn insert(&mut self, key: K, value: V) {
        // If key exists, just update it
        if let Some(entry) = self.entries.get_mut(&key) {
            self.access_counter += 1;
            entry.value = value;
            entry.last_access = self.access_counter;
            return;
        }

        // Evict oldest if at capacity
        if self.entries.len() >= self.capacity {
            self.evict_oldest();
        }

        self.access_counter += 1;
        self.entries.insert(
            key,
            CacheEntry {
                value,
                last_access: self.access_counter,
            },
        );
    }

    /// Remove a specific key from the cache.
    pub fn invalidate(&mut self, key: &K) {
        self.entries.remove(key);
    }

    /// Clear all entries from the cache.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.access_counter = 0;
    }

    /// Get the number of entries in the cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check if the cache contains a key.
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Evict the least recently used entry.
    fn evict_oldest(&mut self) {
        if self.entries.is_empty() {
            return;
        }

        // Find the entry with the smallest last_access
        let oldest_key = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_access)
            .map(|(k, _)| k.clone());

        if let Some(key) = oldest_key {
            self.entries.remove(&key);
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Default for LruCache<K, V> {
    fn default() -> Self {
        Self::new(100)
    }
}
