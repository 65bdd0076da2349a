//! Cache Store Module
//!
//! Fixed-capacity cache combining a HashMap index with an LRU list.

use std::collections::HashMap;

use bytes::Bytes;
use tracing::debug;

use crate::cache::lru::{LruList, NodeId};
use crate::cache::{CacheEntry, CacheStats, MAX_CAPACITY};
use crate::error::{CacheError, Result};

// == Cache Store ==
/// LRU cache holding at most `max_keys` entries.
///
/// The index maps each key to its node in the recency list; the list node
/// carries the key back so eviction can clean the index. Both are only ever
/// changed together inside one `&mut self` method, so they always hold the
/// same key set.
#[derive(Debug)]
pub struct CacheStore {
    /// Key to list node
    index: HashMap<String, NodeId>,
    /// Entries ordered most to least recently used
    order: LruList<(String, CacheEntry)>,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of entries allowed
    max_keys: usize,
}

impl CacheStore {
    // == Constructor ==
    /// Creates an empty store.
    ///
    /// Fails with `InvalidConfiguration` unless `1 <= capacity <= MAX_CAPACITY`.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 || capacity > MAX_CAPACITY {
            return Err(CacheError::InvalidConfiguration {
                capacity,
                max: MAX_CAPACITY,
            });
        }

        Ok(Self {
            index: HashMap::new(),
            order: LruList::new(),
            stats: CacheStats::new(),
            max_keys: capacity,
        })
    }

    // == Upsert ==
    /// Stores a value under `key` with zeroed metadata.
    pub fn upsert(&mut self, key: impl Into<String>, value: impl Into<Bytes>) {
        self.upsert_entry(key.into(), CacheEntry::new(value));
    }

    /// Inserts or replaces an entry and marks it most recently used.
    ///
    /// Replacing an existing key never evicts. A new key arriving while the
    /// store is full first evicts the least recently used entry.
    pub fn upsert_entry(&mut self, key: String, entry: CacheEntry) {
        if let Some(&id) = self.index.get(&key) {
            if let Some((_, slot)) = self.order.get_mut(id) {
                *slot = entry;
            }
            self.order.move_to_front(id);
            return;
        }

        if self.index.len() == self.max_keys {
            self.evict_oldest();
        }

        let id = self.order.push_front((key.clone(), entry));
        self.index.insert(key, id);
    }

    // == Get ==
    /// Returns the value for `key` and promotes it to most recently used.
    pub fn get(&mut self, key: &str) -> Result<Bytes> {
        let Some(&id) = self.index.get(key) else {
            self.stats.record_miss();
            return Err(CacheError::NotFound(key.to_string()));
        };

        self.order.move_to_front(id);
        self.stats.record_hit();
        self.order
            .get(id)
            .map(|(_, entry)| entry.value.clone())
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }

    // == Peek ==
    /// Returns the stored entry without touching recency or stats.
    pub fn peek(&self, key: &str) -> Option<&CacheEntry> {
        let id = *self.index.get(key)?;
        self.order.get(id).map(|(_, entry)| entry)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Keys from most to least recently used.
    pub fn keys_by_recency(&self) -> Vec<String> {
        self.order.iter().map(|(key, _)| key.clone()).collect()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats;
        stats.total_entries = self.index.len();
        stats
    }

    // == Length ==
    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_keys
    }

    fn evict_oldest(&mut self) {
        if let Some((key, _)) = self.order.pop_back() {
            self.index.remove(&key);
            self.stats.record_eviction();
            debug!(key = %key, "Evicted least recently used entry");
        }
    }
}
