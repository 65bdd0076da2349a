//! Cache Statistics Module
//!
//! Internal counters for lookups and evictions. These are logged, not served:
//! the protocol has no stats command.

use std::fmt;

// == Cache Stats ==
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups that found their key
    pub hits: u64,
    /// Lookups on absent keys
    pub misses: u64,
    /// Entries dropped to make room for a new key
    pub evictions: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "entries={} hits={} misses={} evictions={} hit_rate={:.3}",
            self.total_entries,
            self.hits,
            self.misses,
            self.evictions,
            self.hit_rate()
        )
    }
}
