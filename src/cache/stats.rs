//! Cache Statistics Module
//!
//! Tracks store usage: live entry count, hits, misses and evictions.

use serde::Serialize;

// == Cache Stats ==
/// Point-in-time usage counters for one store.
///
/// `hits`, `misses` and `evictions` only ever grow; `clear` resets `size`
/// but leaves the counters alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Current number of live entries
    pub size: usize,
    /// Number of successful lookups
    pub hits: u64,
    /// Number of failed lookups (absent or expired)
    pub misses: u64,
    /// Number of entries evicted to respect the byte limit
    pub evictions: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
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

    pub fn set_size(&mut self, size: usize) {
        self.size = size;
    }
}
