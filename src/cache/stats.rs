//! Cache counters
//!
//! Lookup outcomes and removals are counted as they happen; the entry count
//! is filled in when a snapshot is taken.

use serde::Serialize;

/// Cumulative counters for one cache instance. `clear()` on the cache does
/// not reset them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    /// Lookups of absent or expired orders
    pub misses: u64,
    /// Orders dropped to stay within capacity
    pub evictions: u64,
    /// Orders dropped because their TTL elapsed, on read or by the sweep
    pub expirations: u64,
    pub total_entries: usize,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one `get`/`exists` observation.
    pub fn record_lookup(&mut self, found: bool) {
        if found {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
    }

    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }

    pub fn record_expirations(&mut self, count: usize) {
        self.expirations += count as u64;
    }

    /// Copy of the counters stamped with the current entry count.
    pub fn with_total_entries(&self, total_entries: usize) -> Self {
        Self {
            total_entries,
            ..self.clone()
        }
    }

    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    // == Hit Rate ==
    /// Fraction of lookups that found a live order, 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        match self.lookups() {
            0 => 0.0,
            total => self.hits as f64 / total as f64,
        }
    }
}
