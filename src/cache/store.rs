//! Cache Store Module
//!
//! Order storage combining a HashMap with LRU tracking and TTL expiration.
//! `CacheStore` is plain single-threaded state; [`InMemoryCache`] owns it
//! behind a lock.
//!
//! [`InMemoryCache`]: super::InMemoryCache

use std::collections::HashMap;
use std::time::Duration;

use crate::cache::entry::current_timestamp_ms;
use crate::cache::{CacheEntry, CacheStats, LruTracker};
use crate::models::Order;

// == Cache Store ==
/// Order storage with LRU eviction and TTL support.
#[derive(Debug)]
pub struct CacheStore {
    /// Orders keyed by `order_uid`
    entries: HashMap<String, CacheEntry>,
    /// LRU access tracker
    lru: LruTracker,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of entries allowed, 0 = unbounded
    capacity: usize,
    /// Entry TTL, zero = entries never expire
    ttl: Duration,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a new CacheStore with the given capacity and TTL.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity.min(4096)),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            capacity,
            ttl,
        }
    }

    // == Save ==
    /// Upserts an order by `order_uid`.
    ///
    /// The entry becomes the most recently used and its expiry is reset. If
    /// the cache is over capacity afterwards, least recently used entries are
    /// evicted until it is not.
    pub fn save(&mut self, order: Order) {
        let key = order.order_uid.clone();
        self.entries
            .insert(key.clone(), CacheEntry::new(order, self.ttl));
        self.lru.touch(&key);

        let mut evicted = 0;
        while self.capacity > 0 && self.entries.len() > self.capacity {
            match self.lru.evict_oldest() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                    evicted += 1;
                }
                None => break,
            }
        }
        self.stats.record_evictions(evicted);
    }

    // == Get ==
    /// Retrieves an order by id.
    ///
    /// Expired entries are removed on observation and counted as misses.
    pub fn get(&mut self, order_uid: &str) -> Option<Order> {
        self.live_entry(order_uid).map(|entry| entry.order.clone())
    }

    // == Contains ==
    /// Same lookup as [`get`](Self::get) without cloning the order.
    pub fn contains(&mut self, order_uid: &str) -> bool {
        self.live_entry(order_uid).is_some()
    }

    fn live_entry(&mut self, order_uid: &str) -> Option<&CacheEntry> {
        let expired = match self.entries.get(order_uid) {
            Some(entry) => entry.is_expired(),
            None => {
                self.stats.record_lookup(false);
                return None;
            }
        };

        if expired {
            self.entries.remove(order_uid);
            self.lru.remove(order_uid);
            self.stats.record_expirations(1);
            self.stats.record_lookup(false);
            return None;
        }

        self.stats.record_lookup(true);
        self.lru.touch(order_uid);
        self.entries.get(order_uid)
    }

    // == Remove ==
    /// Removes an order. Returns false if it was not present.
    pub fn remove(&mut self, order_uid: &str) -> bool {
        let removed = self.entries.remove(order_uid).is_some();
        if removed {
            self.lru.remove(order_uid);
        }
        removed
    }

    // == Clear ==
    /// Drops every entry. Statistics counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
    }

    // == Snapshot ==
    /// Returns all non-expired orders, most recently used first.
    ///
    /// Read-only: expired entries are skipped here and left to the sweep or
    /// the next read of that key.
    pub fn orders(&self) -> Vec<Order> {
        let now = current_timestamp_ms();
        self.lru
            .iter()
            .filter_map(|key| self.entries.get(key))
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.order.clone())
            .collect()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.with_total_entries(self.entries.len())
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the cache.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = current_timestamp_ms();
        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        let count = expired_keys.len();

        for key in expired_keys {
            self.entries.remove(&key);
            self.lru.remove(&key);
        }

        self.stats.record_expirations(count);
        count
    }

    // == Length ==
    /// Returns the current number of entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
