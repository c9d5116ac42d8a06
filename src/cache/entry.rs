//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::models::Order;

// == Cache Entry ==
/// A cached order plus its timing metadata.
///
/// Entries are replaced wholesale on every save; the order inside is never
/// mutated in place.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The cached order
    pub order: Order,
    /// Creation/refresh timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry. A zero `ttl` means the entry never expires.
    pub fn new(order: Order, ttl: Duration) -> Self {
        let now = current_timestamp_ms();
        let expires_at = if ttl.is_zero() {
            None
        } else {
            Some(now.saturating_add(ttl.as_millis() as u64))
        };

        Self {
            order,
            created_at: now,
            expires_at,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time reaches its expiration time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    /// Expiry check against a caller supplied clock reading, so a sweep can
    /// judge every entry against the same instant.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        match self.expires_at {
            Some(expires) => now_ms >= expires,
            None => false,
        }
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
