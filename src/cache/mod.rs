//! Cache Module
//!
//! The order cache capability and its two variants: an in-process LRU/TTL
//! cache and a Redis-backed remote cache. Both are used through
//! `Arc<dyn OrderCache>` by the ingestion pipeline and the HTTP API.

mod entry;
mod lru;
mod memory;
mod remote;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::{CacheConfig, CacheKind, RedisConfig};
use crate::error::Result;
use crate::models::Order;

// Re-export public types
pub use entry::CacheEntry;
pub use lru::LruTracker;
pub use memory::InMemoryCache;
pub use remote::RedisCache;
pub use stats::CacheStats;
pub use store::CacheStore;

// == Order Cache ==
/// Keyed order cache shared by the consumer, the cleanup task and API
/// handlers.
#[async_trait]
pub trait OrderCache: Send + Sync {
    /// Upserts an order by `order_uid`, refreshing its recency and expiry.
    async fn save_order(&self, order: &Order) -> Result<()>;

    /// Returns the order, or `None` when absent or expired.
    async fn get_order(&self, order_uid: &str) -> Result<Option<Order>>;

    /// Same observation as [`get_order`](Self::get_order).
    async fn order_exists(&self, order_uid: &str) -> Result<bool>;

    /// Removes an order. Absent ids are not an error.
    async fn remove_order(&self, order_uid: &str) -> Result<()>;

    /// Drops every cached order.
    async fn clear(&self) -> Result<()>;

    /// Snapshot of all live orders.
    async fn get_all_orders(&self) -> Result<Vec<Order>>;

    async fn stats(&self) -> Result<CacheStats>;

    /// Stops background maintenance and releases resources.
    async fn close(&self) -> Result<()>;
}

// == Factory ==
/// Builds the cache variant selected by `config.kind`.
///
/// The remote variant is pinged once so a bad URL fails at startup.
pub async fn build_cache(
    config: &CacheConfig,
    redis: &RedisConfig,
) -> Result<Arc<dyn OrderCache>> {
    match config.kind {
        CacheKind::InMemory => {
            let ttl = config.in_memory_ttl();
            info!(
                capacity = config.capacity,
                ttl_ms = ttl.as_millis() as u64,
                "Using in-memory order cache"
            );
            Ok(Arc::new(InMemoryCache::new(config.capacity, ttl)))
        }
        CacheKind::Redis => {
            let ttl = config.remote_ttl();
            let cache = RedisCache::connect(&redis.url, ttl).await?;
            info!(ttl_secs = ttl.as_secs(), "Using redis order cache");
            Ok(Arc::new(cache))
        }
    }
}
