//! Redis-backed order cache
//!
//! Orders are stored as JSON under `order:{order_uid}` with a per-key expiry.
//! Listing and clearing walk the keyspace with `SCAN`, so they are not atomic
//! with respect to concurrent writers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::redis::cmd;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, OrderCache};
use crate::error::{AppError, Result};
use crate::models::Order;

const KEY_PREFIX: &str = "order:";
const KEY_PATTERN: &str = "order:*";
const SCAN_BATCH: usize = 100;

fn order_key(order_uid: &str) -> String {
    format!("{}{}", KEY_PREFIX, order_uid)
}

fn cache_error(e: impl std::fmt::Display) -> AppError {
    AppError::Cache(e.to_string())
}

// == Redis Cache ==
pub struct RedisCache {
    pool: Pool,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RedisCache {
    /// Opens a pool for `url` and checks the server answers `PING`.
    pub async fn connect(url: &str, ttl: Duration) -> Result<Self> {
        let pool = Config::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(cache_error)?;

        let cache = Self::from_pool(pool, ttl);
        let mut conn = cache.conn().await?;
        let _: String = cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(cache_error)?;

        info!("Connected to redis order cache");
        Ok(cache)
    }

    pub fn from_pool(pool: Pool, ttl: Duration) -> Self {
        Self {
            pool,
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    async fn conn(&self) -> Result<Connection> {
        self.pool.get().await.map_err(cache_error)
    }

    fn ttl_millis(&self) -> u64 {
        (self.ttl.as_millis() as u64).max(1)
    }

    fn record_lookup(&self, found: bool) {
        let counter = if found { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Collects every order key with a cursor walk.
    async fn scan_keys(&self, conn: &mut Connection) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let (next, batch): (u64, Vec<String>) = cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(KEY_PATTERN)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(conn)
                .await
                .map_err(cache_error)?;

            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }
}

#[async_trait]
impl OrderCache for RedisCache {
    async fn save_order(&self, order: &Order) -> Result<()> {
        let payload = serde_json::to_string(order)?;
        let mut conn = self.conn().await?;

        let _: () = cmd("SET")
            .arg(order_key(&order.order_uid))
            .arg(payload)
            .arg("PX")
            .arg(self.ttl_millis())
            .query_async(&mut conn)
            .await
            .map_err(cache_error)?;

        debug!(order_uid = %order.order_uid, "Order cached in redis");
        Ok(())
    }

    async fn get_order(&self, order_uid: &str) -> Result<Option<Order>> {
        let mut conn = self.conn().await?;
        let data: Option<String> = cmd("GET")
            .arg(order_key(order_uid))
            .query_async(&mut conn)
            .await
            .map_err(cache_error)?;

        self.record_lookup(data.is_some());
        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn order_exists(&self, order_uid: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        let exists: bool = cmd("EXISTS")
            .arg(order_key(order_uid))
            .query_async(&mut conn)
            .await
            .map_err(cache_error)?;

        self.record_lookup(exists);
        Ok(exists)
    }

    async fn remove_order(&self, order_uid: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: u64 = cmd("DEL")
            .arg(order_key(order_uid))
            .query_async(&mut conn)
            .await
            .map_err(cache_error)?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut conn = self.conn().await?;
        let keys = self.scan_keys(&mut conn).await?;

        for chunk in keys.chunks(SCAN_BATCH) {
            let _: u64 = cmd("DEL")
                .arg(chunk)
                .query_async(&mut conn)
                .await
                .map_err(cache_error)?;
        }

        info!(removed = keys.len(), "Cleared redis order cache");
        Ok(())
    }

    async fn get_all_orders(&self) -> Result<Vec<Order>> {
        let mut conn = self.conn().await?;
        let keys = self.scan_keys(&mut conn).await?;
        let mut orders = Vec::with_capacity(keys.len());

        for chunk in keys.chunks(SCAN_BATCH) {
            let values: Vec<Option<String>> = cmd("MGET")
                .arg(chunk)
                .query_async(&mut conn)
                .await
                .map_err(cache_error)?;

            // Keys that expired or were deleted since the scan come back nil
            for json in values.into_iter().flatten() {
                orders.push(serde_json::from_str(&json)?);
            }
        }

        Ok(orders)
    }

    async fn stats(&self) -> Result<CacheStats> {
        let mut conn = self.conn().await?;
        let keys = self.scan_keys(&mut conn).await?;

        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            total_entries: keys.len(),
            ..CacheStats::default()
        })
    }

    async fn close(&self) -> Result<()> {
        if self.pool.is_closed() {
            warn!("Redis order cache already closed");
            return Ok(());
        }
        self.pool.close();
        info!("Redis order cache closed");
        Ok(())
    }
}
