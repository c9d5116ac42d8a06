//! In-process order cache
//!
//! Wraps a [`CacheStore`] in `Arc<RwLock<_>>` and owns the TTL cleanup task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, CacheStore, OrderCache};
use crate::error::Result;
use crate::models::Order;
use crate::tasks::spawn_cleanup_task;

// == In-Memory Cache ==
/// Bounded LRU cache with per-entry TTL.
///
/// Lookups that may evict an expired entry take the write lock; snapshots and
/// stats take the read lock.
pub struct InMemoryCache {
    store: Arc<RwLock<CacheStore>>,
    shutdown: CancellationToken,
    cleanup: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl InMemoryCache {
    /// Creates a cache holding at most `capacity` orders.
    ///
    /// With a non-zero `ttl` a cleanup task is spawned on the current tokio
    /// runtime, sweeping every `ttl / 2`.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let store = Arc::new(RwLock::new(CacheStore::new(capacity, ttl)));
        let shutdown = CancellationToken::new();

        let cleanup = if ttl.is_zero() {
            None
        } else if tokio::runtime::Handle::try_current().is_ok() {
            Some(spawn_cleanup_task(
                store.clone(),
                cleanup_interval(ttl),
                shutdown.child_token(),
            ))
        } else {
            warn!("No tokio runtime, expired orders are only dropped on read");
            None
        };

        Self {
            store,
            shutdown,
            cleanup: Mutex::new(cleanup),
            closed: AtomicBool::new(false),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

fn cleanup_interval(ttl: Duration) -> Duration {
    (ttl / 2).max(Duration::from_millis(1))
}

#[async_trait]
impl OrderCache for InMemoryCache {
    async fn save_order(&self, order: &Order) -> Result<()> {
        if self.is_closed() {
            debug!(order_uid = %order.order_uid, "Cache closed, dropping save");
            return Ok(());
        }
        self.store.write().await.save(order.clone());
        Ok(())
    }

    async fn get_order(&self, order_uid: &str) -> Result<Option<Order>> {
        if self.is_closed() {
            return Ok(None);
        }
        Ok(self.store.write().await.get(order_uid))
    }

    async fn order_exists(&self, order_uid: &str) -> Result<bool> {
        if self.is_closed() {
            return Ok(false);
        }
        Ok(self.store.write().await.contains(order_uid))
    }

    async fn remove_order(&self, order_uid: &str) -> Result<()> {
        self.store.write().await.remove(order_uid);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.store.write().await.clear();
        Ok(())
    }

    async fn get_all_orders(&self) -> Result<Vec<Order>> {
        if self.is_closed() {
            return Ok(Vec::new());
        }
        Ok(self.store.read().await.orders())
    }

    async fn stats(&self) -> Result<CacheStats> {
        Ok(self.store.read().await.stats())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.shutdown.cancel();
        let handle = self
            .cleanup
            .lock()
            .map(|mut guard| guard.take())
            .unwrap_or_else(|poisoned| poisoned.into_inner().take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Cleanup task ended abnormally");
            }
        }

        self.store.write().await.clear();
        info!("In-memory order cache closed");
        Ok(())
    }
}

impl Drop for InMemoryCache {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
