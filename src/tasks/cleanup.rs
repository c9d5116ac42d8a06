//! TTL Cleanup Task
//!
//! Background task that periodically removes expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::CacheStore;

/// Spawns a task that sweeps expired entries every `interval` until
/// `shutdown` is cancelled.
///
/// The write lock is held only for the sweep itself.
pub fn spawn_cleanup_task(
    cache: Arc<RwLock<CacheStore>>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            interval_ms = interval.as_millis() as u64,
            "Starting TTL cleanup task"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let removed = {
                let mut cache_guard = cache.write().await;
                cache_guard.cleanup_expired()
            };

            if removed > 0 {
                info!(removed, "TTL cleanup: removed expired orders");
            } else {
                debug!("TTL cleanup: no expired orders found");
            }
        }

        debug!("TTL cleanup task stopped");
    })
}
