//! Ingestion loop
//!
//! Turns raw stream messages into persisted, cached orders. Every message
//! ends in exactly one [`MessageOutcome`]; nothing here stops the loop except
//! cancellation or a failed cache restore.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::dead_letter::{deliver_dead_letter, DeadLetterSink};
use super::message::{DeadLetter, StreamMessage};
use super::transport::{Session, Transport, TransportError};
use crate::cache::OrderCache;
use crate::config::StreamConfig;
use crate::error::Result;
use crate::models::Order;
use crate::store::{OrderStore, StoreError};
use crate::validation::OrderValidator;

/// Pipeline timing knobs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub reconnect_delay: Duration,
    pub dead_letter_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(5),
            dead_letter_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&StreamConfig> for PipelineConfig {
    fn from(stream: &StreamConfig) -> Self {
        Self {
            reconnect_delay: stream.reconnect_delay,
            dead_letter_timeout: stream.dead_letter_timeout,
        }
    }
}

/// What happened to one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Persisted, then cached
    Stored,
    /// Already known, dropped without side effects
    Duplicate,
    /// Rejected and handed to the dead-letter sink
    DeadLettered { reason: String },
    /// The durable store refused the write; left unacknowledged
    PersistFailed,
}

impl MessageOutcome {
    /// Everything except a persistence failure is final for the transport.
    pub fn should_ack(&self) -> bool {
        !matches!(self, MessageOutcome::PersistFailed)
    }
}

/// Running totals, reported at shutdown.
#[derive(Debug, Default)]
pub struct PipelineStats {
    processed: AtomicU64,
    duplicates: AtomicU64,
    dead_lettered: AtomicU64,
    persist_failures: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStatsSnapshot {
    pub processed: u64,
    pub duplicates: u64,
    pub dead_lettered: u64,
    pub persist_failures: u64,
}

impl PipelineStats {
    fn record(&self, outcome: &MessageOutcome) {
        let counter = match outcome {
            MessageOutcome::Stored => &self.processed,
            MessageOutcome::Duplicate => &self.duplicates,
            MessageOutcome::DeadLettered { .. } => &self.dead_lettered,
            MessageOutcome::PersistFailed => &self.persist_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
        }
    }
}

// == Ingestion Pipeline ==
pub struct IngestionPipeline {
    cache: Arc<dyn OrderCache>,
    store: Arc<dyn OrderStore>,
    validator: OrderValidator,
    config: PipelineConfig,
    stats: PipelineStats,
}

/// How a session ended.
enum SessionEnd {
    Cancelled,
    Failed(TransportError),
    Closed,
}

impl IngestionPipeline {
    pub fn new(
        cache: Arc<dyn OrderCache>,
        store: Arc<dyn OrderStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            cache,
            store,
            validator: OrderValidator::new(),
            config,
            stats: PipelineStats::default(),
        }
    }

    pub fn stats(&self) -> PipelineStatsSnapshot {
        self.stats.snapshot()
    }

    // == Restore ==
    /// Replaces the cache contents with every order in the durable store.
    ///
    /// Returns the number of orders restored. Individual cache failures are
    /// logged and skipped; a failing store read is returned.
    pub async fn restore_cache(&self) -> Result<usize> {
        let orders = self.store.list_all().await?;

        if let Err(e) = self.cache.clear().await {
            warn!(error = %e, "Failed to clear cache before restore");
        }

        let mut restored = 0;
        for order in &orders {
            match self.cache.save_order(order).await {
                Ok(()) => restored += 1,
                Err(e) => error!(
                    order_uid = %order.order_uid,
                    error = %e,
                    "Failed to restore order to cache"
                ),
            }
        }

        info!(restored, total = orders.len(), "Cache restored from durable store");
        Ok(restored)
    }

    // == Handle Message ==
    /// Runs one message through decode, validation, dedup, persist and cache.
    pub async fn handle_message(
        &self,
        message: &StreamMessage,
        dead_letters: &dyn DeadLetterSink,
    ) -> MessageOutcome {
        let outcome = match self.accept(message).await {
            Ok(outcome) => outcome,
            Err(reason) => {
                warn!(message_id = %message.id, reason = %reason, "Rejecting message");
                let letter = DeadLetter::from_message(message, reason.clone());
                deliver_dead_letter(dead_letters, letter, self.config.dead_letter_timeout).await;
                MessageOutcome::DeadLettered { reason }
            }
        };

        self.stats.record(&outcome);
        outcome
    }

    /// Everything after decoding. `Err` carries a dead-letter reason.
    async fn accept(&self, message: &StreamMessage) -> std::result::Result<MessageOutcome, String> {
        let order = self.decode(message)?;
        let order_uid = order.order_uid.as_str();

        match self.cache.order_exists(order_uid).await {
            Ok(true) => {
                debug!(order_uid, "Duplicate order skipped");
                return Ok(MessageOutcome::Duplicate);
            }
            Ok(false) => {}
            Err(e) => warn!(order_uid, error = %e, "Failed to check cache"),
        }

        match self.store.put(&order).await {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) => {
                debug!(order_uid, "Order already in durable store");
                return Ok(MessageOutcome::Duplicate);
            }
            Err(e) => {
                error!(order_uid, error = %e, "Failed to persist order");
                return Ok(MessageOutcome::PersistFailed);
            }
        }

        if let Err(e) = self.cache.save_order(&order).await {
            error!(order_uid, error = %e, "Failed to cache persisted order");
        }

        info!(order_uid, "Order processed");
        Ok(MessageOutcome::Stored)
    }

    fn decode(&self, message: &StreamMessage) -> std::result::Result<Order, String> {
        if message.payload.is_empty() {
            return Err("empty message".to_string());
        }

        let order: Order = serde_json::from_slice(&message.payload)
            .map_err(|e| format!("unmarshal error: {}", e))?;

        if order.order_uid.is_empty() {
            return Err("empty order_uid".to_string());
        }

        self.validator
            .check(&order)
            .map_err(|e| format!("invalid order data: {}", e))?;

        Ok(order)
    }

    // == Run ==
    /// Restores the cache, then consumes sessions from `transport` until
    /// `shutdown` is cancelled, reconnecting after `reconnect_delay` whenever a
    /// session fails or closes.
    pub async fn run(&self, transport: &dyn Transport, shutdown: CancellationToken) -> Result<()> {
        info!("Restoring cache from durable store");
        self.restore_cache().await?;

        loop {
            let end = match transport.connect().await {
                Ok(session) => self.consume(session, &shutdown).await,
                Err(e) => SessionEnd::Failed(e),
            };

            match end {
                SessionEnd::Cancelled => break,
                SessionEnd::Failed(e) => error!(
                    error = %e,
                    delay_ms = self.config.reconnect_delay.as_millis() as u64,
                    "Consumer error, reconnecting"
                ),
                SessionEnd::Closed => info!(
                    delay_ms = self.config.reconnect_delay.as_millis() as u64,
                    "Order stream closed, reconnecting"
                ),
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
            }
        }

        let stats = self.stats();
        info!(
            processed = stats.processed,
            duplicates = stats.duplicates,
            dead_lettered = stats.dead_lettered,
            persist_failures = stats.persist_failures,
            "Consumer shutting down"
        );
        Ok(())
    }

    async fn consume(&self, session: Session, shutdown: &CancellationToken) -> SessionEnd {
        let Session {
            mut messages,
            dead_letters,
        } = session;

        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => return SessionEnd::Cancelled,
                next = messages.next_message() => next,
            };

            let message = match next {
                Ok(Some(message)) => message,
                Ok(None) => return SessionEnd::Closed,
                Err(e) => return SessionEnd::Failed(e),
            };

            let outcome = self.handle_message(&message, dead_letters.as_ref()).await;
            if !outcome.should_ack() {
                continue;
            }
            if let Err(e) = messages.ack(&message.id).await {
                return SessionEnd::Failed(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::models::order::fixtures::sample_order;
    use crate::pipeline::dead_letter::DeadLetterError;
    use crate::store::MemoryOrderStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<DeadLetter>>);

    #[async_trait]
    impl DeadLetterSink for RecordingSink {
        async fn send(&self, letter: DeadLetter) -> std::result::Result<(), DeadLetterError> {
            self.0.lock().unwrap().push(letter);
            Ok(())
        }
    }

    struct FailingStore;

    #[async_trait]
    impl OrderStore for FailingStore {
        async fn put(&self, _order: &Order) -> std::result::Result<(), StoreError> {
            Err(StoreError::Backend("connection reset".to_string()))
        }
        async fn get(&self, _order_uid: &str) -> std::result::Result<Option<Order>, StoreError> {
            Ok(None)
        }
        async fn list_all(&self) -> std::result::Result<Vec<Order>, StoreError> {
            Err(StoreError::Backend("connection reset".to_string()))
        }
    }

    fn pipeline_with(store: Arc<dyn OrderStore>) -> (IngestionPipeline, Arc<InMemoryCache>) {
        let cache = Arc::new(InMemoryCache::new(100, Duration::ZERO));
        let pipeline = IngestionPipeline::new(cache.clone(), store, PipelineConfig::default());
        (pipeline, cache)
    }

    fn message_for(order: &Order) -> StreamMessage {
        StreamMessage::new("1-0", serde_json::to_vec(order).unwrap())
    }

    #[tokio::test]
    async fn test_valid_order_is_stored_and_cached() {
        let store = Arc::new(MemoryOrderStore::new());
        let (pipeline, cache) = pipeline_with(store.clone());
        let sink = RecordingSink::default();
        let order = sample_order("b563feb7b2b84b6test");

        let outcome = pipeline.handle_message(&message_for(&order), &sink).await;

        assert_eq!(outcome, MessageOutcome::Stored);
        assert_eq!(store.get(&order.order_uid).await.unwrap(), Some(order.clone()));
        assert_eq!(cache.get_order(&order.order_uid).await.unwrap(), Some(order));
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejection_reasons() {
        let (pipeline, _cache) = pipeline_with(Arc::new(MemoryOrderStore::new()));
        let sink = RecordingSink::default();

        let mut no_uid = sample_order("x");
        no_uid.order_uid.clear();
        let mut bad_sale = sample_order("y");
        bad_sale.items[0].sale_percent = 150.0;

        let cases = [
            (StreamMessage::new("1", Vec::new()), "empty message"),
            (StreamMessage::new("2", b"{not json".to_vec()), "unmarshal error: "),
            (message_for(&no_uid), "empty order_uid"),
            (message_for(&bad_sale), "invalid order data: items[0].sale"),
            (
                StreamMessage::new("5", br#"{"order_uid":null,"track_number":"T"}"#.to_vec()),
                "empty order_uid",
            ),
        ];

        for (message, expected) in cases {
            match pipeline.handle_message(&message, &sink).await {
                MessageOutcome::DeadLettered { reason } => {
                    assert!(reason.starts_with(expected), "{} vs {}", reason, expected)
                }
                other => panic!("expected dead letter, got {:?}", other),
            }
        }

        assert_eq!(sink.0.lock().unwrap().len(), 5);
        assert_eq!(pipeline.stats().dead_lettered, 5);
    }

    #[tokio::test]
    async fn test_cached_order_is_duplicate() {
        let store = Arc::new(MemoryOrderStore::new());
        let (pipeline, _cache) = pipeline_with(store.clone());
        let sink = RecordingSink::default();
        let message = message_for(&sample_order("dup"));

        assert_eq!(pipeline.handle_message(&message, &sink).await, MessageOutcome::Stored);
        assert_eq!(pipeline.handle_message(&message, &sink).await, MessageOutcome::Duplicate);

        assert_eq!(store.len().await, 1);
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stored_but_uncached_order_is_duplicate() {
        let order = sample_order("evicted");
        let store = Arc::new(MemoryOrderStore::with_orders([order.clone()]));
        let (pipeline, cache) = pipeline_with(store);
        let sink = RecordingSink::default();

        let outcome = pipeline.handle_message(&message_for(&order), &sink).await;

        assert_eq!(outcome, MessageOutcome::Duplicate);
        assert!(!cache.order_exists("evicted").await.unwrap());
    }

    #[tokio::test]
    async fn test_persist_failure_is_not_acked_or_cached() {
        let (pipeline, cache) = pipeline_with(Arc::new(FailingStore));
        let sink = RecordingSink::default();

        let outcome = pipeline
            .handle_message(&message_for(&sample_order("a")), &sink)
            .await;

        assert_eq!(outcome, MessageOutcome::PersistFailed);
        assert!(!outcome.should_ack());
        assert!(!cache.order_exists("a").await.unwrap());
        assert!(sink.0.lock().unwrap().is_empty());
        assert_eq!(pipeline.stats().persist_failures, 1);
    }

    #[tokio::test]
    async fn test_restore_replaces_cache_contents() {
        let store = Arc::new(MemoryOrderStore::with_orders([sample_order("a"), sample_order("b")]));
        let (pipeline, cache) = pipeline_with(store);
        cache.save_order(&sample_order("stale")).await.unwrap();

        assert_eq!(pipeline.restore_cache().await.unwrap(), 2);

        assert!(cache.order_exists("a").await.unwrap());
        assert!(cache.order_exists("b").await.unwrap());
        assert!(!cache.order_exists("stale").await.unwrap());
    }

    #[tokio::test]
    async fn test_restore_failure_is_returned() {
        let (pipeline, _cache) = pipeline_with(Arc::new(FailingStore));
        assert!(pipeline.restore_cache().await.is_err());
    }
}
