//! Dead-letter delivery with a bounded wait.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info, warn};

use super::message::DeadLetter;

#[derive(Debug, Error)]
pub enum DeadLetterError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("publish rejected: {0}")]
    Rejected(String),
}

/// Destination for rejected messages.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    /// Publishes the letter and resolves once the broker confirms it.
    async fn send(&self, letter: DeadLetter) -> Result<(), DeadLetterError>;
}

/// Result of one bounded dead-letter attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed(String),
    TimedOut,
}

/// Sends `letter` and waits at most `timeout` for the confirmation.
///
/// Never fails: every outcome is logged and returned so ingestion can move on.
pub async fn deliver_dead_letter(
    sink: &dyn DeadLetterSink,
    letter: DeadLetter,
    timeout: Duration,
) -> DeliveryOutcome {
    let reason = letter.reason.clone();

    match tokio::time::timeout(timeout, sink.send(letter)).await {
        Ok(Ok(())) => {
            info!(reason = %reason, "Message routed to dead-letter stream");
            DeliveryOutcome::Delivered
        }
        Ok(Err(e)) => {
            error!(reason = %reason, error = %e, "Dead-letter delivery failed");
            DeliveryOutcome::Failed(e.to_string())
        }
        Err(_) => {
            warn!(
                reason = %reason,
                timeout_ms = timeout.as_millis() as u64,
                "Dead-letter delivery timed out"
            );
            DeliveryOutcome::TimedOut
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn letter(reason: &str) -> DeadLetter {
        DeadLetter {
            key: None,
            payload: b"{}".to_vec(),
            headers: Vec::new(),
            reason: reason.to_string(),
        }
    }

    #[derive(Default)]
    struct Recording(Mutex<Vec<DeadLetter>>);

    #[async_trait]
    impl DeadLetterSink for Recording {
        async fn send(&self, letter: DeadLetter) -> Result<(), DeadLetterError> {
            self.0.lock().unwrap().push(letter);
            Ok(())
        }
    }

    struct Rejecting;

    #[async_trait]
    impl DeadLetterSink for Rejecting {
        async fn send(&self, _letter: DeadLetter) -> Result<(), DeadLetterError> {
            Err(DeadLetterError::Rejected("stream is full".to_string()))
        }
    }

    struct Hanging;

    #[async_trait]
    impl DeadLetterSink for Hanging {
        async fn send(&self, _letter: DeadLetter) -> Result<(), DeadLetterError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_delivered() {
        let sink = Recording::default();
        let outcome = deliver_dead_letter(&sink, letter("empty message"), Duration::from_secs(1)).await;

        assert_eq!(outcome, DeliveryOutcome::Delivered);
        assert_eq!(sink.0.lock().unwrap()[0].reason, "empty message");
    }

    #[tokio::test]
    async fn test_failed() {
        let outcome = deliver_dead_letter(&Rejecting, letter("x"), Duration::from_secs(1)).await;
        assert!(matches!(outcome, DeliveryOutcome::Failed(msg) if msg.contains("stream is full")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out() {
        let outcome = deliver_dead_letter(&Hanging, letter("x"), Duration::from_secs(5)).await;
        assert_eq!(outcome, DeliveryOutcome::TimedOut);
    }
}
