//! Transport seam between the ingestion loop and a message broker.

use async_trait::async_trait;
use thiserror::Error;

use super::dead_letter::DeadLetterSink;
use super::message::StreamMessage;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("receive failed: {0}")]
    Receive(String),

    #[error("acknowledge failed: {0}")]
    Ack(String),
}

/// Ordered source of messages for one session.
#[async_trait]
pub trait MessageStream: Send {
    /// Waits for the next message. `Ok(None)` means the stream has closed and
    /// the session is over.
    async fn next_message(&mut self) -> Result<Option<StreamMessage>, TransportError>;

    /// Marks a message as handled so it is not redelivered.
    async fn ack(&mut self, id: &str) -> Result<(), TransportError>;
}

/// A live connection: the inbound stream plus a dead-letter producer opened
/// alongside it.
pub struct Session {
    pub messages: Box<dyn MessageStream>,
    pub dead_letters: Box<dyn DeadLetterSink>,
}

/// Opens sessions. Called again after every session failure.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self) -> Result<Session, TransportError>;
}
