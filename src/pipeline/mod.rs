//! Ingestion Pipeline
//!
//! Consumes order messages from a stream transport, validates them, writes
//! accepted orders to the durable store and then the cache, and routes
//! rejects to a dead-letter destination.
//!
//! The broker is abstracted behind [`Transport`], [`MessageStream`] and
//! [`DeadLetterSink`]; [`RedisStreamTransport`] is the production binding.

mod dead_letter;
mod ingest;
mod message;
mod redis_stream;
mod transport;

pub use dead_letter::{deliver_dead_letter, DeadLetterError, DeadLetterSink, DeliveryOutcome};
pub use ingest::{
    IngestionPipeline, MessageOutcome, PipelineConfig, PipelineStats, PipelineStatsSnapshot,
};
pub use message::{DeadLetter, StreamMessage, DLQ_REASON_HEADER};
pub use redis_stream::{entry_fields, parse_entry, RedisDeadLetterSink, RedisStreamTransport};
pub use transport::{MessageStream, Session, Transport, TransportError};
