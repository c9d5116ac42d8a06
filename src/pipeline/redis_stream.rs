//! Redis Streams transport
//!
//! Orders are read through a consumer group so that unacknowledged entries
//! stay pending and are handed out again after a reconnect. Rejected messages
//! are appended to a separate dead-letter stream.
//!
//! Entry layout, shared by both streams:
//! - `payload`: raw message bytes
//! - `key`: optional message key
//! - `header:{name}`: one field per header

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use deadpool_redis::redis::streams::{StreamReadOptions, StreamReadReply};
use deadpool_redis::redis::{cmd, from_redis_value, AsyncCommands, ErrorKind, RedisResult, Value as RedisValue};
use deadpool_redis::{Config, Connection, Pool, Runtime};
use tracing::{debug, info};

use super::dead_letter::{DeadLetterError, DeadLetterSink};
use super::message::{DeadLetter, StreamMessage};
use super::transport::{MessageStream, Session, Transport, TransportError};
use crate::config::StreamConfig;

const PAYLOAD_FIELD: &str = "payload";
const KEY_FIELD: &str = "key";
const HEADER_PREFIX: &str = "header:";

/// How long one XREADGROUP call blocks waiting for new entries
const READ_BLOCK_MS: usize = 2000;
const READ_BATCH: usize = 10;

/// Dead-letter stream entries kept before old ones are trimmed
const DLQ_MAX_LEN: usize = 10_000;

const CLAIM_BATCH: usize = 100;

// == Entry encoding ==
fn field_bytes(value: &RedisValue) -> Option<Vec<u8>> {
    match value {
        RedisValue::BulkString(bytes) => Some(bytes.clone()),
        RedisValue::SimpleString(s) => Some(s.clone().into_bytes()),
        _ => None,
    }
}

/// Builds a [`StreamMessage`] from a stream entry. Unknown fields are ignored.
pub fn parse_entry(id: &str, fields: &HashMap<String, RedisValue>) -> StreamMessage {
    let mut message = StreamMessage::new(id, Vec::new());

    for (name, value) in fields {
        let Some(bytes) = field_bytes(value) else {
            continue;
        };
        if name == PAYLOAD_FIELD {
            message.payload = bytes;
        } else if name == KEY_FIELD {
            message.key = Some(bytes);
        } else if let Some(header) = name.strip_prefix(HEADER_PREFIX) {
            message.headers.push((header.to_string(), bytes));
        }
    }

    // HashMap iteration order is arbitrary
    message.headers.sort_by(|a, b| a.0.cmp(&b.0));
    message
}

/// Flattens a message into stream entry fields.
pub fn entry_fields(
    key: Option<&[u8]>,
    payload: &[u8],
    headers: &[(String, Vec<u8>)],
) -> Vec<(String, Vec<u8>)> {
    let mut fields = Vec::with_capacity(headers.len() + 2);
    fields.push((PAYLOAD_FIELD.to_string(), payload.to_vec()));
    if let Some(key) = key {
        fields.push((KEY_FIELD.to_string(), key.to_vec()));
    }
    for (name, value) in headers {
        fields.push((format!("{}{}", HEADER_PREFIX, name), value.clone()));
    }
    fields
}

// == Transport ==
pub struct RedisStreamTransport {
    pool: Pool,
    config: StreamConfig,
}

impl RedisStreamTransport {
    pub fn new(pool: Pool, config: StreamConfig) -> Self {
        Self { pool, config }
    }

    pub fn from_url(url: &str, config: StreamConfig) -> Result<Self, TransportError> {
        let pool = Config::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        Ok(Self::new(pool, config))
    }

    /// Creates the consumer group (and the stream) unless it already exists.
    async fn ensure_group(&self, conn: &mut Connection) -> Result<(), TransportError> {
        let created: Result<(), _> = cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(conn)
            .await;

        match created {
            Ok(()) => {
                info!(
                    stream = %self.config.stream_name,
                    consumer_group = %self.config.consumer_group,
                    "Created consumer group"
                );
                Ok(())
            }
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(consumer_group = %self.config.consumer_group, "Consumer group already exists");
                Ok(())
            }
            Err(e) => Err(TransportError::Connection(e.to_string())),
        }
    }

    /// Moves entries other consumers left pending for at least
    /// `claim_min_idle` to this consumer, so the pending replay picks them
    /// up. Returns how many were claimed.
    async fn claim_stale(&self, conn: &mut Connection) -> usize {
        let min_idle = self.config.claim_min_idle.as_millis() as u64;
        let mut cursor = "0-0".to_string();
        let mut claimed = 0;

        loop {
            let reply: RedisResult<Vec<RedisValue>> = cmd("XAUTOCLAIM")
                .arg(&self.config.stream_name)
                .arg(&self.config.consumer_group)
                .arg(&self.config.consumer_name)
                .arg(min_idle)
                .arg(&cursor)
                .arg("COUNT")
                .arg(CLAIM_BATCH)
                .arg("JUSTID")
                .query_async(&mut *conn)
                .await;

            let (next, ids) = match reply.and_then(|items| parse_autoclaim(&items)) {
                Ok(parsed) => parsed,
                Err(e) => {
                    // Servers before 6.2 have no XAUTOCLAIM
                    debug!(error = %e, "XAUTOCLAIM failed, skipping pending recovery");
                    break;
                }
            };

            claimed += ids.len();
            if next == "0-0" {
                break;
            }
            cursor = next;
        }

        if claimed > 0 {
            info!(count = claimed, consumer = %self.config.consumer_name, "Claimed stale pending entries");
        }
        claimed
    }
}

/// Splits a `XAUTOCLAIM .. JUSTID` reply into the next cursor and the
/// claimed ids. Redis 7 appends a third element with deleted ids.
fn parse_autoclaim(items: &[RedisValue]) -> RedisResult<(String, Vec<String>)> {
    match items {
        [cursor, ids, ..] => Ok((from_redis_value(cursor)?, from_redis_value(ids)?)),
        _ => Err((ErrorKind::TypeError, "unexpected XAUTOCLAIM reply").into()),
    }
}

#[async_trait]
impl Transport for RedisStreamTransport {
    async fn connect(&self) -> Result<Session, TransportError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        self.ensure_group(&mut conn).await?;
        self.claim_stale(&mut conn).await;

        info!(
            stream = %self.config.stream_name,
            dlq_stream = %self.config.dead_letter_stream,
            consumer = %self.config.consumer_name,
            "Subscribed to order stream"
        );

        Ok(Session {
            messages: Box::new(RedisMessageStream {
                conn,
                stream: self.config.stream_name.clone(),
                group: self.config.consumer_group.clone(),
                consumer: self.config.consumer_name.clone(),
                position: ReadPosition::pending(),
                buffer: VecDeque::new(),
            }),
            dead_letters: Box::new(RedisDeadLetterSink::new(
                self.pool.clone(),
                self.config.dead_letter_stream.clone(),
            )),
        })
    }
}

// == Read Position ==
/// Where the next XREADGROUP starts.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ReadPosition {
    /// Replaying this consumer's pending entries after the given id
    Pending(String),
    /// Reading entries never delivered to any consumer
    New,
}

impl ReadPosition {
    fn pending() -> Self {
        ReadPosition::Pending("0".to_string())
    }

    fn start_id(&self) -> &str {
        match self {
            ReadPosition::Pending(after) => after,
            ReadPosition::New => ">",
        }
    }

    /// Position after a batch whose last entry is `last_id`. The replay moves
    /// past what it already handed out and ends on the first empty batch.
    fn advance(self, last_id: Option<&str>) -> Self {
        match (self, last_id) {
            (ReadPosition::Pending(_), Some(id)) => ReadPosition::Pending(id.to_string()),
            _ => ReadPosition::New,
        }
    }
}

// == Message Stream ==
/// Consumer-group reader. Entries this consumer received but never
/// acknowledged are delivered first, then new entries.
struct RedisMessageStream {
    conn: Connection,
    stream: String,
    group: String,
    consumer: String,
    position: ReadPosition,
    buffer: VecDeque<StreamMessage>,
}

impl RedisMessageStream {
    async fn read_batch(&mut self) -> Result<(), TransportError> {
        let opts = StreamReadOptions::default()
            .group(&self.group, &self.consumer)
            .count(READ_BATCH);
        // Pending replay must not block: an empty answer means it is done
        let opts = match self.position {
            ReadPosition::Pending(_) => opts,
            ReadPosition::New => opts.block(READ_BLOCK_MS),
        };
        let start = self.position.start_id().to_string();

        let reply: Option<StreamReadReply> = self
            .conn
            .xread_options(&[&self.stream], &[&start], &opts)
            .await
            .map_err(|e| TransportError::Receive(e.to_string()))?;

        let entries: Vec<StreamMessage> = reply
            .into_iter()
            .flat_map(|reply| reply.keys)
            .flat_map(|stream_key| stream_key.ids)
            .map(|entry| parse_entry(&entry.id, &entry.map))
            .collect();

        if let ReadPosition::Pending(_) = self.position {
            let next = self
                .position
                .clone()
                .advance(entries.last().map(|entry| entry.id.as_str()));
            if next == ReadPosition::New {
                debug!(stream = %self.stream, "No pending entries left");
            }
            self.position = next;
        }

        self.buffer.extend(entries);
        Ok(())
    }
}

#[async_trait]
impl MessageStream for RedisMessageStream {
    async fn next_message(&mut self) -> Result<Option<StreamMessage>, TransportError> {
        loop {
            if let Some(message) = self.buffer.pop_front() {
                return Ok(Some(message));
            }
            self.read_batch().await?;
        }
    }

    async fn ack(&mut self, id: &str) -> Result<(), TransportError> {
        let _: i64 = self
            .conn
            .xack(&self.stream, &self.group, &[id])
            .await
            .map_err(|e| TransportError::Ack(e.to_string()))?;
        Ok(())
    }
}

// == Dead-Letter Sink ==
/// Appends rejected messages to the dead-letter stream.
pub struct RedisDeadLetterSink {
    pool: Pool,
    stream: String,
}

impl RedisDeadLetterSink {
    pub fn new(pool: Pool, stream: String) -> Self {
        Self { pool, stream }
    }
}

#[async_trait]
impl DeadLetterSink for RedisDeadLetterSink {
    async fn send(&self, letter: DeadLetter) -> Result<(), DeadLetterError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| DeadLetterError::Connection(e.to_string()))?;

        let headers = letter.headers_with_reason();
        let fields = entry_fields(letter.key.as_deref(), &letter.payload, &headers);

        let mut xadd = cmd("XADD");
        xadd.arg(&self.stream)
            .arg("MAXLEN")
            .arg("~")
            .arg(DLQ_MAX_LEN)
            .arg("*");
        for (name, value) in &fields {
            xadd.arg(name).arg(value);
        }

        let id: String = xadd
            .query_async(&mut conn)
            .await
            .map_err(|e| DeadLetterError::Rejected(e.to_string()))?;

        debug!(dlq_id = %id, stream = %self.stream, "Dead letter appended");
        Ok(())
    }
}
