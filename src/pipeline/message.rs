//! Messages as they travel through the pipeline.

/// Header added to every dead-lettered message.
pub const DLQ_REASON_HEADER: &str = "dlq_reason";

/// One message received from the order stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamMessage {
    /// Transport-assigned id, used to acknowledge the message
    pub id: String,
    pub key: Option<Vec<u8>>,
    /// Raw payload, expected to be a JSON order
    pub payload: Vec<u8>,
    pub headers: Vec<(String, Vec<u8>)>,
}

impl StreamMessage {
    pub fn new(id: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
            ..Self::default()
        }
    }

    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A rejected message on its way to the dead-letter destination.
///
/// Carries the original key, payload and headers untouched, plus the
/// rejection reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
    pub headers: Vec<(String, Vec<u8>)>,
    pub reason: String,
}

impl DeadLetter {
    pub fn from_message(message: &StreamMessage, reason: impl Into<String>) -> Self {
        Self {
            key: message.key.clone(),
            payload: message.payload.clone(),
            headers: message.headers.clone(),
            reason: reason.into(),
        }
    }

    /// Original headers followed by the `dlq_reason` header.
    pub fn headers_with_reason(&self) -> Vec<(String, Vec<u8>)> {
        let mut headers = Vec::with_capacity(self.headers.len() + 1);
        headers.extend(self.headers.iter().cloned());
        headers.push((DLQ_REASON_HEADER.to_string(), self.reason.clone().into_bytes()));
        headers
    }
}
