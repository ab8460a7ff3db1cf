//! Log record payload type.
//!
//! A [`Record`] is one fully formatted log line, produced by the front door
//! and owned by a sink queue until consumed. The payload is immutable after
//! construction; cloning is cheap (`bytes::Bytes` refcount bump), which is
//! what makes the combined file-and-broker mode affordable: the same
//! payload is enqueued to both sinks without copying.

use bytes::Bytes;

/// One formatted, immutable log line ready for persistence or publication.
///
/// The payload carries no trailing delimiter; the file sink appends the
/// newline when buffering. The broker sink publishes the payload as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    payload: Bytes,

    /// Failed delivery attempts so far. Only the broker retry path ever
    /// increments this; the payload itself is never touched.
    attempts: u32,
}

impl Record {
    /// Create a record from a formatted line.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            attempts: 0,
        }
    }

    /// The record payload.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.payload
    }

    /// Payload length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Number of failed delivery attempts recorded against this record.
    #[inline]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Consume the record into a retry copy with one more recorded attempt.
    pub(crate) fn into_retry(self) -> Self {
        Self {
            payload: self.payload,
            attempts: self.attempts.saturating_add(1),
        }
    }
}

impl From<Vec<u8>> for Record {
    fn from(payload: Vec<u8>) -> Self {
        Self::new(payload)
    }
}

impl From<String> for Record {
    fn from(payload: String) -> Self {
        Self::new(payload)
    }
}

impl From<&str> for Record {
    fn from(payload: &str) -> Self {
        Self::new(Bytes::copy_from_slice(payload.as_bytes()))
    }
}
