//! Error types.

use std::io;

use thiserror::Error;

/// Errors that abort construction of a logger or sink.
///
/// These are the only fatal errors in the system: once a sink is running,
/// I/O failures degrade to retry and diagnostics, never to an abort.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A broker mode was selected but the broker list is empty.
    #[error("broker connection list is empty")]
    EmptyBrokerList,

    /// A broker mode was selected but no topic was configured.
    #[error("broker topic is empty")]
    EmptyTopic,

    /// The initial log file could not be opened.
    #[error("failed to open log file '{path}': {source}")]
    OpenFile {
        /// Path that failed to open
        path: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// The publish client could not be constructed.
    #[error("failed to connect publish client: {message}")]
    BrokerConnect {
        /// Client-reported reason
        message: String,
    },

    /// A broker mode was selected but no publish client was supplied.
    #[error("broker mode selected but no publish client was provided")]
    MissingBrokerClient,
}

/// Errors from the fail-fast enqueue path.
#[derive(Debug, Error)]
pub enum EnqueueError {
    /// The queue already holds `capacity` records. The record is returned
    /// to the caller untouched; nothing in the queue is altered.
    #[error("record queue is full (capacity {capacity})")]
    QueueFull {
        /// Configured queue capacity
        capacity: usize,
    },

    /// The consuming sink is gone.
    #[error("record queue is closed")]
    Closed,
}

/// Errors surfaced to the caller of the front-door write path.
#[derive(Debug, Error)]
pub enum WriteError {
    /// An async sink rejected the record.
    #[error(transparent)]
    Enqueue(#[from] EnqueueError),

    /// A sync-file write failed.
    #[error("log write failed: {0}")]
    Io(#[from] io::Error),
}
