//! Sinkwell - Asynchronous log delivery
//!
//! An in-process asynchronous log sink: application tasks enqueue
//! formatted records, and background workers persist them to a rotating
//! file or forward them to a remote message broker. Producing a record
//! never waits on disk or network I/O.
//!
//! # Architecture
//!
//! ```text
//! [Logger] --enqueue--> [bounded queue] --recv--> [file sink] --buffer/flush--> [log file]
//!          --enqueue--> [bounded queue] --recv--> [broker sink] --publish/ack--> [broker]
//! ```
//!
//! Each sink owns its queue, its worker task, and its resource; nothing is
//! shared between sink instances and nothing is process-global, so any
//! number of independent loggers can coexist.
//!
//! # Delivery modes
//!
//! | Mode | Path | Blocking behavior |
//! |------|------|-------------------|
//! | `sync-file` | direct locked write | caller pays the write |
//! | `async-file` | queue → buffered file sink | never blocks, fails fast when full |
//! | `async-broker` | queue → publish client | never blocks, fails fast when full |
//! | `async-file-and-broker` | both, two queues | never blocks, fails fast when full |
//!
//! # Delivery guarantees
//!
//! At-least-once, best-effort. The documented loss points: records the
//! caller drops on a full queue, buffered bytes lost to a crash inside
//! the flush window, an unflushable buffer discarded at a forced reopen,
//! and broker records dropped while draining or after the retry policy is
//! exhausted.
//!
//! # Example
//!
//! ```ignore
//! use sinkwell::{Config, Logger, SinkMode};
//!
//! let config = Config {
//!     mode: SinkMode::AsyncFile,
//!     ..Config::default()
//! };
//! let logger = Logger::new(config)?;
//!
//! logger.info("service started")?;
//!
//! // Drain both queues, then release the file handle.
//! logger.shutdown().await;
//! ```

/// Broker-forwarding sink and the publish-client seam
pub mod broker;

/// Wall-clock seam for rotation decisions
pub mod clock;

/// Configuration types
pub mod config;

/// Error types
pub mod error;

/// Buffered file sink with time-based rotation
pub mod file;

/// Front door: levels, header formatting, delivery dispatch
pub mod logger;

/// Bounded record queue
pub mod queue;

/// Log record payload type
pub mod record;

pub use broker::{BrokerClient, BrokerProducer, BrokerSink, Delivery, DeliveryFailure};
pub use clock::{Clock, SystemClock};
pub use config::{
    AckMode, BrokerConfig, CallerStyle, Compression, Config, FileConfig, HeaderConfig,
    RotationMode, SinkMode,
};
pub use error::{ConfigError, EnqueueError, WriteError};
pub use file::FileSink;
pub use logger::{Level, Logger};
pub use queue::{QueueReceiver, QueueSender, DEFAULT_QUEUE_CAPACITY};
pub use record::Record;
