//! Front door: levels, header formatting, and delivery dispatch.
//!
//! The [`Logger`] turns a level and a message into a [`Record`] and hands
//! it to the configured delivery path: a direct locked file write
//! (sync-file mode) or a non-blocking enqueue to one or two background
//! sinks. Producers are never blocked; a full queue surfaces as
//! [`WriteError`] and the caller decides what to do with the line.
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
//! logger.shutdown().await;
//! ```

use std::fmt::{self, Write as FmtWrite};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::panic::Location;

use chrono::Local;
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::broker::{BrokerClient, BrokerSink};
use crate::config::{CallerStyle, Config, HeaderConfig, SinkMode};
use crate::error::{ConfigError, EnqueueError, WriteError};
use crate::file::FileSink;
use crate::queue::{self, QueueSender};
use crate::record::Record;

/// Log severity, ordered from most verbose to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
    Panic,
}

impl Level {
    /// Upper-case name as it appears in record headers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
            Level::Panic => "PANIC",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The logging front door.
///
/// Owns the sink workers and their queues; sinks never outlive the logger
/// that built them, and two loggers never share a queue, a buffer, or a
/// file handle. Construction spawns the workers, so a `Logger` must be
/// built inside a Tokio runtime.
pub struct Logger {
    level: Level,
    header: HeaderConfig,
    pid: u32,

    /// Open file for sync-file mode, `None` in the async modes. Taken and
    /// closed by `shutdown()`.
    sync_file: Mutex<Option<File>>,

    /// Queue feeding the async file sink.
    file_queue: Option<QueueSender>,

    /// Queue feeding the broker sink.
    broker_queue: Option<QueueSender>,

    shutdown: CancellationToken,

    /// Sink worker handles, taken by the first `shutdown()` call.
    workers: Mutex<Option<Vec<JoinHandle<()>>>>,
}

impl Logger {
    /// Build a logger for the file-only modes.
    ///
    /// Broker modes need a publish client; use [`Logger::with_broker`].
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        Self::build(config, None)
    }

    /// Build a logger, connecting broker modes through the given client.
    pub fn with_broker(config: Config, client: &dyn BrokerClient) -> Result<Self, ConfigError> {
        Self::build(config, Some(client))
    }

    fn build(config: Config, client: Option<&dyn BrokerClient>) -> Result<Self, ConfigError> {
        config.validate()?;

        let shutdown = CancellationToken::new();
        let mut workers = Vec::new();
        let mut sync_file = None;
        let mut file_queue = None;
        let mut broker_queue = None;

        match config.mode {
            SinkMode::SyncFile => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&config.file.path)
                    .map_err(|source| ConfigError::OpenFile {
                        path: config.file.path.display().to_string(),
                        source,
                    })?;
                sync_file = Some(file);
            }
            SinkMode::AsyncFile | SinkMode::AsyncFileAndBroker => {
                let (tx, rx) = queue::bounded(config.queue_capacity);
                let sink = FileSink::new(config.file.clone(), rx, shutdown.clone())?;
                workers.push(tokio::spawn(async move {
                    sink.run().await;
                }));
                file_queue = Some(tx);
            }
            SinkMode::AsyncBroker => {}
        }

        if config.mode.uses_broker() {
            let client = client.ok_or(ConfigError::MissingBrokerClient)?;
            let (tx, rx) = queue::bounded(config.queue_capacity);
            let sink = BrokerSink::connect(
                config.broker.clone(),
                rx,
                tx.clone(),
                client,
                shutdown.clone(),
            )?;
            workers.push(tokio::spawn(async move {
                sink.run().await;
            }));
            broker_queue = Some(tx);
        }

        Ok(Self {
            level: config.level,
            header: config.header,
            pid: std::process::id(),
            sync_file: Mutex::new(sync_file),
            file_queue,
            broker_queue,
            shutdown,
            workers: Mutex::new(Some(workers)),
        })
    }

    /// Write one message at the given level.
    ///
    /// Messages below the configured minimum level return `Ok` without
    /// building a record. After `shutdown()` has been signalled every
    /// write fails; the drain can only terminate once new work is refused.
    #[track_caller]
    pub fn log(&self, level: Level, message: &str) -> Result<(), WriteError> {
        if level < self.level {
            return Ok(());
        }
        if self.shutdown.is_cancelled() {
            return Err(WriteError::Enqueue(EnqueueError::Closed));
        }

        let line = self.format_record(level, message, Location::caller());
        self.deliver(line)
    }

    /// Log at debug level.
    #[track_caller]
    pub fn debug(&self, message: &str) -> Result<(), WriteError> {
        self.log(Level::Debug, message)
    }

    /// Log at info level.
    #[track_caller]
    pub fn info(&self, message: &str) -> Result<(), WriteError> {
        self.log(Level::Info, message)
    }

    /// Log at warn level.
    #[track_caller]
    pub fn warn(&self, message: &str) -> Result<(), WriteError> {
        self.log(Level::Warn, message)
    }

    /// Log at error level.
    #[track_caller]
    pub fn error(&self, message: &str) -> Result<(), WriteError> {
        self.log(Level::Error, message)
    }

    /// Signal shutdown and wait until every sink has drained and released
    /// its resource.
    ///
    /// Only returns after the drain has completed, so the return value is
    /// always `true`. Later calls are no-ops that also return `true`.
    /// Drain time is unbounded in queue depth; wrap the call in a timeout
    /// when a deadline matters.
    pub async fn shutdown(&self) -> bool {
        self.shutdown.cancel();

        let workers = self.workers.lock().take();
        if let Some(workers) = workers {
            for worker in workers {
                let _ = worker.await;
            }
        }

        // Close the sync-file handle, if any.
        drop(self.sync_file.lock().take());
        true
    }

    /// Render the header and message into one line (no delimiter).
    fn format_record(
        &self,
        level: Level,
        message: &str,
        caller: &'static Location<'static>,
    ) -> String {
        let mut line = String::with_capacity(message.len() + 64);

        if self.header.timestamp {
            let _ = write!(line, "{} ", Local::now().format("%Y-%m-%d %H:%M:%S%.6f %z"));
        }
        if self.header.pid {
            let _ = write!(line, "[{}] ", self.pid);
        }
        if self.header.level {
            let _ = write!(line, "[{}] ", level.as_str());
        }
        match self.header.caller {
            CallerStyle::Off => {}
            CallerStyle::Short => {
                let file = caller.file();
                let short = file.rsplit(&['/', '\\'][..]).next().unwrap_or(file);
                let _ = write!(line, "{}:{} ", short, caller.line());
            }
            CallerStyle::Long => {
                let _ = write!(line, "{}:{} ", caller.file(), caller.line());
            }
        }

        line.push_str(message);
        line
    }

    /// Hand a formatted line to the configured delivery path.
    fn deliver(&self, line: String) -> Result<(), WriteError> {
        {
            let mut guard = self.sync_file.lock();
            if let Some(file) = guard.as_mut() {
                file.write_all(line.as_bytes())?;
                file.write_all(b"\n")?;
                return Ok(());
            }
        }

        let record = Record::new(line);
        let mut outcome = Ok(());

        if let Some(queue) = &self.file_queue {
            if let Err(error) = queue.enqueue(record.clone()) {
                outcome = Err(error.into());
            }
        }
        if let Some(queue) = &self.broker_queue {
            if let Err(error) = queue.enqueue(record) {
                if outcome.is_ok() {
                    outcome = Err(error.into());
                }
            }
        }

        outcome
    }
}
