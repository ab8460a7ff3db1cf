//! Buffered file sink with time-based rotation.
//!
//! Consumes a record queue and appends newline-delimited records to a log
//! file through an in-memory write buffer, cutting per-record disk I/O.
//!
//! # Architecture
//!
//! ```text
//! [QueueReceiver] --recv--> [worker task] --append--> [write buffer] --flush--> [file]
//!                                              ^                        ^
//!                        [periodic flush task] +   [shutdown drain poll]+
//! ```
//!
//! Three actors touch the buffer and file handle: the worker, the periodic
//! flush task, and the shutdown drain poll. All of them serialize on one
//! mutex; the buffer is never cloned or split.
//!
//! # Rotation
//!
//! The expected file path is recomputed from the clock for every record.
//! When the rotation key (the date suffix, `YYYYMMDD` or `YYYYMMDDHH`)
//! differs from the key of the open file, the first record past the
//! boundary flushes the old buffer best-effort, closes the old handle, and
//! opens `base.<suffix>` before being written.
//!
//! # Failure handling
//!
//! Flush failures never abort the sink. The write path retries the flush
//! without buffering the pending record, and after every ten consecutive
//! failures force-reopens the current path with a fresh buffer, then keeps
//! retrying. Bytes sitting in an unflushable buffer are dropped at the
//! reopen; that loss is logged with its size.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::clock::{Clock, SystemClock};
use crate::config::FileConfig;
use crate::error::ConfigError;
use crate::queue::QueueReceiver;
use crate::record::Record;

/// Interval between shutdown drain polls.
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Consecutive failed flush attempts tolerated before the current file is
/// force-reopened with a fresh buffer.
const FLUSH_RETRY_LIMIT: u32 = 10;

/// Delay between flush retry attempts.
const FLUSH_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Metrics for the file sink
#[derive(Debug, Default)]
pub struct FileSinkMetrics {
    /// Records appended to the write buffer
    pub records_written: AtomicU64,

    /// Bytes appended to the write buffer (including delimiters)
    pub bytes_written: AtomicU64,

    /// Successful non-empty flushes
    pub flushes: AtomicU64,

    /// Failed flush attempts
    pub flush_failures: AtomicU64,

    /// Completed file rotations
    pub rotations: AtomicU64,

    /// Forced reopens after exhausted flush retries
    pub forced_reopens: AtomicU64,
}

impl FileSinkMetrics {
    /// Create new metrics instance
    pub const fn new() -> Self {
        Self {
            records_written: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            flush_failures: AtomicU64::new(0),
            rotations: AtomicU64::new(0),
            forced_reopens: AtomicU64::new(0),
        }
    }

    #[inline]
    fn record_written(&self, bytes: u64) {
        self.records_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn record_flush_failure(&self) {
        self.flush_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn record_rotation(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn record_forced_reopen(&self) {
        self.forced_reopens.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_written: self.records_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
            rotations: self.rotations.load(Ordering::Relaxed),
            forced_reopens: self.forced_reopens.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of file sink metrics
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub records_written: u64,
    pub bytes_written: u64,
    pub flushes: u64,
    pub flush_failures: u64,
    pub rotations: u64,
    pub forced_reopens: u64,
}

/// The open file handle and its write buffer.
///
/// Exclusive to one sink instance. Wrapped in `Option` so the shutdown
/// path can take and drop it (closing the handle) while the periodic
/// flusher still holds a reference to the mutex.
struct Output {
    file: File,
    buf: Vec<u8>,
}

impl Output {
    /// Write buffered bytes through to the file. Returns the number of
    /// bytes flushed; on failure the buffer is kept for the next attempt
    /// (a retried partial write may duplicate bytes; the design is
    /// at-least-once).
    fn flush(&mut self) -> io::Result<usize> {
        if self.buf.is_empty() {
            return Ok(0);
        }
        self.file.write_all(&self.buf)?;
        let flushed = self.buf.len();
        self.buf.clear();
        Ok(flushed)
    }
}

type SharedOutput = Arc<Mutex<Option<Output>>>;

/// Buffered file sink worker.
///
/// Construct with [`FileSink::new`], then drive with `run()` (typically
/// spawned). The sink drains its queue and closes the file when the
/// shutdown token fires or every sender is dropped.
pub struct FileSink {
    receiver: QueueReceiver,
    config: FileConfig,
    output: SharedOutput,

    /// Path currently open. Only the worker mutates this.
    current_path: PathBuf,

    /// Rotation key of the open file; `None` when rotation is disabled.
    rotation_key: Option<String>,

    clock: Arc<dyn Clock>,
    shutdown: CancellationToken,
    metrics: Arc<FileSinkMetrics>,
}

impl FileSink {
    /// Create a file sink, opening the initial file.
    ///
    /// An unopenable initial path is fatal: construction fails and no
    /// worker is spawned.
    pub fn new(
        config: FileConfig,
        receiver: QueueReceiver,
        shutdown: CancellationToken,
    ) -> Result<Self, ConfigError> {
        Self::with_clock(config, receiver, shutdown, Arc::new(SystemClock))
    }

    /// Create a file sink reading time from the given clock.
    pub fn with_clock(
        config: FileConfig,
        receiver: QueueReceiver,
        shutdown: CancellationToken,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let now = clock.now();
        let rotation_key = config.rotation.suffix(now);
        let current_path = config.rotation.path_for(&config.path, now);

        let file = open_append(&current_path).map_err(|source| ConfigError::OpenFile {
            path: current_path.display().to_string(),
            source,
        })?;

        let output = Arc::new(Mutex::new(Some(Output {
            file,
            buf: Vec::with_capacity(config.buffer_capacity),
        })));

        Ok(Self {
            receiver,
            config,
            output,
            current_path,
            rotation_key,
            clock,
            shutdown,
            metrics: Arc::new(FileSinkMetrics::new()),
        })
    }

    /// Get reference to metrics
    pub fn metrics(&self) -> &FileSinkMetrics {
        &self.metrics
    }

    /// Get a metrics handle that stays valid after `run()` consumes the
    /// sink.
    pub fn metrics_handle(&self) -> Arc<FileSinkMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Path of the file currently open.
    pub fn current_path(&self) -> &Path {
        &self.current_path
    }

    /// Run the sink until shutdown completes or the queue closes.
    pub async fn run(mut self) -> MetricsSnapshot {
        tracing::info!(path = %self.current_path.display(), "file sink starting");

        let flusher_token = CancellationToken::new();
        let flusher = tokio::spawn(run_periodic_flush(
            Arc::clone(&self.output),
            self.config.flush_interval.max(Duration::from_millis(1)),
            flusher_token.clone(),
            Arc::clone(&self.metrics),
        ));

        let mut poll = tokio::time::interval(SHUTDOWN_POLL_INTERVAL);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                maybe = self.receiver.recv() => match maybe {
                    Some(record) => self.write_record(record).await,
                    // Every sender is gone and the queue is drained.
                    None => break,
                },
                _ = poll.tick() => {
                    if self.shutdown.is_cancelled() {
                        flush_shared(&self.output, &self.metrics);
                        let pending = self.receiver.len();
                        if pending == 0 {
                            break;
                        }
                        tracing::warn!(pending, "draining record queue before close");
                    }
                }
            }
        }

        flusher_token.cancel();
        let _ = flusher.await;
        self.close();

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            records = snapshot.records_written,
            bytes = snapshot.bytes_written,
            flushes = snapshot.flushes,
            flush_failures = snapshot.flush_failures,
            rotations = snapshot.rotations,
            "file sink closed"
        );
        snapshot
    }

    /// Buffer one record, rotating and flushing as required.
    async fn write_record(&mut self, record: Record) {
        self.rotate_if_needed();

        let mut attempts: u32 = 0;
        loop {
            // The lock lives in this block only; the retry sleep below
            // must never hold it.
            let buffered = {
                let mut guard = self.output.lock();
                let Some(out) = guard.as_mut() else { return };

                let mut ok = true;
                // The delimiter counts against the buffer capacity too.
                if out.buf.len() + record.len() + 1 > self.config.buffer_capacity {
                    match out.flush() {
                        Ok(0) => {}
                        Ok(_) => self.metrics.record_flush(),
                        Err(error) => {
                            self.metrics.record_flush_failure();
                            attempts += 1;
                            tracing::warn!(
                                error = %error,
                                attempts,
                                "flush failed, retrying before write"
                            );
                            if attempts % FLUSH_RETRY_LIMIT == 0 {
                                self.force_reopen(out);
                            }
                            ok = false;
                        }
                    }
                }

                if ok {
                    out.buf.extend_from_slice(record.as_bytes());
                    out.buf.push(b'\n');
                    self.metrics.record_written(record.len() as u64 + 1);
                }
                ok
            };

            if buffered {
                return;
            }
            tokio::time::sleep(FLUSH_RETRY_DELAY).await;
        }
    }

    /// Replace the file handle with a freshly opened one for the current
    /// path, discarding whatever the buffer holds. Escalation path after
    /// exhausted flush retries; reopen failures are logged and retried by
    /// the caller's next round.
    fn force_reopen(&self, out: &mut Output) {
        match open_append(&self.current_path) {
            Ok(file) => {
                let dropped = out.buf.len();
                out.file = file;
                out.buf.clear();
                self.metrics.record_forced_reopen();
                tracing::error!(
                    path = %self.current_path.display(),
                    dropped_bytes = dropped,
                    "reopened log file after repeated flush failures"
                );
            }
            Err(error) => {
                tracing::error!(
                    path = %self.current_path.display(),
                    error = %error,
                    "failed to reopen log file"
                );
            }
        }
    }

    /// Switch to the file for "now" when the rotation key has changed.
    fn rotate_if_needed(&mut self) {
        let now = self.clock.now();
        let key = self.config.rotation.suffix(now);
        if key == self.rotation_key {
            return;
        }

        let next_path = self.config.rotation.path_for(&self.config.path, now);
        let mut guard = self.output.lock();
        let Some(out) = guard.as_mut() else { return };

        // Best-effort drain of the old buffer before switching files.
        match out.flush() {
            Ok(0) => {}
            Ok(_) => self.metrics.record_flush(),
            Err(error) => {
                self.metrics.record_flush_failure();
                tracing::warn!(error = %error, "flush before rotation failed");
            }
        }

        match open_append(&next_path) {
            Ok(file) => {
                let dropped = out.buf.len();
                if dropped > 0 {
                    tracing::warn!(dropped_bytes = dropped, "unflushed bytes dropped at rotation");
                }
                // Assigning closes the old handle.
                out.file = file;
                out.buf.clear();
                self.metrics.record_rotation();
                tracing::info!(
                    from = %self.current_path.display(),
                    to = %next_path.display(),
                    "rotated log file"
                );
                self.current_path = next_path;
                self.rotation_key = key;
            }
            Err(error) => {
                // Keep the current file; the key stays unchanged so the
                // next record retries the rotation.
                tracing::error!(
                    path = %next_path.display(),
                    error = %error,
                    "failed to open rotated log file"
                );
            }
        }
    }

    /// Final flush and close. The handle is dropped under the lock so the
    /// periodic flusher can never observe a closed file.
    fn close(&self) {
        let mut guard = self.output.lock();
        if let Some(mut out) = guard.take() {
            match out.flush() {
                Ok(0) => {}
                Ok(_) => self.metrics.record_flush(),
                Err(error) => {
                    self.metrics.record_flush_failure();
                    tracing::error!(error = %error, "final flush failed, buffered bytes lost");
                }
            }
        }
    }
}

/// Periodic flush task. Runs next to the worker and flushes through the
/// shared mutex until told to stop.
async fn run_periodic_flush(
    output: SharedOutput,
    period: Duration,
    token: CancellationToken,
    metrics: Arc<FileSinkMetrics>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => flush_shared(&output, &metrics),
        }
    }
}

/// Flush whatever the buffer holds, logging failures.
fn flush_shared(output: &Mutex<Option<Output>>, metrics: &FileSinkMetrics) {
    let mut guard = output.lock();
    if let Some(out) = guard.as_mut() {
        match out.flush() {
            Ok(0) => {}
            Ok(_) => metrics.record_flush(),
            Err(error) => {
                metrics.record_flush_failure();
                tracing::error!(error = %error, "flush failed");
            }
        }
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}
