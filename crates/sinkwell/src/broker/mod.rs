//! Broker-forwarding sink.
//!
//! Consumes a record queue and hands each record to an asynchronous
//! publish client, republishing failed records and coordinating a
//! drain-then-exit shutdown.
//!
//! # Design
//!
//! The publish client itself is an external collaborator behind the
//! [`BrokerClient`] seam; the sink only sees its channel bundle
//! ([`BrokerProducer`]): an input sender plus success and failure
//! notification receivers. The worker services all three sources in one
//! select loop:
//!
//! ```text
//! [QueueReceiver] --recv--> [worker] --input.send--> [publish client]
//!        ^                     |<-- successes ----------|
//!        |                     |<-- failures -----------|
//!        +----- re-submit -----+
//! ```
//!
//! Handing a record to the client may itself suspend when the client's
//! internal buffer is full; that is the system's deliberate backpressure
//! point, since the record queue's own backpressure is fail-fast.
//!
//! # Failure policy
//!
//! While running, a failed record is re-submitted to the same bounded
//! queue, so retries compete with fresh records with no prioritization.
//! Retries are governed by `max_publish_attempts` (0 retries forever) and
//! an optional `publish_backoff`; a re-submission that finds the queue
//! full is dropped with a diagnostic rather than deadlocking the loop.
//! While draining, failures are logged and dropped so the drain
//! terminates.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::BrokerConfig;
use crate::error::ConfigError;
use crate::queue::{QueueReceiver, QueueSender};
use crate::record::Record;

/// Interval between drain-completion polls while shutting down.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Successful delivery notice from the publish client.
#[derive(Debug)]
pub struct Delivery {
    /// The record that was published.
    pub record: Record,
    /// Partition the record landed on.
    pub partition: i32,
    /// Offset within the partition.
    pub offset: i64,
}

/// Failed delivery notice from the publish client.
#[derive(Debug)]
pub struct DeliveryFailure {
    /// The record that could not be published.
    pub record: Record,
    /// Client-reported reason.
    pub reason: String,
}

/// Channel bundle connecting the sink to an asynchronous publish client.
///
/// Records go in on `input`; per-record outcomes come back on the two
/// notification channels. Dropping `input` tells the client to release
/// itself asynchronously.
pub struct BrokerProducer {
    /// Publish input. Sending suspends when the client's internal buffer
    /// is saturated.
    pub input: mpsc::Sender<Record>,

    /// Successful delivery notifications.
    pub successes: mpsc::Receiver<Delivery>,

    /// Failed delivery notifications.
    pub failures: mpsc::Receiver<DeliveryFailure>,
}

/// Factory seam for the external publish client.
///
/// Implementations translate [`BrokerConfig`] (connection list, topic,
/// protocol version, compression codec, ack mode, max message size) into
/// a running client and hand back its channel bundle. Client construction
/// failures are fatal at sink construction time.
pub trait BrokerClient {
    /// Build a producer for the given configuration.
    fn connect(&self, config: &BrokerConfig) -> Result<BrokerProducer, ConfigError>;
}

/// Metrics for the broker sink
#[derive(Debug, Default)]
pub struct BrokerSinkMetrics {
    /// Records dequeued for publishing
    pub records_received: AtomicU64,

    /// Records acknowledged by the client
    pub records_published: AtomicU64,

    /// Failure notifications from the client
    pub publish_failures: AtomicU64,

    /// Failed records re-submitted to the queue
    pub retries: AtomicU64,

    /// Records dropped (drain, exhausted attempts, or full queue)
    pub records_dropped: AtomicU64,
}

impl BrokerSinkMetrics {
    /// Create new metrics instance
    pub const fn new() -> Self {
        Self {
            records_received: AtomicU64::new(0),
            records_published: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            records_dropped: AtomicU64::new(0),
        }
    }

    #[inline]
    fn record_received(&self) {
        self.records_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn record_published(&self) {
        self.records_published.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn record_failure(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn record_dropped(&self) {
        self.records_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_received: self.records_received.load(Ordering::Relaxed),
            records_published: self.records_published.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of broker sink metrics
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub records_received: u64,
    pub records_published: u64,
    pub publish_failures: u64,
    pub retries: u64,
    pub records_dropped: u64,
}

/// Broker sink worker.
pub struct BrokerSink {
    receiver: QueueReceiver,

    /// Sender half of the same queue, used to re-submit failed records.
    retry_queue: QueueSender,

    producer: BrokerProducer,
    config: BrokerConfig,
    shutdown: CancellationToken,

    /// Records handed to the client whose outcome has not come back yet.
    /// Worker-local; the drain may only finish once this reaches zero.
    in_flight: u64,

    metrics: Arc<BrokerSinkMetrics>,
}

impl BrokerSink {
    /// Create a broker sink over an already-connected producer.
    pub fn new(
        config: BrokerConfig,
        receiver: QueueReceiver,
        retry_queue: QueueSender,
        producer: BrokerProducer,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            receiver,
            retry_queue,
            producer,
            config,
            shutdown,
            in_flight: 0,
            metrics: Arc::new(BrokerSinkMetrics::new()),
        }
    }

    /// Create a broker sink, connecting the client through the given seam.
    pub fn connect(
        config: BrokerConfig,
        receiver: QueueReceiver,
        retry_queue: QueueSender,
        client: &dyn BrokerClient,
        shutdown: CancellationToken,
    ) -> Result<Self, ConfigError> {
        let producer = client.connect(&config)?;
        Ok(Self::new(config, receiver, retry_queue, producer, shutdown))
    }

    /// Get reference to metrics
    pub fn metrics(&self) -> &BrokerSinkMetrics {
        &self.metrics
    }

    /// Get a metrics handle that stays valid after `run()` consumes the
    /// sink.
    pub fn metrics_handle(&self) -> Arc<BrokerSinkMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run the sink until the drain completes.
    pub async fn run(mut self) -> MetricsSnapshot {
        tracing::info!(
            brokers = ?self.config.brokers,
            topic = %self.config.topic,
            version = %self.config.version,
            acks = %self.config.acks.as_str(),
            compression = %self.config.compression.as_str(),
            "broker sink starting"
        );

        let mut poll = tokio::time::interval(DRAIN_POLL_INTERVAL);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                maybe = self.receiver.recv() => match maybe {
                    Some(record) => self.publish(record).await,
                    // Unreachable while the sink holds its retry sender,
                    // but a closed queue still means there is nothing
                    // left to do.
                    None => break,
                },
                maybe = self.producer.successes.recv() => match maybe {
                    Some(delivery) => {
                        self.in_flight = self.in_flight.saturating_sub(1);
                        self.metrics.record_published();
                        tracing::debug!(
                            partition = delivery.partition,
                            offset = delivery.offset,
                            bytes = delivery.record.len(),
                            "record published"
                        );
                        if self.drain_complete() {
                            break;
                        }
                    }
                    None => {
                        tracing::error!("publish client closed its success channel");
                        break;
                    }
                },
                maybe = self.producer.failures.recv() => match maybe {
                    Some(failure) => {
                        self.in_flight = self.in_flight.saturating_sub(1);
                        self.handle_failure(failure);
                        if self.drain_complete() {
                            break;
                        }
                    }
                    None => {
                        tracing::error!("publish client closed its failure channel");
                        break;
                    }
                },
                _ = poll.tick() => {
                    if self.drain_complete() {
                        break;
                    }
                    if self.shutdown.is_cancelled() {
                        tracing::warn!(
                            pending = self.receiver.len(),
                            in_flight = self.in_flight,
                            "draining record queue before close"
                        );
                    }
                }
            }
        }

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            received = snapshot.records_received,
            published = snapshot.records_published,
            failures = snapshot.publish_failures,
            retries = snapshot.retries,
            dropped = snapshot.records_dropped,
            "broker sink closed"
        );

        // Returning drops the producer input, releasing the publish
        // client asynchronously.
        snapshot
    }

    /// Hand one record to the publish client, waiting out client-side
    /// backpressure.
    async fn publish(&mut self, record: Record) {
        self.metrics.record_received();
        match self.producer.input.send(record).await {
            Ok(()) => self.in_flight += 1,
            Err(_) => {
                self.metrics.record_dropped();
                tracing::error!("publish client input closed, record dropped");
            }
        }
    }

    /// Apply the failure policy to one failed record.
    fn handle_failure(&mut self, failure: DeliveryFailure) {
        self.metrics.record_failure();

        if self.shutdown.is_cancelled() {
            // Draining: dropping instead of retrying guarantees the drain
            // terminates.
            self.metrics.record_dropped();
            tracing::error!(
                reason = %failure.reason,
                "record dropped during drain after publish failure"
            );
            return;
        }

        let retried = failure.record.into_retry();
        let max = self.config.max_publish_attempts;
        if max != 0 && retried.attempts() >= max {
            self.metrics.record_dropped();
            tracing::error!(
                reason = %failure.reason,
                attempts = retried.attempts(),
                "record dropped after exhausting publish attempts"
            );
            return;
        }

        let backoff = self.config.publish_backoff;
        if backoff.is_zero() {
            resubmit(&self.retry_queue, &self.metrics, retried);
        } else {
            let sender = self.retry_queue.clone();
            let metrics = Arc::clone(&self.metrics);
            tokio::spawn(async move {
                tokio::time::sleep(backoff).await;
                resubmit(&sender, &metrics, retried);
            });
        }
    }

    /// Whether the drain contract is satisfied: shutting down, queue
    /// empty, and every handed-off record acknowledged one way or the
    /// other.
    fn drain_complete(&self) -> bool {
        self.shutdown.is_cancelled() && self.receiver.is_empty() && self.in_flight == 0
    }
}

/// Re-submit a failed record to the bounded queue. A full (or closed)
/// queue drops the record with a diagnostic; retries never block the
/// consumer that would have to make room.
fn resubmit(sender: &QueueSender, metrics: &BrokerSinkMetrics, record: Record) {
    let attempts = record.attempts();
    match sender.enqueue(record) {
        Ok(()) => {
            metrics.record_retry();
            tracing::debug!(attempts, "failed record re-queued for publish");
        }
        Err(error) => {
            metrics.record_dropped();
            tracing::error!(
                error = %error,
                attempts,
                "failed record could not be re-queued, dropped"
            );
        }
    }
}
