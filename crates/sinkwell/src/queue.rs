//! Bounded record queue.
//!
//! The queue decouples producers from sink I/O latency. Producers never
//! block: when the queue already holds `capacity` records, enqueue fails
//! immediately with [`EnqueueError::QueueFull`] and the caller decides what
//! to do with the record. The single consumer suspends cooperatively until
//! a record arrives.
//!
//! # Design
//!
//! The channel itself is an unbounded tokio mpsc; the bound is enforced by
//! a CAS loop on an atomic depth counter shared by both halves. This keeps
//! the bound exact under concurrent producers, gives both halves an O(1)
//! `len()` (the shutdown drain protocols poll it), and lets an explicitly
//! configured capacity of zero degenerate to an always-full queue rather
//! than being rejected or clamped.
//!
//! Ordering is strict FIFO from enqueue to dequeue. Each sink owns its own
//! queue; queues are never shared between sink instances.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::EnqueueError;
use crate::record::Record;

/// Default queue capacity when the configuration leaves it unspecified.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10000;

/// Create a bounded record queue with the given capacity.
///
/// A capacity of zero is honored verbatim and yields a queue on which every
/// enqueue fails with `QueueFull`.
pub fn bounded(capacity: usize) -> (QueueSender, QueueReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicUsize::new(0));

    let sender = QueueSender {
        tx,
        depth: Arc::clone(&depth),
        capacity,
    };
    let receiver = QueueReceiver {
        rx,
        depth,
        capacity,
    };

    (sender, receiver)
}

/// Producer half of the record queue. Cloneable; many producers may share
/// one sender.
#[derive(Debug, Clone)]
pub struct QueueSender {
    tx: mpsc::UnboundedSender<Record>,
    depth: Arc<AtomicUsize>,
    capacity: usize,
}

impl QueueSender {
    /// Enqueue a record without blocking.
    ///
    /// Fails with `QueueFull` when the queue is at capacity and `Closed`
    /// when the consumer has been dropped. A failed enqueue does not alter
    /// the queue contents.
    pub fn enqueue(&self, record: Record) -> Result<(), EnqueueError> {
        let reserved = self.depth.fetch_update(
            Ordering::AcqRel,
            Ordering::Acquire,
            |depth| (depth < self.capacity).then(|| depth + 1),
        );
        if reserved.is_err() {
            return Err(EnqueueError::QueueFull {
                capacity: self.capacity,
            });
        }

        if self.tx.send(record).is_err() {
            // Consumer gone; release the slot we reserved.
            self.depth.fetch_sub(1, Ordering::AcqRel);
            return Err(EnqueueError::Closed);
        }

        Ok(())
    }

    /// Current number of queued records.
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    /// Whether the queue is currently empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Consumer half of the record queue. Exactly one per sink.
#[derive(Debug)]
pub struct QueueReceiver {
    rx: mpsc::UnboundedReceiver<Record>,
    depth: Arc<AtomicUsize>,
    capacity: usize,
}

impl QueueReceiver {
    /// Receive the next record, suspending until one is available.
    ///
    /// Returns `None` once every sender has been dropped and the queue is
    /// drained.
    pub async fn recv(&mut self) -> Option<Record> {
        let record = self.rx.recv().await?;
        self.depth.fetch_sub(1, Ordering::AcqRel);
        Some(record)
    }

    /// Current number of queued records.
    ///
    /// The drain protocols poll this: a sink only closes its resource once
    /// the depth has reached zero.
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    /// Whether the queue is currently empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
#[path = "queue_test.rs"]
mod queue_test;
