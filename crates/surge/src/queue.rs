//! The bounded channel between the generation loop and the worker pool.
//!
//! Capacity is the run's `max_in_flight`. When workers fall behind the queue
//! fills and [`WorkQueue::enqueue`] blocks the producer, which in turn stalls
//! the rate-limited loop: overload turns into backpressure instead of an
//! ever-growing buffer.

use crate::{Error, Result, WorkItem};
use crossbeam_channel::{Receiver, Sender, TrySendError};

/// What travels through the queue.
#[derive(Debug)]
pub enum Job {
    /// A message to dispatch.
    Work(WorkItem),
    /// Stop sentinel: the receiving worker flushes its sink and exits.
    Stop,
}

/// Outcome of a non-blocking enqueue.
#[derive(Debug)]
pub enum TryEnqueue {
    Queued,
    /// The queue is at capacity; the job is handed back.
    Full(Job),
}

/// Fixed-capacity FIFO of [`Job`]s.
///
/// The queue is only the producing end. Receiving ends are [`Consumer`]s,
/// and once every one of them is dropped (all workers gone, even by panic)
/// enqueueing fails with [`Error::QueueClosed`] instead of blocking forever.
#[derive(Debug)]
pub struct WorkQueue {
    tx: Sender<Job>,
    capacity: usize,
}

impl WorkQueue {
    /// Creates the queue and its first consumer. Clone the consumer for
    /// additional workers.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero, which would turn the queue into a
    /// rendezvous channel.
    pub fn bounded(capacity: usize) -> (Self, Consumer) {
        assert!(capacity > 0, "queue capacity must be positive");
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (Self { tx, capacity }, Consumer { rx })
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Jobs currently waiting. Never exceeds [`capacity`](Self::capacity).
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// Enqueues `job`, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueueClosed`] once no consumer is left, including
    /// while blocked on a full queue.
    pub fn enqueue(&self, job: Job) -> Result<()> {
        self.tx.send(job).map_err(|_| Error::QueueClosed)
    }

    /// Enqueues `job` only if there is room right now.
    pub fn try_enqueue(&self, job: Job) -> Result<TryEnqueue> {
        match self.tx.try_send(job) {
            Ok(()) => Ok(TryEnqueue::Queued),
            Err(TrySendError::Full(job)) => Ok(TryEnqueue::Full(job)),
            Err(TrySendError::Disconnected(_)) => Err(Error::QueueClosed),
        }
    }
}

/// The receiving end held by a worker.
#[derive(Clone, Debug)]
pub struct Consumer {
    rx: Receiver<Job>,
}

impl Consumer {
    /// Blocks until a job is available. `None` once every sender is gone.
    pub fn dequeue(&self) -> Option<Job> {
        self.rx.recv().ok()
    }
}
