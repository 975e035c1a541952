//! The worker pool draining the work queue into sink connections.
//!
//! Each worker is an OS thread named `worker-<i>` that owns one sink
//! connection outright, so sends from different workers never contend on a
//! connection and each worker acts as one independent producer. Workers exit
//! only on a [`Job::Stop`] sentinel, which means every item enqueued before
//! the sentinels is dispatched before the pool reports itself shut down.

use crate::{
    CounterRegistry, Error, MessageBuilder, MessageSink, Result, WorkItem,
    counters::{ACKED, SEND_ERRORS, SENT, THROUGHPUT_BYTES},
    queue::{Consumer, Job, WorkQueue},
};
use crossbeam_utils::CachePadded;
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    thread::{self, JoinHandle},
};

/// State shared by every worker of a run.
pub struct WorkerContext<B> {
    pub counters: Arc<CounterRegistry>,
    pub builder: Arc<B>,
    pub topic: Arc<str>,
}

/// A running set of workers.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    dispatched: Arc<CachePadded<AtomicU64>>,
}

impl WorkerPool {
    /// Spawns one worker per entry in `sinks`, each with a clone of
    /// `consumer`. The original is dropped before returning, so the queue
    /// closes once every worker has exited.
    ///
    /// A `None` sink puts that worker in dry-run mode: items are counted under
    /// `sent` and `throughput_bytes` but nothing is sent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Spawn`] if a thread cannot be created. Workers that
    /// did start are stopped and joined before the error is returned.
    pub fn spawn<B, S>(
        queue: &WorkQueue,
        consumer: Consumer,
        sinks: Vec<Option<S>>,
        context: WorkerContext<B>,
    ) -> Result<Self>
    where
        B: MessageBuilder + 'static,
        S: MessageSink,
    {
        let context = Arc::new(context);
        let dispatched = Arc::new(CachePadded::new(AtomicU64::new(0)));
        let mut pool = Self {
            handles: Vec::with_capacity(sinks.len()),
            dispatched: Arc::clone(&dispatched),
        };

        for (worker_id, sink) in sinks.into_iter().enumerate() {
            let name = format!("worker-{worker_id}");
            let consumer = consumer.clone();
            let context = Arc::clone(&context);
            let dispatched = Arc::clone(&dispatched);

            let spawned = thread::Builder::new()
                .name(name.clone())
                .spawn(move || worker_loop(worker_id, consumer, sink, &context, &dispatched));

            match spawned {
                Ok(handle) => pool.handles.push(handle),
                Err(source) => {
                    // Unwind the partial pool; the spawn failure is what the
                    // caller needs to see.
                    let _ = pool.shutdown(queue);
                    return Err(Error::Spawn { name, source });
                }
            }
        }

        Ok(pool)
    }

    /// Number of workers.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Items dequeued and dispatched so far, across all workers.
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Acquire)
    }

    /// Enqueues one stop sentinel per worker and joins every worker.
    /// Returns the total number of items dispatched.
    ///
    /// Joins are unbounded: a worker is only done once its sink has been
    /// flushed and closed. If the queue has closed because every worker is
    /// already gone, the remaining sentinels are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkerPanicked`] for the first worker that panicked,
    /// after all workers have been joined.
    pub fn shutdown(self, queue: &WorkQueue) -> Result<u64> {
        tracing::debug!(workers = self.handles.len(), "sending stop sentinels");
        for _ in 0..self.handles.len() {
            if queue.enqueue(Job::Stop).is_err() {
                tracing::warn!("work queue closed before all stop sentinels were sent");
                break;
            }
        }

        let mut first_panic = None;
        for (worker, handle) in self.handles.into_iter().enumerate() {
            if handle.join().is_err() {
                tracing::error!(worker, "worker panicked");
                first_panic.get_or_insert(worker);
            }
        }

        match first_panic {
            Some(worker) => Err(Error::WorkerPanicked { worker }),
            None => Ok(self.dispatched.load(Ordering::Acquire)),
        }
    }
}

fn worker_loop<B, S>(
    worker_id: usize,
    consumer: Consumer,
    mut sink: Option<S>,
    context: &WorkerContext<B>,
    dispatched: &AtomicU64,
) where
    B: MessageBuilder + 'static,
    S: MessageSink,
{
    tracing::trace!(worker_id, "worker started");
    let mut handled = 0_u64;

    while let Some(job) = consumer.dequeue() {
        match job {
            Job::Work(item) => {
                dispatch(context, sink.as_mut(), item);
                dispatched.fetch_add(1, Ordering::AcqRel);
                handled += 1;
            }
            Job::Stop => {
                tracing::debug!(worker_id, "received stop sentinel");
                break;
            }
        }
    }

    if let Some(mut sink) = sink {
        if let Err(e) = sink.flush() {
            tracing::warn!(worker_id, error = %e, "sink flush failed");
        }
        if let Err(e) = sink.close() {
            tracing::warn!(worker_id, error = %e, "sink close failed");
        }
    }

    tracing::debug!(worker_id, handled, "worker stopped");
}

/// Counts the attempt, then hands the message to the sink (if any).
fn dispatch<B, S>(context: &WorkerContext<B>, sink: Option<&mut S>, item: WorkItem)
where
    B: MessageBuilder + 'static,
    S: MessageSink,
{
    let counters = &context.counters;
    counters.increment(SENT, 1);
    counters.increment(THROUGHPUT_BYTES, item.message.value.len() as u64);

    let Some(sink) = sink else {
        return;
    };

    let seq = item.seq;
    let counters = Arc::clone(counters);
    let builder = Arc::clone(&context.builder);

    sink.send(
        &context.topic,
        item.message,
        Box::new(move |outcome| match outcome {
            Ok(metadata) => {
                counters.increment(ACKED, 1);
                builder.on_delivery(&metadata);
            }
            Err(e) => {
                tracing::warn!(seq, error = %e, "send failed");
                counters.increment(SEND_ERRORS, 1);
            }
        }),
    );
}
