//! The run orchestrator and its lifecycle state machine.
//!
//! A run moves through `Init → Warmup → Running → Draining → Stopped`:
//!
//! - **Init** validates the configuration, opens one sink connection per
//!   worker and starts the worker pool and the reporter. Any failure here is
//!   returned before generation starts.
//! - **Warmup** idles for `warmup_sec` with nothing enqueued. A stop raised
//!   through the [`RunHandle`] ends it early.
//! - **Running** paces the generation loop with a [`RateLimiter`] until the
//!   deadline. The deadline is measured from the start of `Warmup`, so warmup
//!   is part of the run window rather than added in front of it.
//! - **Draining** raises the stop signal, enqueues one stop sentinel per
//!   worker, joins every worker (each flushes and closes its sink), and gives
//!   the reporter a bounded amount of time to exit.
//! - **Stopped** is terminal; [`LoadRunner::run`] returns a [`RunReport`].

use crate::{
    Clock, CounterRegistry, MessageBuilder, MessageSink, RateLimiter, Result, RunConfig,
    SinkConnector, Snapshot, StopSignal, SystemClock, WorkItem,
    pool::{WorkerContext, WorkerPool},
    queue::{Job, WorkQueue},
    reporter::{Reporter, log_snapshot},
};
use parking_lot::Mutex;
use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

/// How long draining waits for the reporter before leaving it behind.
pub const REPORTER_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Lifecycle states of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Init,
    Warmup,
    Running,
    Draining,
    Stopped,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Warmup => "warmup",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// A cloneable handle for observing and stopping a run from another thread.
#[derive(Clone, Debug)]
pub struct RunHandle {
    stop: StopSignal,
    state: Arc<Mutex<RunState>>,
}

impl RunHandle {
    fn new() -> Self {
        Self {
            stop: StopSignal::new(),
            state: Arc::new(Mutex::new(RunState::Init)),
        }
    }

    /// Ends generation early. Queued items are still drained and sent.
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn state(&self) -> RunState {
        *self.state.lock()
    }

    fn transition(&self, next: RunState) {
        let mut state = self.state.lock();
        tracing::info!("run state {} -> {}", *state, next);
        *state = next;
    }
}

/// The outcome of a completed run.
#[derive(Clone, Debug)]
pub struct RunReport {
    /// Work items enqueued by the generation loop (also the last `seq`).
    pub generated: u64,
    /// Work items dequeued and dispatched by workers.
    pub dispatched: u64,
    /// Counters after every worker has flushed and closed its sink.
    pub snapshot: Snapshot,
    /// Wall time from `Init` to `Stopped`.
    pub elapsed: Duration,
}

/// Drives one run: a rate-limited producer feeding a pool of sink workers.
pub struct LoadRunner<B, C, K = SystemClock> {
    config: RunConfig,
    builder: Arc<B>,
    connector: C,
    clock: K,
    handle: RunHandle,
}

impl<B, C> LoadRunner<B, C, SystemClock>
where
    B: MessageBuilder + 'static,
    C: SinkConnector,
{
    pub fn new(config: RunConfig, builder: B, connector: C) -> Self {
        Self {
            config,
            builder: Arc::new(builder),
            connector,
            clock: SystemClock,
            handle: RunHandle::new(),
        }
    }
}

impl<B, C, K> LoadRunner<B, C, K>
where
    B: MessageBuilder + 'static,
    C: SinkConnector,
    K: Clock + Clone,
{
    /// Replaces the clock used for warmup, pacing and the deadline.
    pub fn with_clock<K2>(self, clock: K2) -> LoadRunner<B, C, K2>
    where
        K2: Clock + Clone,
    {
        LoadRunner {
            config: self.config,
            builder: self.builder,
            connector: self.connector,
            clock,
            handle: self.handle,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn handle(&self) -> RunHandle {
        self.handle.clone()
    }

    /// Runs the whole lifecycle on the calling thread.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`](crate::Error::InvalidConfig) before anything
    ///   is started.
    /// - [`Error::Sink`](crate::Error::Sink) if a connection cannot be opened.
    /// - [`Error::Spawn`](crate::Error::Spawn) if a thread cannot be created.
    /// - [`Error::WorkerPanicked`](crate::Error::WorkerPanicked) after
    ///   draining, if a worker died. This takes precedence over the
    ///   [`Error::QueueClosed`](crate::Error::QueueClosed) that generation
    ///   hits once every worker is gone.
    ///
    /// Individual send failures are never errors here; they are counted under
    /// `send_errors`.
    pub fn run(self) -> Result<RunReport> {
        let started = Instant::now();
        let config = &self.config;

        // === Init ===
        config.validate()?;
        if config.dry_run {
            tracing::info!("dry_run enabled: no traffic will be sent to the sink");
        }

        let counters = Arc::new(CounterRegistry::new(
            config.enabled_counters.iter().cloned(),
        ));
        let sinks = self.open_sinks()?;
        let (queue, consumer) = WorkQueue::bounded(config.max_in_flight);

        let pool = WorkerPool::spawn(
            &queue,
            consumer,
            sinks,
            WorkerContext {
                counters: Arc::clone(&counters),
                builder: Arc::clone(&self.builder),
                topic: Arc::from(config.topic.as_str()),
            },
        )?;

        let reporter = match Reporter::spawn(
            Arc::clone(&counters),
            config.report_interval(),
            self.handle.stop.clone(),
            log_snapshot,
        ) {
            Ok(reporter) => reporter,
            Err(e) => {
                let _ = pool.shutdown(&queue);
                return Err(e);
            }
        };

        tracing::info!(
            rps = config.rps,
            duration_sec = config.duration_sec,
            warmup_sec = config.warmup_sec,
            concurrency = config.concurrency,
            max_in_flight = config.max_in_flight,
            topic = %config.topic,
            "starting run"
        );

        let mut limiter = RateLimiter::with_clock(config.rps, self.clock.clone());
        let deadline = self.clock.now() + config.duration();

        // === Warmup ===
        if config.warmup_sec > 0 {
            self.handle.transition(RunState::Warmup);
            self.clock
                .sleep_interruptible(config.warmup(), &self.handle.stop);
        }

        // === Running ===
        self.handle.transition(RunState::Running);
        let generated = self.generate(&queue, &mut limiter, deadline);

        // === Draining ===
        self.handle.transition(RunState::Draining);
        self.handle.stop.stop();
        tracing::debug!(
            generated = generated.as_ref().copied().unwrap_or_default(),
            dispatched = pool.dispatched(),
            queued = queue.len(),
            workers = pool.len(),
            "draining work queue"
        );
        let drained = pool.shutdown(&queue);

        if !reporter.join_timeout(REPORTER_JOIN_TIMEOUT) {
            tracing::warn!(
                "reporter did not stop within {:?}; leaving it behind",
                REPORTER_JOIN_TIMEOUT
            );
        }

        let snapshot = counters.snapshot();
        tracing::info!("run complete: {snapshot}");
        self.handle.transition(RunState::Stopped);

        // A dead pool also closes the queue; the panic is the root cause.
        let dispatched = drained?;
        Ok(RunReport {
            generated: generated?,
            dispatched,
            snapshot,
            elapsed: started.elapsed(),
        })
    }

    /// One connection per worker, or none at all in dry run. If any connect
    /// fails, the connections already opened are closed before the error is
    /// returned.
    fn open_sinks(&self) -> Result<Vec<Option<C::Sink>>> {
        let config = &self.config;
        if config.dry_run {
            return Ok((0..config.concurrency).map(|_| None).collect());
        }

        let mut sinks = Vec::with_capacity(config.concurrency);
        for worker_id in 0..config.concurrency {
            match self.connector.connect(worker_id) {
                Ok(sink) => sinks.push(sink),
                Err(e) => {
                    tracing::error!(worker_id, error = %e, "failed to open sink");
                    for (worker_id, sink) in sinks.into_iter().enumerate() {
                        if let Err(e) = sink.close() {
                            tracing::warn!(worker_id, error = %e, "sink close failed");
                        }
                    }
                    return Err(e.into());
                }
            }
        }

        Ok(sinks.into_iter().map(Some).collect())
    }

    /// The rate-limited generation loop. Returns the last sequence number.
    fn generate(
        &self,
        queue: &WorkQueue,
        limiter: &mut RateLimiter<K>,
        deadline: Instant,
    ) -> Result<u64> {
        let mut seq = 0_u64;

        loop {
            limiter.wait();
            if self.handle.stop.is_stopped() || self.clock.now() >= deadline {
                break;
            }

            seq += 1;
            let timestamp_ms = self.clock.wall_millis();
            let message = self.builder.build_message(seq, timestamp_ms);
            queue.enqueue(Job::Work(WorkItem {
                seq,
                timestamp_ms,
                message,
            }))?;
        }

        Ok(seq)
    }
}
