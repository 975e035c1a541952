//! Error types for the traffic-generation engine.
//!
//! Two families of failure exist and they are handled very differently:
//!
//! - [`Error`] is fatal to a run. Configuration problems are raised during
//!   `INIT`, before any thread is spawned, and are surfaced to the caller of
//!   [`LoadRunner::run`](crate::LoadRunner::run).
//! - [`SinkError`] describes a single failed send (or a failed flush/close).
//!   Send failures are delivered through the completion callback, logged and
//!   counted under `send_errors`; they never stop a worker or the run.

use std::io;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Fatal errors raised by the engine.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The run configuration violates a constraint (zero rate, zero duration,
    /// zero workers, zero queue capacity, empty topic).
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// The OS refused to spawn a worker or reporter thread.
    #[error("failed to spawn thread `{name}`")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },

    /// A sink connection could not be opened during `INIT`.
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// Every consumer of the work queue is gone.
    #[error("work queue closed")]
    QueueClosed,

    /// A worker thread panicked instead of exiting on its stop sentinel.
    #[error("worker {worker} panicked")]
    WorkerPanicked { worker: usize },
}

impl Error {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

/// Errors reported by a [`MessageSink`](crate::MessageSink).
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    /// Writing to the underlying transport failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The connection was already closed when the operation was attempted.
    #[error("sink connection closed")]
    Closed,

    /// The sink refused the record.
    #[error("record rejected: {reason}")]
    Rejected { reason: String },
}
