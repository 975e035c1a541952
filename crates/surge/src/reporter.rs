use crate::{CounterRegistry, Error, Result, Snapshot, StopSignal};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

/// Periodically emits counter snapshots until stopped.
///
/// The reporter sleeps on the run's [`StopSignal`], so raising the signal
/// wakes it immediately instead of leaving it to finish its interval.
pub struct Reporter {
    handle: JoinHandle<()>,
    exited: Receiver<()>,
}

impl Reporter {
    /// Spawns the `reporter` thread. `emit` receives one snapshot per
    /// elapsed interval.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Spawn`] if the thread cannot be created.
    pub fn spawn<F>(
        counters: Arc<CounterRegistry>,
        interval: Duration,
        stop: StopSignal,
        mut emit: F,
    ) -> Result<Self>
    where
        F: FnMut(&Snapshot) + Send + 'static,
    {
        // Nothing is ever sent: the sender dropping when the thread exits is
        // the signal, which lets `join_timeout` wait with a deadline.
        let (exited_tx, exited) = crossbeam_channel::bounded::<()>(0);
        let name = "reporter".to_string();

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let _exited = exited_tx;
                while !stop.wait_timeout(interval) {
                    emit(&counters.snapshot());
                }
            })
            .map_err(|source| Error::Spawn { name, source })?;

        Ok(Self { handle, exited })
    }

    /// Joins the thread if it exits within `timeout`.
    ///
    /// Returns `false` if it did not; the thread is then left detached.
    pub fn join_timeout(self, timeout: Duration) -> bool {
        match self.exited.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => false,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if self.handle.join().is_err() {
                    tracing::warn!("reporter thread panicked");
                }
                true
            }
        }
    }
}

/// The default `emit` callback: one info line per snapshot.
pub fn log_snapshot(snapshot: &Snapshot) {
    tracing::info!("counters: {snapshot}");
}
