use parking_lot::{Condvar, Mutex};
use std::{sync::Arc, time::Duration};

#[derive(Debug, Default)]
struct Inner {
    stopped: Mutex<bool>,
    cond: Condvar,
}

/// A one-way, shared "stop now" flag with an interruptible wait.
///
/// Clones observe the same flag. Once raised it stays raised.
///
/// A flag cannot wake a thread parked on a blocking dequeue, which is why the
/// worker pool also receives one stop sentinel per worker. The signal is what
/// the reporter sleeps on and what the generation loop checks between items.
#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    inner: Arc<Inner>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag and wakes every waiter.
    pub fn stop(&self) {
        let mut stopped = self.inner.stopped.lock();
        *stopped = true;
        self.inner.cond.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.inner.stopped.lock()
    }

    /// Waits up to `timeout` for the flag. Returns `true` if it was raised,
    /// `false` if the full timeout elapsed first.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut stopped = self.inner.stopped.lock();
        if !*stopped {
            // Spurious wakeups are absorbed by the predicate.
            let _ = self
                .inner
                .cond
                .wait_while_for(&mut stopped, |stopped| !*stopped, timeout);
        }
        *stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{thread, time::Instant};

    #[test]
    fn wait_times_out_when_not_stopped() {
        let signal = StopSignal::new();
        let start = Instant::now();

        assert!(!signal.wait_timeout(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn stop_wakes_a_waiter_early() {
        let signal = StopSignal::new();
        let waiter = signal.clone();
        let start = Instant::now();

        let handle = thread::spawn(move || waiter.wait_timeout(Duration::from_secs(30)));
        thread::sleep(Duration::from_millis(20));
        signal.stop();

        assert!(handle.join().unwrap());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn stays_stopped() {
        let signal = StopSignal::new();
        signal.stop();

        assert!(signal.is_stopped());
        assert!(signal.wait_timeout(Duration::ZERO));
    }
}
