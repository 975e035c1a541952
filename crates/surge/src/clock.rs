use crate::StopSignal;
use parking_lot::Mutex;
use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

/// A source of time for the generation loop and the [`RateLimiter`].
///
/// This abstraction allows plugging in the real system clock or a virtual
/// clock in tests, so that pacing behaviour can be asserted exactly instead of
/// within scheduler jitter.
///
/// [`RateLimiter`]: crate::RateLimiter
pub trait Clock: Send + Sync {
    /// Monotonic "now", used for pacing and deadlines.
    fn now(&self) -> Instant;

    /// Blocks the calling thread for `duration`.
    fn sleep(&self, duration: Duration);

    /// Wall-clock milliseconds since the Unix epoch, stamped onto work items.
    fn wall_millis(&self) -> u64;

    /// Like [`sleep`](Self::sleep), but returns as soon as `stop` is raised.
    fn sleep_interruptible(&self, duration: Duration, stop: &StopSignal) {
        let _ = stop.wait_timeout(duration);
    }
}

/// The process clock: [`Instant`], [`SystemTime`] and [`thread::sleep`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }

    fn wall_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

#[derive(Debug)]
struct ManualState {
    now: Instant,
    wall_millis: u64,
}

/// A virtual clock whose `sleep` advances time instantly.
///
/// Clones share the same timeline. Useful for driving a whole run through its
/// warmup and deadline without waiting on real time:
///
/// ```
/// use std::time::Duration;
/// use surge::{Clock, ManualClock};
///
/// let clock = ManualClock::new(1_000);
/// let t0 = clock.now();
/// clock.sleep(Duration::from_millis(250));
/// assert_eq!(clock.now() - t0, Duration::from_millis(250));
/// assert_eq!(clock.wall_millis(), 1_250);
/// ```
#[derive(Clone, Debug)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    /// Creates a clock frozen at the current instant, reporting
    /// `wall_millis` as the wall-clock time.
    pub fn new(wall_millis: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualState {
                now: Instant::now(),
                wall_millis,
            })),
        }
    }

    /// Moves the clock forward without anyone sleeping, e.g. to simulate a
    /// caller that stalled elsewhere.
    pub fn advance(&self, duration: Duration) {
        let mut state = self.state.lock();
        state.now += duration;
        state.wall_millis += duration.as_millis() as u64;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.state.lock().now
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }

    /// Virtual sleeps finish instantly, so only an already raised stop can
    /// cut one short.
    fn sleep_interruptible(&self, duration: Duration, stop: &StopSignal) {
        if !stop.is_stopped() {
            self.advance(duration);
        }
    }

    fn wall_millis(&self) -> u64 {
        self.state.lock().wall_millis
    }
}
