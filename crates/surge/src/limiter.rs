//! Fixed-rate pacing for the generation loop.

use crate::{Clock, SystemClock};
use std::time::{Duration, Instant};

/// Paces callers to a fixed target rate.
///
/// The schedule is an anchor instant plus a slot count: slot `n` opens at
/// `anchor + n / rps` seconds, computed in whole nanoseconds from the slot
/// number rather than by repeatedly adding a rounded interval, so rates that
/// do not divide a second evenly do not drift.
///
/// A call that arrives early sleeps until its slot opens. A call that arrives
/// late (the caller stalled on a full queue, say) is let through immediately
/// and the schedule is re-anchored at *now*.
///
/// The re-anchoring is what keeps bursts bounded: after any stall exactly one
/// call is immediate, so the average rate converges to the target without the
/// limiter ever trying to "catch up" on missed slots.
#[derive(Debug)]
pub struct RateLimiter<C = SystemClock>
where
    C: Clock,
{
    rps: u64,
    anchor: Instant,
    slot: u64,
    clock: C,
}

const NANOS_PER_SEC: u128 = 1_000_000_000;

impl RateLimiter<SystemClock> {
    /// Creates a limiter on the system clock.
    ///
    /// # Panics
    ///
    /// Panics if `rps` is zero. Run configurations are validated before a
    /// limiter is ever built.
    pub fn new(rps: u64) -> Self {
        Self::with_clock(rps, SystemClock)
    }
}

impl<C> RateLimiter<C>
where
    C: Clock,
{
    /// Creates a limiter on the given clock. The first slot is "now".
    ///
    /// # Panics
    ///
    /// Panics if `rps` is zero.
    pub fn with_clock(rps: u64, clock: C) -> Self {
        assert!(rps > 0, "rate must be positive");
        Self {
            rps,
            anchor: clock.now(),
            slot: 0,
            clock,
        }
    }

    /// The nominal spacing between two permitted calls, rounded down to whole
    /// nanoseconds.
    pub fn interval(&self) -> Duration {
        self.offset(1)
    }

    /// Time from the anchor to the opening of `slot`.
    fn offset(&self, slot: u64) -> Duration {
        let nanos = u128::from(slot) * NANOS_PER_SEC / u128::from(self.rps);
        Duration::new(
            (nanos / NANOS_PER_SEC) as u64,
            (nanos % NANOS_PER_SEC) as u32,
        )
    }

    /// Blocks until the next call is permitted.
    pub fn wait(&mut self) {
        let now = self.clock.now();
        let next_allowed = self.anchor + self.offset(self.slot);
        if now < next_allowed {
            self.clock.sleep(next_allowed - now);
            self.slot += 1;
        } else {
            // Behind schedule: one immediate call, then re-anchor.
            self.anchor = now;
            self.slot = 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ManualClock;

    #[test]
    fn first_call_is_immediate() {
        let clock = ManualClock::new(0);
        let start = clock.now();
        let mut limiter = RateLimiter::with_clock(10, clock.clone());

        limiter.wait();

        assert_eq!(clock.now(), start);
    }

    #[test]
    fn calls_are_spaced_one_interval_apart() {
        let clock = ManualClock::new(0);
        let start = clock.now();
        let mut limiter = RateLimiter::with_clock(10, clock.clone());

        let mut stamps = Vec::new();
        for _ in 0..5 {
            limiter.wait();
            stamps.push(clock.now() - start);
        }

        let expected: Vec<_> = (0..5).map(|i| Duration::from_millis(100 * i)).collect();
        assert_eq!(stamps, expected);
    }

    #[test]
    fn stall_yields_one_immediate_call_then_full_interval() {
        let clock = ManualClock::new(0);
        let mut limiter = RateLimiter::with_clock(4, clock.clone());
        limiter.wait();
        limiter.wait();

        // The caller was busy elsewhere for far longer than one slot.
        clock.advance(Duration::from_secs(3));
        let resumed = clock.now();

        limiter.wait();
        assert_eq!(
            clock.now(),
            resumed,
            "first call after a stall must not sleep"
        );

        limiter.wait();
        assert_eq!(clock.now() - resumed, Duration::from_millis(250));

        limiter.wait();
        assert_eq!(clock.now() - resumed, Duration::from_millis(500));
    }

    #[test]
    fn average_rate_converges_to_target() {
        let clock = ManualClock::new(0);
        let start = clock.now();
        let mut limiter = RateLimiter::with_clock(1_000, clock.clone());

        for _ in 0..=1_000 {
            limiter.wait();
        }

        assert_eq!(clock.now() - start, Duration::from_secs(1));
    }

    fn count_within(rps: u64, window: Duration) -> u64 {
        let clock = ManualClock::new(0);
        let deadline = clock.now() + window;
        let mut limiter = RateLimiter::with_clock(rps, clock.clone());

        let mut calls = 0;
        loop {
            limiter.wait();
            if clock.now() >= deadline {
                return calls;
            }
            calls += 1;
        }
    }

    #[test]
    fn rates_that_do_not_divide_a_second_do_not_drift() {
        assert_eq!(count_within(7, Duration::from_secs(60)), 420);
        assert_eq!(count_within(3, Duration::from_secs(10)), 30);
        assert_eq!(count_within(30_000, Duration::from_secs(60)), 1_800_000);
    }

    #[test]
    fn slot_offsets_are_exact_over_a_long_run() {
        let clock = ManualClock::new(0);
        let start = clock.now();
        let mut limiter = RateLimiter::with_clock(7, clock.clone());

        for _ in 0..=7 * 3_600 {
            limiter.wait();
        }

        assert_eq!(clock.now() - start, Duration::from_secs(3_600));
    }

    #[test]
    fn real_clock_spacing_is_at_least_the_interval() {
        let mut limiter = RateLimiter::new(200);
        let start = Instant::now();
        for _ in 0..=10 {
            limiter.wait();
        }
        assert!(start.elapsed() >= limiter.interval() * 10);
    }

    #[test]
    #[should_panic(expected = "rate must be positive")]
    fn zero_rate_is_rejected() {
        let _ = RateLimiter::new(0);
    }
}
