//! Thread-safe named counters with consistent point-in-time snapshots.
//!
//! The registry is the only state mutated by several threads at once: the
//! generation loop, every worker and every sink completion callback write into
//! it, and the reporter reads it. A single [`parking_lot::Mutex`] guards the
//! whole map. Counter updates happen once or twice per message, which is cheap
//! relative to the send itself, so there is no finer-grained locking.

use crossbeam_utils::CachePadded;
use parking_lot::Mutex;
use serde::Serialize;
use std::{collections::BTreeMap, fmt, time::Instant};

/// Messages handed to a worker for dispatch (attempts, not deliveries).
pub const SENT: &str = "sent";
/// Sends that the sink reported as delivered.
pub const ACKED: &str = "acked";
/// Sends that the sink reported as failed.
pub const SEND_ERRORS: &str = "send_errors";
/// Sum of message value lengths handed to workers.
pub const THROUGHPUT_BYTES: &str = "throughput_bytes";

/// The counters enabled when a configuration does not name any.
pub const DEFAULT_COUNTERS: [&str; 4] = [SENT, SEND_ERRORS, ACKED, THROUGHPUT_BYTES];

/// Named `u64` counters, restricted to a fixed set of enabled names.
///
/// Updates to names outside the enabled set are silently ignored, so call
/// sites never need to know which counters a run has switched on.
#[derive(Debug)]
pub struct CounterRegistry {
    values: CachePadded<Mutex<BTreeMap<String, u64>>>,
    started: Instant,
}

impl CounterRegistry {
    /// Creates a registry with every name in `enabled` set to zero.
    pub fn new<I, S>(enabled: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = enabled.into_iter().map(|name| (name.into(), 0)).collect();
        Self {
            values: CachePadded::new(Mutex::new(values)),
            started: Instant::now(),
        }
    }

    /// Adds `delta` to `name`, saturating at `u64::MAX`.
    pub fn increment(&self, name: &str, delta: u64) {
        if let Some(value) = self.values.lock().get_mut(name) {
            *value = value.saturating_add(delta);
        }
    }

    /// Overwrites `name` with `value`.
    pub fn set(&self, name: &str, value: u64) {
        if let Some(slot) = self.values.lock().get_mut(name) {
            *slot = value;
        }
    }

    /// Returns `true` if updates to `name` are recorded.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.values.lock().contains_key(name)
    }

    /// Copies every counter under the lock, so no value is read mid-update.
    pub fn snapshot(&self) -> Snapshot {
        let values = self.values.lock().clone();
        Snapshot {
            values,
            uptime_sec: self.started.elapsed().as_secs_f64(),
        }
    }

    /// Renders a snapshot as `uptime=<secs>s name=value ...`.
    pub fn render(&self) -> String {
        self.snapshot().to_string()
    }
}

/// A consistent copy of all counters plus the registry's age.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Snapshot {
    pub values: BTreeMap<String, u64>,
    pub uptime_sec: f64,
}

impl Snapshot {
    /// The value of `name`, or zero when the counter is not enabled.
    pub fn get(&self, name: &str) -> u64 {
        self.values.get(name).copied().unwrap_or(0)
    }
}

impl fmt::Display for Snapshot {
    /// Deterministic for identical snapshots: counters are sorted by name.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uptime={:.1}s", self.uptime_sec)?;
        for (name, value) in &self.values {
            write!(f, " {name}={value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread};

    #[test]
    fn enabled_counters_start_at_zero() {
        let registry = CounterRegistry::new(DEFAULT_COUNTERS);
        let snap = registry.snapshot();

        assert_eq!(snap.values.len(), 4);
        assert!(snap.values.values().all(|v| *v == 0));
    }

    #[test]
    fn increment_and_set() {
        let registry = CounterRegistry::new([SENT, THROUGHPUT_BYTES]);
        registry.increment(SENT, 1);
        registry.increment(SENT, 2);
        registry.increment(THROUGHPUT_BYTES, 512);
        registry.set(THROUGHPUT_BYTES, 7);

        let snap = registry.snapshot();
        assert_eq!(snap.get(SENT), 3);
        assert_eq!(snap.get(THROUGHPUT_BYTES), 7);
    }

    #[test]
    fn unlisted_names_have_no_effect() {
        let registry = CounterRegistry::new([SENT]);
        let before = registry.snapshot().values;

        registry.increment(ACKED, 1);
        registry.set("made_up", 99);

        assert_eq!(registry.snapshot().values, before);
        assert!(!registry.is_enabled(ACKED));
        assert!(!registry.render().contains("acked"));
    }

    #[test]
    fn render_is_sorted_by_name() {
        let registry = CounterRegistry::new(DEFAULT_COUNTERS);
        registry.increment(SENT, 6);
        registry.increment(THROUGHPUT_BYTES, 1536);

        let snap = Snapshot {
            uptime_sec: 3.04,
            ..registry.snapshot()
        };

        assert_eq!(
            snap.to_string(),
            "uptime=3.0s acked=0 send_errors=0 sent=6 throughput_bytes=1536"
        );
    }

    #[test]
    fn render_prefixes_uptime() {
        let registry = CounterRegistry::new([SENT]);
        let rendered = registry.render();

        assert!(rendered.starts_with("uptime="));
        assert!(rendered.ends_with(" sent=0"));
    }

    #[test]
    fn increment_saturates() {
        let registry = CounterRegistry::new([SENT]);
        registry.set(SENT, u64::MAX - 1);
        registry.increment(SENT, 10);
        assert_eq!(registry.snapshot().get(SENT), u64::MAX);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        const THREADS: usize = 8;
        const PER_THREAD: u64 = 10_000;

        let registry = Arc::new(CounterRegistry::new([SENT, ACKED]));

        thread::scope(|s| {
            for _ in 0..THREADS {
                let registry = Arc::clone(&registry);
                s.spawn(move || {
                    for _ in 0..PER_THREAD {
                        registry.increment(SENT, 1);
                        registry.increment(ACKED, 1);
                    }
                });
            }
        });

        let snap = registry.snapshot();
        assert_eq!(snap.get(SENT), THREADS as u64 * PER_THREAD);
        assert_eq!(snap.get(ACKED), THREADS as u64 * PER_THREAD);
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let registry = CounterRegistry::new([SENT]);
        registry.increment(SENT, 2);

        let json = serde_json::to_value(registry.snapshot()).unwrap();
        assert_eq!(json["values"]["sent"], 2);
        assert!(json["uptime_sec"].is_f64());
    }
}
