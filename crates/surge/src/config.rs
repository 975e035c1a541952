use crate::{Error, Result, counters::DEFAULT_COUNTERS};
use std::{collections::BTreeSet, time::Duration};

/// Everything the engine needs to know about one run.
///
/// Immutable once validated. Defaults match a modest single-producer run:
/// 100 msg/s for 60 s into `load-topic`, with the four standard counters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunConfig {
    /// Target messages per second.
    pub rps: u64,
    /// Length of the run window in seconds, warmup included.
    pub duration_sec: u64,
    /// Number of workers, each with its own sink connection.
    pub concurrency: usize,
    /// Capacity of the work queue.
    pub max_in_flight: usize,
    /// Idle time at the start of the window before generation begins.
    pub warmup_sec: u64,
    /// Count messages without opening sink connections or sending.
    pub dry_run: bool,
    /// Counter names recorded by the run; all others are ignored.
    pub enabled_counters: BTreeSet<String>,
    /// Seconds between counter reports. Zero is treated as one.
    pub report_interval_sec: u64,
    /// Destination handed to the sink with every message.
    pub topic: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            rps: 100,
            duration_sec: 60,
            concurrency: 1,
            max_in_flight: 1000,
            warmup_sec: 0,
            dry_run: false,
            enabled_counters: DEFAULT_COUNTERS.iter().map(|s| s.to_string()).collect(),
            report_interval_sec: 5,
            topic: "load-topic".to_string(),
        }
    }
}

impl RunConfig {
    /// Checks the constraints that make a run meaningful.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.rps == 0 {
            return Err(Error::invalid_config("rps must be > 0"));
        }
        if self.duration_sec == 0 {
            return Err(Error::invalid_config("duration_sec must be > 0"));
        }
        if self.concurrency == 0 {
            return Err(Error::invalid_config("concurrency must be > 0"));
        }
        if self.max_in_flight == 0 {
            return Err(Error::invalid_config("max_in_flight must be > 0"));
        }
        if self.topic.is_empty() {
            return Err(Error::invalid_config("topic must be set"));
        }
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_sec)
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_secs(self.warmup_sec)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_sec.max(1))
    }
}
