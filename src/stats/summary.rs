//! Fixed-shape latency summaries
//!
//! [`MethodStatistics`] accumulates raw durations for one named method;
//! [`SummaryStatistics`] is the report-ready projection with a fixed number of
//! percentile buckets, extreme-tail buckets, and largest-sample slots. Array
//! lengths never depend on how many samples were seen: unused max-time slots
//! hold [`UNSET_MAX_TIME`].

use super::histogram::LatencyHistogram;
use crate::Result;
use serde::{Deserialize, Serialize};

/// Number of extreme-tail percentiles (`100 - 10^-i` for `i in 0..TIME_99_COUNT`)
pub const TIME_99_COUNT: usize = 6;

/// Number of largest samples kept verbatim
pub const MAX_TIME_COUNT: usize = 20;

/// Marker for a max-time slot that has no sample
pub const UNSET_MAX_TIME: f32 = -1.0;

const NANOS_PER_MS: f32 = 1_000_000.0;

/// Latency accumulator for a single method
#[derive(Debug, Clone, Default)]
pub struct MethodStatistics {
    time_ns: LatencyHistogram,
    num_success: u64,
    /// Largest samples, descending, at most `MAX_TIME_COUNT`
    max_time_ns: Vec<u64>,
}

impl MethodStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one successful invocation
    pub fn record(&mut self, duration_ns: u64) {
        self.num_success += 1;
        self.time_ns.record_nanos(duration_ns);
        self.insert_max(duration_ns);
    }

    fn insert_max(&mut self, duration_ns: u64) {
        let pos = self.max_time_ns.partition_point(|&t| t >= duration_ns);
        if pos < MAX_TIME_COUNT {
            self.max_time_ns.insert(pos, duration_ns);
            self.max_time_ns.truncate(MAX_TIME_COUNT);
        }
    }

    pub fn num_success(&self) -> u64 {
        self.num_success
    }

    pub fn histogram(&self) -> &LatencyHistogram {
        &self.time_ns
    }

    pub fn max_time_ns(&self) -> &[u64] {
        &self.max_time_ns
    }

    /// Fold another accumulator for the same method into this one
    pub fn merge(&mut self, other: &MethodStatistics) -> Result<()> {
        self.time_ns.merge(&other.time_ns)?;
        self.num_success += other.num_success;
        for &t in &other.max_time_ns {
            self.insert_max(t);
        }
        Ok(())
    }

    pub fn to_summary(&self) -> SummaryStatistics {
        SummaryStatistics::from(self)
    }
}

/// Report-ready latency summary, all values in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatistics {
    pub num_success: u64,
    /// Value at percentile `i` for `i in 0..=100`
    pub time_percentile_ms: Vec<f32>,
    /// Value at percentile `100 - 10^-i` for `i in 0..TIME_99_COUNT`
    pub time_99_percentile_ms: Vec<f32>,
    /// Largest samples, descending; `UNSET_MAX_TIME` where absent
    pub max_time_ms: Vec<f32>,
}

impl From<&MethodStatistics> for SummaryStatistics {
    fn from(stats: &MethodStatistics) -> Self {
        let hist = stats.histogram();

        let time_percentile_ms = (0..=100)
            .map(|p| hist.value_at_percentile(p as f64) as f32 / NANOS_PER_MS)
            .collect();

        let time_99_percentile_ms = (0..TIME_99_COUNT)
            .map(|i| {
                let p = 100.0 - 1.0 / 10f64.powi(i as i32);
                hist.value_at_percentile(p) as f32 / NANOS_PER_MS
            })
            .collect();

        let mut max_time_ms = vec![UNSET_MAX_TIME; MAX_TIME_COUNT];
        for (slot, &t) in max_time_ms.iter_mut().zip(stats.max_time_ns()) {
            *slot = t as f32 / NANOS_PER_MS;
        }

        Self {
            num_success: stats.num_success(),
            time_percentile_ms,
            time_99_percentile_ms,
            max_time_ms,
        }
    }
}
