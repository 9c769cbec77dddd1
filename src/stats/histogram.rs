//! Latency histogram using HdrHistogram
//!
//! Thin wrapper tracking nanosecond latencies from 1ns to 1 hour with 3
//! significant digits (values accurate to within 0.1%).
//!
//! # Example
//!
//! ```
//! use fusebench::stats::histogram::LatencyHistogram;
//!
//! let mut hist = LatencyHistogram::new();
//! hist.record_nanos(100_000);
//! hist.record_nanos(200_000);
//!
//! assert_eq!(hist.len(), 2);
//! assert!(hist.value_at_percentile(100.0) >= 200_000);
//! ```

use crate::Result;
use hdrhistogram::Histogram;

const MIN_NANOS: u64 = 1;
const MAX_NANOS: u64 = 3_600_000_000_000;

/// Latency histogram wrapper
#[derive(Debug, Clone)]
pub struct LatencyHistogram {
    histogram: Histogram<u64>,
}

impl LatencyHistogram {
    /// Create a new latency histogram
    pub fn new() -> Self {
        let histogram = Histogram::new_with_bounds(MIN_NANOS, MAX_NANOS, 3)
            .expect("Failed to create histogram with valid bounds");

        Self { histogram }
    }

    /// Record a latency sample in nanoseconds
    ///
    /// Values outside 1ns..1h are clamped to the nearest bound.
    #[inline]
    pub fn record_nanos(&mut self, nanos: u64) {
        let value = nanos.clamp(MIN_NANOS, MAX_NANOS);
        let _ = self.histogram.record(value);
    }

    /// Value at `percentile` (0.0 - 100.0) in nanoseconds, 0 when empty
    pub fn value_at_percentile(&self, percentile: f64) -> u64 {
        if self.histogram.len() == 0 {
            return 0;
        }
        self.histogram.value_at_percentile(percentile)
    }

    /// Number of recorded samples
    pub fn len(&self) -> u64 {
        self.histogram.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histogram.len() == 0
    }

    /// Merge another histogram into this one
    pub fn merge(&mut self, other: &LatencyHistogram) -> Result<()> {
        self.histogram
            .add(&other.histogram)
            .map_err(|e| anyhow::anyhow!("Failed to merge histograms: {:?}", e))
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}
