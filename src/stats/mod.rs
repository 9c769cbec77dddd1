//! Benchmark results
//!
//! Three layers of results flow up from the workers:
//!
//! - [`WorkerResult`]: private accumulator of one worker thread
//! - [`PhaseResult`]: all workers of one thread count merged together
//! - [`TaskResult`]: every phase of a run, keyed by thread count
//!
//! Merging is associative and commutative: byte counts add up, error lists
//! concatenate, the measurement window widens to cover every worker.
//!
//! # Example
//!
//! ```
//! use fusebench::stats::{PhaseResult, WorkerResult};
//!
//! let mut w0 = WorkerResult::new(0, 1_000);
//! w0.add_io_bytes(4096);
//! w0.set_end_ms(3_000);
//!
//! let mut w1 = WorkerResult::new(1, 1_000);
//! w1.add_io_bytes(4096);
//! w1.set_end_ms(2_000);
//!
//! let mut phase = PhaseResult::from_worker(2, w0);
//! phase.merge(&w1).unwrap();
//!
//! assert_eq!(phase.io_bytes, 8192);
//! assert_eq!(phase.window_ms(), 2_000);
//! assert_eq!(phase.throughput_bytes_per_sec(), 4096.0);
//! ```

pub mod histogram;
pub mod summary;

use crate::config::{BaseParameters, BenchParameters};
use crate::util::time::calculate_throughput;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use summary::SummaryStatistics;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Outcome of one worker within a phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerResult {
    pub worker_id: usize,
    /// Files assigned to this worker
    pub files_owned: usize,
    /// Bytes transferred after warmup
    pub io_bytes: u64,
    pub errors: Vec<String>,
    /// When measurement starts (epoch ms)
    pub record_start_ms: u64,
    /// When the worker finished (epoch ms)
    pub end_ms: u64,
}

impl WorkerResult {
    pub fn new(worker_id: usize, record_start_ms: u64) -> Self {
        Self {
            worker_id,
            record_start_ms,
            ..Default::default()
        }
    }

    #[inline]
    pub fn add_io_bytes(&mut self, bytes: u64) {
        self.io_bytes += bytes;
    }

    pub fn add_error_message(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn set_end_ms(&mut self, end_ms: u64) {
        self.end_ms = end_ms;
    }
}

/// Merged outcome of every worker at one thread count
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseResult {
    pub num_threads: usize,
    /// Number of worker results merged in
    pub workers_reported: usize,
    pub io_bytes: u64,
    pub errors: Vec<String>,
    pub record_start_ms: u64,
    pub end_ms: u64,
}

impl PhaseResult {
    /// A result no worker has reported into yet
    pub fn empty(num_threads: usize) -> Self {
        Self {
            num_threads,
            ..Default::default()
        }
    }

    /// Start a phase result with its first reporting worker as the base
    pub fn from_worker(num_threads: usize, worker: WorkerResult) -> Self {
        Self {
            num_threads,
            workers_reported: 1,
            io_bytes: worker.io_bytes,
            errors: worker.errors,
            record_start_ms: worker.record_start_ms,
            end_ms: worker.end_ms,
        }
    }

    /// Merge a worker result into this phase
    ///
    /// On failure `self` is left unchanged.
    pub fn merge(&mut self, worker: &WorkerResult) -> Result<()> {
        let io_bytes = self.io_bytes.checked_add(worker.io_bytes).ok_or_else(|| {
            anyhow::anyhow!(
                "Byte count overflow merging worker {} ({} + {})",
                worker.worker_id,
                self.io_bytes,
                worker.io_bytes
            )
        })?;

        self.io_bytes = io_bytes;
        self.errors.extend(worker.errors.iter().cloned());
        self.record_start_ms = if self.workers_reported == 0 {
            worker.record_start_ms
        } else {
            self.record_start_ms.min(worker.record_start_ms)
        };
        self.end_ms = self.end_ms.max(worker.end_ms);
        self.workers_reported += 1;
        Ok(())
    }

    pub fn add_error_message(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Length of the measurement window in milliseconds
    pub fn window_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.record_start_ms)
    }

    pub fn throughput_bytes_per_sec(&self) -> f64 {
        calculate_throughput(self.io_bytes, self.window_ms())
    }

    /// Throughput in MiB/s
    pub fn io_mbps(&self) -> f64 {
        self.throughput_bytes_per_sec() / BYTES_PER_MB
    }
}

/// Output of a whole benchmark run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub base_parameters: BaseParameters,
    pub parameters: BenchParameters,
    /// Phase results in ascending thread-count order
    pub thread_count_results: BTreeMap<usize, PhaseResult>,
    /// Time-to-first-byte summaries by method, when a profile log was given
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub time_to_first_byte: BTreeMap<String, SummaryStatistics>,
}

impl TaskResult {
    pub fn new(base_parameters: BaseParameters, parameters: BenchParameters) -> Self {
        Self {
            base_parameters,
            parameters,
            thread_count_results: BTreeMap::new(),
            time_to_first_byte: BTreeMap::new(),
        }
    }

    pub fn add_thread_count_result(&mut self, num_threads: usize, result: PhaseResult) {
        self.thread_count_results.insert(num_threads, result);
    }

    /// Errors across every phase
    pub fn error_count(&self) -> usize {
        self.thread_count_results.values().map(|r| r.errors.len()).sum()
    }

    /// Earliest record start and latest end across phases
    pub fn time_window_ms(&self) -> Option<(u64, u64)> {
        let start = self
            .thread_count_results
            .values()
            .filter(|r| r.workers_reported > 0)
            .map(|r| r.record_start_ms)
            .min()?;
        let end = self.thread_count_results.values().map(|r| r.end_ms).max()?;
        Some((start, end))
    }
}
