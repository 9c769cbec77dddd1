//! Benchmark driver
//!
//! Runs one phase per configured thread count, in ascending order, and collects
//! the phase results into a [`TaskResult`].
//!
//! All configuration checks happen in [`BenchDriver::new`], before any file is
//! touched or any barrier instant is computed. Once running, only worker-level
//! failures can occur, and those end up as error messages in the result.
//!
//! # Example
//!
//! ```no_run
//! use fusebench::config::{Config, IoOperation};
//! use fusebench::coordinator::BenchDriver;
//!
//! let mut config = Config::default();
//! config.bench.threads = vec![1, 2, 4];
//! config.bench.num_files = 4;
//! config.bench.operation = IoOperation::Write;
//!
//! let driver = BenchDriver::new(config)?;
//! let result = driver.run()?;
//! for (threads, phase) in &result.thread_count_results {
//!     println!("{} threads: {:.2} MB/s", threads, phase.io_mbps());
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod phase;

use crate::config::validator::{normalize, validate_config};
use crate::config::{BaseParameters, BenchParameters, Config};
use crate::profile::{ttfb_selector, JsonLogProfileSource, ProfileSource};
use crate::stats::summary::SummaryStatistics;
use crate::stats::TaskResult;
use crate::Result;
use phase::{ExecutorFactory, PhaseCoordinator, PhaseSettings};
use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

/// Runs the full benchmark across all thread counts
pub struct BenchDriver {
    base: BaseParameters,
    params: BenchParameters,
    coordinator: PhaseCoordinator,
    profile_source: Option<Box<dyn ProfileSource>>,
}

impl BenchDriver {
    /// Validate and normalize `config`, then prepare the driver
    ///
    /// Fails with a [`ConfigError`](crate::config::validator::ConfigError) if
    /// any thread count exceeds the number of files or a parameter is invalid.
    pub fn new(config: Config) -> Result<Self> {
        validate_config(&config)?;

        let Config { base, mut bench } = config;
        normalize(&mut bench);

        let settings = PhaseSettings::from_parameters(&base, &bench)?;
        // Flips to true once, the first time any worker gets through a barrier
        let barrier_passed = Arc::new(AtomicBool::new(false));
        let coordinator = PhaseCoordinator::new(settings, barrier_passed);

        let profile_source = base
            .profile_log
            .as_ref()
            .map(|path| Box::new(JsonLogProfileSource::new(path)) as Box<dyn ProfileSource>);

        Ok(Self {
            base,
            params: bench,
            coordinator,
            profile_source,
        })
    }

    pub fn with_executor_factory(mut self, factory: ExecutorFactory) -> Self {
        self.coordinator = self.coordinator.with_executor_factory(factory);
        self
    }

    pub fn with_profile_source(mut self, source: Box<dyn ProfileSource>) -> Self {
        self.profile_source = Some(source);
        self
    }

    /// Parameters after normalization
    pub fn parameters(&self) -> &BenchParameters {
        &self.params
    }

    /// Run every phase and assemble the task result
    pub fn run(&self) -> Result<TaskResult> {
        let mut thread_counts = self.params.threads.clone();
        thread_counts.sort_unstable();
        thread_counts.dedup();

        let mut task_result = TaskResult::new(self.base.clone(), self.params.clone());
        for num_threads in thread_counts {
            let result = self.coordinator.run(num_threads);
            task_result.add_thread_count_result(num_threads, result);
        }

        if self.profile_source.is_some() {
            if let Some((start_ms, end_ms)) = task_result.time_window_ms() {
                match self.additional_result(start_ms, end_ms) {
                    Ok(ttfb) => task_result.time_to_first_byte = ttfb,
                    Err(e) => warn!("Failed to collect time-to-first-byte statistics: {:#}", e),
                }
            }
        }

        info!(
            "benchmark finished: {} phases, {} errors",
            task_result.thread_count_results.len(),
            task_result.error_count()
        );
        Ok(task_result)
    }

    /// Time-to-first-byte summaries from the profile source for a window
    ///
    /// Empty when no profile source is configured.
    pub fn additional_result(
        &self,
        start_ms: u64,
        end_ms: u64,
    ) -> Result<BTreeMap<String, SummaryStatistics>> {
        let Some(source) = self.profile_source.as_ref() else {
            return Ok(BTreeMap::new());
        };
        let stats = source.method_statistics(start_ms, end_ms, &ttfb_selector)?;
        Ok(stats
            .iter()
            .map(|(method, stats)| (method.clone(), stats.to_summary()))
            .collect())
    }
}
