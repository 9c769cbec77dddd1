//! Configuration validation
//!
//! Every check here runs before the first phase is started: nothing touches
//! the filesystem and no barrier instant is computed until validation passes.

use super::*;
use crate::util::time::now_ms;
use thiserror::Error;
use tracing::warn;

/// Pre-flight configuration failure
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Number of threads ({threads}) must not be larger than number of files ({num_files})")]
    TooManyThreads { threads: usize, num_files: usize },

    #[error("At least one thread count must be given")]
    NoThreadCounts,

    #[error("Thread count must be positive")]
    ZeroThreads,

    #[error("Number of files must be positive")]
    ZeroFiles,

    #[error("Buffer size must be positive")]
    ZeroBufferSize,

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Bench timeout ({bench_timeout}) must be longer than the start lead time ({start_lead_time})")]
    TimeoutWithinLeadTime {
        bench_timeout: String,
        start_lead_time: String,
    },

    #[error("Phase end is out of range: warmup {warmup} plus duration {duration} overflows the clock")]
    PhaseOutOfRange { warmup: String, duration: String },

    #[error("Invalid {field}: {message}")]
    Unparseable { field: &'static str, message: String },
}

/// Validate complete configuration
pub fn validate_config(config: &Config) -> std::result::Result<(), ConfigError> {
    validate_bench(&config.bench)?;
    validate_base(&config.base)?;
    validate_phase_window(&config.base, &config.bench)
}

/// Validate workload parameters
pub fn validate_bench(params: &BenchParameters) -> std::result::Result<(), ConfigError> {
    if params.threads.is_empty() {
        return Err(ConfigError::NoThreadCounts);
    }
    if params.num_files == 0 {
        return Err(ConfigError::ZeroFiles);
    }

    // Reject before any phase starts, for every configured count
    for &threads in &params.threads {
        if threads == 0 {
            return Err(ConfigError::ZeroThreads);
        }
        if threads > params.num_files {
            return Err(ConfigError::TooManyThreads {
                threads,
                num_files: params.num_files,
            });
        }
    }

    params
        .file_size_bytes()
        .map_err(|e| unparseable("file size", e))?;
    let buffer_size = params
        .buffer_size_bytes()
        .map_err(|e| unparseable("buffer size", e))?;
    if buffer_size == 0 {
        return Err(ConfigError::ZeroBufferSize);
    }
    params.warmup_ms().map_err(|e| unparseable("warmup", e))?;
    params.duration_ms().map_err(|e| unparseable("duration", e))?;

    Ok(())
}

/// Validate run-wide parameters
pub fn validate_base(base: &BaseParameters) -> std::result::Result<(), ConfigError> {
    let timeout_ms = base
        .bench_timeout_ms()
        .map_err(|e| unparseable("bench timeout", e))?;
    let lead_ms = base
        .start_lead_time_ms()
        .map_err(|e| unparseable("start lead time", e))?;
    base.grace_period_ms()
        .map_err(|e| unparseable("grace period", e))?;

    // Otherwise every worker is cancelled while still waiting at the barrier
    if timeout_ms <= lead_ms {
        return Err(ConfigError::TimeoutWithinLeadTime {
            bench_timeout: base.bench_timeout.clone(),
            start_lead_time: base.start_lead_time.clone(),
        });
    }
    Ok(())
}

/// Check that every phase boundary fits in epoch milliseconds
///
/// Phases start at the supplied instant or a lead time from now; one extra
/// lead time is allowed for the later phases.
pub fn validate_phase_window(
    base: &BaseParameters,
    params: &BenchParameters,
) -> std::result::Result<(), ConfigError> {
    let lead_ms = base
        .start_lead_time_ms()
        .map_err(|e| unparseable("start lead time", e))?;
    let warmup_ms = params.warmup_ms().map_err(|e| unparseable("warmup", e))?;
    let duration_ms = params.duration_ms().map_err(|e| unparseable("duration", e))?;

    let earliest = now_ms().max(base.start_ms.unwrap_or(0));
    earliest
        .checked_add(lead_ms)
        .and_then(|t| t.checked_add(lead_ms))
        .and_then(|t| t.checked_add(warmup_ms))
        .and_then(|t| t.checked_add(duration_ms))
        .map(|_| ())
        .ok_or_else(|| ConfigError::PhaseOutOfRange {
            warmup: params.warmup.clone(),
            duration: params.duration.clone(),
        })
}

/// Rewrite options the benchmark cannot honour into ones it can
///
/// Random reads are downgraded to sequential reads. Writes cannot be warmed
/// up without consuming the dataset before measurement, so their warmup is
/// forced to zero.
pub fn normalize(params: &mut BenchParameters) {
    if params.read_random {
        warn!("Random read is not supported for now. Read sequentially");
        params.read_random = false;
    }
    if params.operation == IoOperation::Write && params.warmup_ms().map_or(true, |ms| ms != 0) {
        warn!("Cannot write repeatedly, so warmup is not possible. Setting warmup to 0s.");
        params.warmup = "0s".to_string();
    }
}

fn unparseable(field: &'static str, err: anyhow::Error) -> ConfigError {
    ConfigError::Unparseable {
        field,
        message: format!("{:#}", err),
    }
}
