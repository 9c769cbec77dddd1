//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.
//!
//! Sizes and durations are kept as the human-readable strings the user typed
//! (`"1GB"`, `"30s"`) so the parameter snapshot in a result reads the same way
//! it was given. The `*_bytes()` / `*_ms()` accessors parse on demand.

pub mod cli;
pub mod cli_convert;
pub mod toml;
pub mod validator;

use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Complete run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub base: BaseParameters,
    #[serde(default)]
    pub bench: BenchParameters,
}

/// The kind of IO each worker performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IoOperation {
    Read,
    Write,
}

impl IoOperation {
    pub fn is_read(self) -> bool {
        matches!(self, IoOperation::Read)
    }
}

impl Default for IoOperation {
    fn default() -> Self {
        Self::Read
    }
}

impl fmt::Display for IoOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoOperation::Read => write!(f, "read"),
            IoOperation::Write => write!(f, "write"),
        }
    }
}

impl FromStr for IoOperation {
    type Err = validator::ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(IoOperation::Read),
            "write" => Ok(IoOperation::Write),
            other => Err(validator::ConfigError::UnknownOperation(other.to_string())),
        }
    }
}

/// Parameters of the IO workload itself
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchParameters {
    /// Thread counts to test, one phase each
    #[serde(default = "default_threads")]
    pub threads: Vec<usize>,
    /// Number of files under `local_path`
    #[serde(default = "default_num_files")]
    pub num_files: usize,
    /// Size of each file (e.g. "100k", "1GB")
    #[serde(default = "default_file_size")]
    pub file_size: String,
    /// Size of the IO buffer (e.g. "64k")
    #[serde(default = "default_buffer_size")]
    pub buffer_size: String,
    #[serde(default)]
    pub operation: IoOperation,
    /// Unmeasured lead-in of every phase (e.g. "5s")
    #[serde(default = "default_warmup")]
    pub warmup: String,
    /// Measured part of every phase (e.g. "30s")
    #[serde(default = "default_duration")]
    pub duration: String,
    /// Directory holding `data-0 .. data-(num_files-1)`
    #[serde(default = "default_local_path")]
    pub local_path: PathBuf,
    /// Random reads are not supported and get downgraded to sequential
    #[serde(default)]
    pub read_random: bool,
}

fn default_threads() -> Vec<usize> {
    vec![1]
}

fn default_num_files() -> usize {
    1
}

fn default_file_size() -> String {
    "100k".to_string()
}

fn default_buffer_size() -> String {
    "64k".to_string()
}

fn default_warmup() -> String {
    "0s".to_string()
}

fn default_duration() -> String {
    "30s".to_string()
}

fn default_local_path() -> PathBuf {
    PathBuf::from("/mnt/fuse/io-bench")
}

impl Default for BenchParameters {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            num_files: default_num_files(),
            file_size: default_file_size(),
            buffer_size: default_buffer_size(),
            operation: IoOperation::default(),
            warmup: default_warmup(),
            duration: default_duration(),
            local_path: default_local_path(),
            read_random: false,
        }
    }
}

impl BenchParameters {
    pub fn file_size_bytes(&self) -> Result<u64> {
        cli_convert::parse_size(&self.file_size).context("Invalid file size")
    }

    pub fn buffer_size_bytes(&self) -> Result<usize> {
        let bytes = cli_convert::parse_size(&self.buffer_size).context("Invalid buffer size")?;
        usize::try_from(bytes).context("Buffer size does not fit in memory")
    }

    pub fn warmup_ms(&self) -> Result<u64> {
        cli_convert::parse_time_ms(&self.warmup).context("Invalid warmup")
    }

    pub fn duration_ms(&self) -> Result<u64> {
        cli_convert::parse_time_ms(&self.duration).context("Invalid duration")
    }
}

/// `<base_dir>/data-<index>`
pub fn data_file_path(base_dir: &Path, index: usize) -> PathBuf {
    base_dir.join(format!("data-{}", index))
}

/// Parameters shared by every benchmark run, independent of the workload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseParameters {
    /// Identifier printed in reports
    #[serde(default = "default_id")]
    pub id: String,
    /// Absolute start instant (epoch ms) supplied by an outside orchestrator
    #[serde(default)]
    pub start_ms: Option<u64>,
    /// Upper bound on a single phase (e.g. "20m")
    #[serde(default = "default_bench_timeout")]
    pub bench_timeout: String,
    /// Lead time before the start barrier when no start instant applies
    #[serde(default = "default_start_lead_time")]
    pub start_lead_time: String,
    /// Time cancelled workers get to report after a timeout
    #[serde(default = "default_grace_period")]
    pub grace_period: String,
    /// JSON-lines profile log used for time-to-first-byte enrichment
    #[serde(default)]
    pub profile_log: Option<PathBuf>,
}

fn default_id() -> String {
    "local-task-0".to_string()
}

fn default_bench_timeout() -> String {
    "20m".to_string()
}

fn default_start_lead_time() -> String {
    "10s".to_string()
}

fn default_grace_period() -> String {
    "30s".to_string()
}

impl Default for BaseParameters {
    fn default() -> Self {
        Self {
            id: default_id(),
            start_ms: None,
            bench_timeout: default_bench_timeout(),
            start_lead_time: default_start_lead_time(),
            grace_period: default_grace_period(),
            profile_log: None,
        }
    }
}

impl BaseParameters {
    pub fn bench_timeout_ms(&self) -> Result<u64> {
        cli_convert::parse_time_ms(&self.bench_timeout).context("Invalid bench timeout")
    }

    pub fn start_lead_time_ms(&self) -> Result<u64> {
        cli_convert::parse_time_ms(&self.start_lead_time).context("Invalid start lead time")
    }

    pub fn grace_period_ms(&self) -> Result<u64> {
        cli_convert::parse_time_ms(&self.grace_period).context("Invalid grace period")
    }
}
