//! CLI argument parsing using clap

use super::{cli_convert, BaseParameters, BenchParameters, Config, IoOperation};
use crate::Result;
use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Operation selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OperationArg {
    Read,
    Write,
}

impl From<OperationArg> for IoOperation {
    fn from(arg: OperationArg) -> Self {
        match arg {
            OperationArg::Read => IoOperation::Read,
            OperationArg::Write => IoOperation::Write,
        }
    }
}

/// fusebench - concurrent sequential IO benchmark for FUSE and local mounts
#[derive(Parser, Debug, Default)]
#[command(name = "fusebench")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// TOML configuration file (command line flags take precedence)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    // === Workload Options ===
    /// Thread counts to test, comma-separated (e.g., 1,2,4,8)
    #[arg(short = 't', long, value_delimiter = ',')]
    pub threads: Vec<usize>,

    /// Number of files named data-0 .. data-N under the local path
    #[arg(short = 'n', long)]
    pub num_files: Option<usize>,

    /// Size of each file (e.g., 100k, 1G)
    #[arg(short = 's', long)]
    pub file_size: Option<String>,

    /// IO buffer size (e.g., 4k, 64k, 1M)
    #[arg(short = 'b', long)]
    pub buffer_size: Option<String>,

    /// Operation to perform
    #[arg(short = 'o', long, value_enum)]
    pub operation: Option<OperationArg>,

    /// Warmup before measurement starts (e.g., 5s); forced to 0s for writes
    #[arg(short = 'w', long)]
    pub warmup: Option<String>,

    /// Measured duration of each phase (e.g., 30s, 5m)
    #[arg(short = 'd', long)]
    pub duration: Option<String>,

    /// Directory containing the benchmark files
    #[arg(short = 'p', long)]
    pub local_path: Option<PathBuf>,

    /// Read at random offsets (not supported; falls back to sequential)
    #[arg(long)]
    pub read_random: bool,

    // === Run Options ===
    /// Identifier for this run in reports
    #[arg(long)]
    pub id: Option<String>,

    /// Absolute start time in epoch milliseconds, for aligning several hosts
    #[arg(long, env = "FUSEBENCH_START_MS")]
    pub start_ms: Option<u64>,

    /// Upper bound on each phase (e.g., 20m)
    #[arg(long)]
    pub bench_timeout: Option<String>,

    /// Lead time before the start barrier of each phase (e.g., 10s)
    #[arg(long)]
    pub start_lead_time: Option<String>,

    /// Time cancelled workers get to report after a timeout (e.g., 30s)
    #[arg(long)]
    pub grace_period: Option<String>,

    /// JSON-lines profile log to derive time-to-first-byte statistics from
    #[arg(long)]
    pub profile_log: Option<PathBuf>,

    // === Output Options ===
    /// Write the full result as JSON to this path ("-" for stdout)
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Build the run configuration, layering these flags over an optional file
    pub fn to_config(&self) -> Result<Config> {
        let config = match &self.config {
            Some(path) => super::toml::parse_toml_file(path)?,
            None => Config::default(),
        };
        self.apply_overrides(config)
    }

    /// Override `config` with every flag that was given explicitly
    pub fn apply_overrides(&self, mut config: Config) -> Result<Config> {
        let bench: &mut BenchParameters = &mut config.bench;
        if !self.threads.is_empty() {
            bench.threads = self.threads.clone();
        }
        if let Some(n) = self.num_files {
            bench.num_files = n;
        }
        if let Some(ref size) = self.file_size {
            cli_convert::parse_size(size).context("Invalid --file-size")?;
            bench.file_size = size.clone();
        }
        if let Some(ref size) = self.buffer_size {
            cli_convert::parse_size(size).context("Invalid --buffer-size")?;
            bench.buffer_size = size.clone();
        }
        if let Some(op) = self.operation {
            bench.operation = op.into();
        }
        if let Some(ref warmup) = self.warmup {
            cli_convert::parse_time_ms(warmup).context("Invalid --warmup")?;
            bench.warmup = warmup.clone();
        }
        if let Some(ref duration) = self.duration {
            cli_convert::parse_time_ms(duration).context("Invalid --duration")?;
            bench.duration = duration.clone();
        }
        if let Some(ref path) = self.local_path {
            bench.local_path = path.clone();
        }
        if self.read_random {
            bench.read_random = true;
        }

        let base: &mut BaseParameters = &mut config.base;
        if let Some(ref id) = self.id {
            base.id = id.clone();
        }
        if self.start_ms.is_some() {
            base.start_ms = self.start_ms;
        }
        if let Some(ref timeout) = self.bench_timeout {
            cli_convert::parse_time_ms(timeout).context("Invalid --bench-timeout")?;
            base.bench_timeout = timeout.clone();
        }
        if let Some(ref lead) = self.start_lead_time {
            cli_convert::parse_time_ms(lead).context("Invalid --start-lead-time")?;
            base.start_lead_time = lead.clone();
        }
        if let Some(ref grace) = self.grace_period {
            cli_convert::parse_time_ms(grace).context("Invalid --grace-period")?;
            base.grace_period = grace.clone();
        }
        if self.profile_log.is_some() {
            base.profile_log = self.profile_log.clone();
        }

        Ok(config)
    }
}
