//! Per-method profiling input
//!
//! A profiling agent running inside the filesystem client can log one JSON
//! record per method invocation. This module turns such records into
//! per-method [`MethodStatistics`] over a time window; the benchmark uses it to
//! report time-to-first-byte latencies next to throughput.
//!
//! ```text
//! {"method":"read","type":"fuse","isttfb":true,"timestamp":1700000000123,"duration":81234}
//! ```

use crate::stats::summary::MethodStatistics;
use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use tracing::debug;

/// One profiled method invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub method: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Whether this invocation delivered the first byte of a read
    #[serde(rename = "isttfb", default)]
    pub is_ttfb: bool,
    /// Invocation start, epoch milliseconds
    #[serde(rename = "timestamp")]
    pub timestamp_ms: u64,
    #[serde(rename = "duration")]
    pub duration_ns: u64,
}

/// Maps a record to the key it is grouped under, or `None` to skip it
pub type RecordSelector<'a> = &'a dyn Fn(&ProfileRecord) -> Option<String>;

/// Source of profiled invocations
pub trait ProfileSource: Send + Sync {
    /// Group records with `start_ms <= timestamp <= end_ms` by selector key
    fn method_statistics(
        &self,
        start_ms: u64,
        end_ms: u64,
        selector: RecordSelector<'_>,
    ) -> Result<HashMap<String, MethodStatistics>>;
}

/// Selector picking time-to-first-byte invocations, keyed by method
pub fn ttfb_selector(record: &ProfileRecord) -> Option<String> {
    record.is_ttfb.then(|| record.method.clone())
}

/// Fold records into per-key statistics
pub fn collect_method_statistics<I>(
    records: I,
    start_ms: u64,
    end_ms: u64,
    selector: RecordSelector<'_>,
) -> HashMap<String, MethodStatistics>
where
    I: IntoIterator<Item = ProfileRecord>,
{
    let mut stats: HashMap<String, MethodStatistics> = HashMap::new();
    for record in records {
        if record.timestamp_ms < start_ms || record.timestamp_ms > end_ms {
            continue;
        }
        if let Some(key) = selector(&record) {
            stats.entry(key).or_default().record(record.duration_ns);
        }
    }
    stats
}

/// Profile records read from a JSON-lines log file
#[derive(Debug, Clone)]
pub struct JsonLogProfileSource {
    path: PathBuf,
}

impl JsonLogProfileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ProfileSource for JsonLogProfileSource {
    fn method_statistics(
        &self,
        start_ms: u64,
        end_ms: u64,
        selector: RecordSelector<'_>,
    ) -> Result<HashMap<String, MethodStatistics>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open profile log: {}", self.path.display()))?;

        let mut records = Vec::new();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line
                .with_context(|| format!("Failed to read profile log: {}", self.path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ProfileRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => debug!("skipping profile line {}: {}", line_no + 1, e),
            }
        }

        Ok(collect_method_statistics(records, start_ms, end_ms, selector))
    }
}

/// Profile records held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryProfileSource {
    records: Vec<ProfileRecord>,
}

impl InMemoryProfileSource {
    pub fn new(records: Vec<ProfileRecord>) -> Self {
        Self { records }
    }
}

impl ProfileSource for InMemoryProfileSource {
    fn method_statistics(
        &self,
        start_ms: u64,
        end_ms: u64,
        selector: RecordSelector<'_>,
    ) -> Result<HashMap<String, MethodStatistics>> {
        Ok(collect_method_statistics(
            self.records.iter().cloned(),
            start_ms,
            end_ms,
            selector,
        ))
    }
}
