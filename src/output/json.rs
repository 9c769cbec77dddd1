//! JSON output formatting
//!
//! The serialized document is the [`TaskResult`] itself plus, per phase, a
//! derived throughput block so consumers don't need to recompute it.

use crate::config::{BaseParameters, BenchParameters};
use crate::stats::summary::SummaryStatistics;
use crate::stats::{PhaseResult, TaskResult};
use crate::util::time::format_throughput;
use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Throughput with bytes/sec and human-readable format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonThroughput {
    pub bytes_per_sec: f64,
    pub mb_per_sec: f64,
    pub human: String,
}

impl JsonThroughput {
    pub fn from_phase(phase: &PhaseResult) -> Self {
        let bytes_per_sec = phase.throughput_bytes_per_sec();
        Self {
            bytes_per_sec,
            mb_per_sec: phase.io_mbps(),
            human: format_throughput(bytes_per_sec),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonPhaseOutput {
    #[serde(flatten)]
    pub result: PhaseResult,
    pub window_ms: u64,
    pub throughput: JsonThroughput,
}

/// Top-level JSON document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonTaskOutput {
    pub version: String,
    pub base_parameters: BaseParameters,
    pub parameters: BenchParameters,
    pub thread_count_results: BTreeMap<usize, JsonPhaseOutput>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub time_to_first_byte: BTreeMap<String, SummaryStatistics>,
}

impl From<&TaskResult> for JsonTaskOutput {
    fn from(result: &TaskResult) -> Self {
        let thread_count_results = result
            .thread_count_results
            .iter()
            .map(|(&threads, phase)| {
                let output = JsonPhaseOutput {
                    result: phase.clone(),
                    window_ms: phase.window_ms(),
                    throughput: JsonThroughput::from_phase(phase),
                };
                (threads, output)
            })
            .collect();

        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            base_parameters: result.base_parameters.clone(),
            parameters: result.parameters.clone(),
            thread_count_results,
            time_to_first_byte: result.time_to_first_byte.clone(),
        }
    }
}

/// Write the task result as pretty JSON; `-` means stdout
pub fn write_json_output(output_path: &Path, result: &TaskResult) -> Result<()> {
    let output = JsonTaskOutput::from(result);

    if output_path == Path::new("-") {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        serde_json::to_writer_pretty(&mut out, &output)?;
        writeln!(out)?;
        return Ok(());
    }

    let file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON output: {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &output)?;
    writer.flush()?;
    Ok(())
}
