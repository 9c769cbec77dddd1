//! Human-readable text output

use crate::stats::summary::SummaryStatistics;
use crate::stats::{PhaseResult, TaskResult};
use crate::util::time::{format_bytes, format_epoch_ms, format_throughput};
use std::io::{self, Write};

/// Errors shown per phase before the rest are summarized
const MAX_ERRORS_SHOWN: usize = 5;

/// Print the benchmark report to stdout
pub fn print_results(result: &TaskResult) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    // A closed stdout leaves nothing to report to
    let _ = write_results(&mut out, result);
}

/// Write the benchmark report
pub fn write_results<W: Write>(out: &mut W, result: &TaskResult) -> io::Result<()> {
    let params = &result.parameters;

    writeln!(out, "═══════════════════════════════════════════════════════════")?;
    writeln!(out, "                    BENCHMARK RESULTS")?;
    writeln!(out, "═══════════════════════════════════════════════════════════")?;
    writeln!(out)?;
    writeln!(out, "Run:       {}", result.base_parameters.id)?;
    writeln!(out, "Operation: {}", params.operation)?;
    writeln!(
        out,
        "Files:     {} x {} in {}",
        params.num_files,
        params.file_size,
        params.local_path.display()
    )?;
    writeln!(out, "Buffer:    {}", params.buffer_size)?;
    writeln!(out, "Warmup:    {}  Duration: {}", params.warmup, params.duration)?;
    writeln!(out)?;

    for phase in result.thread_count_results.values() {
        write_phase(out, phase)?;
    }

    if !result.time_to_first_byte.is_empty() {
        writeln!(out, "Time to first byte:")?;
        for (method, summary) in &result.time_to_first_byte {
            write_ttfb(out, method, summary)?;
        }
        writeln!(out)?;
    }

    let errors = result.error_count();
    if errors > 0 {
        writeln!(out, "Total errors: {}", errors)?;
    }
    Ok(())
}

fn write_phase<W: Write>(out: &mut W, phase: &PhaseResult) -> io::Result<()> {
    writeln!(out, "Threads: {}", phase.num_threads)?;
    writeln!(
        out,
        "  Window:     {} .. {} ({} ms)",
        format_epoch_ms(phase.record_start_ms),
        format_epoch_ms(phase.end_ms),
        phase.window_ms()
    )?;
    writeln!(out, "  Bytes:      {}", format_bytes(phase.io_bytes))?;
    writeln!(
        out,
        "  Throughput: {} ({:.3} MB/s)",
        format_throughput(phase.throughput_bytes_per_sec()),
        phase.io_mbps()
    )?;
    writeln!(
        out,
        "  Workers:    {}/{} reported",
        phase.workers_reported, phase.num_threads
    )?;

    if !phase.errors.is_empty() {
        writeln!(out, "  Errors:     {}", phase.errors.len())?;
        for error in phase.errors.iter().take(MAX_ERRORS_SHOWN) {
            writeln!(out, "    - {}", error)?;
        }
        if phase.errors.len() > MAX_ERRORS_SHOWN {
            writeln!(out, "    ... and {} more", phase.errors.len() - MAX_ERRORS_SHOWN)?;
        }
    }
    writeln!(out)
}

fn write_ttfb<W: Write>(out: &mut W, method: &str, summary: &SummaryStatistics) -> io::Result<()> {
    let p = |i: usize| summary.time_percentile_ms.get(i).copied().unwrap_or(0.0);
    writeln!(
        out,
        "  {:<12} n={}  p50={:.3}ms  p90={:.3}ms  p99={:.3}ms  max={:.3}ms",
        method,
        summary.num_success,
        p(50),
        p(90),
        p(99),
        summary.max_time_ms.first().copied().unwrap_or(0.0).max(0.0)
    )
}
