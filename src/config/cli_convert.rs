//! Human-readable size and time string parsing

use anyhow::{Context, Result};

/// Parse a size string (e.g., "1G", "100MB", "4k") to bytes
///
/// Suffixes are base 1024 and case-insensitive. A bare number is bytes.
pub fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim().to_lowercase();

    let (num_str, multiplier) = if s.ends_with("k") || s.ends_with("kb") {
        (s.trim_end_matches("kb").trim_end_matches("k"), 1024u64)
    } else if s.ends_with("m") || s.ends_with("mb") {
        (s.trim_end_matches("mb").trim_end_matches("m"), 1024 * 1024)
    } else if s.ends_with("g") || s.ends_with("gb") {
        (s.trim_end_matches("gb").trim_end_matches("g"), 1024 * 1024 * 1024)
    } else if s.ends_with("t") || s.ends_with("tb") {
        (s.trim_end_matches("tb").trim_end_matches("t"), 1024 * 1024 * 1024 * 1024)
    } else if s.ends_with("b") {
        (s.trim_end_matches("b"), 1)
    } else {
        (s.as_str(), 1)
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid size format: {}", s))?;

    num.checked_mul(multiplier)
        .with_context(|| format!("Size out of range: {}", s))
}

/// Parse a time string (e.g., "500ms", "30s", "5m", "1h", "1d") to milliseconds
///
/// A bare number is milliseconds.
pub fn parse_time_ms(s: &str) -> Result<u64> {
    let s = s.trim().to_lowercase();

    let (num_str, multiplier) = if s.ends_with("ms") {
        (s.trim_end_matches("ms"), 1u64)
    } else if s.ends_with("sec") || s.ends_with("s") {
        (s.trim_end_matches("sec").trim_end_matches("s"), 1000)
    } else if s.ends_with("min") || s.ends_with("m") {
        (s.trim_end_matches("min").trim_end_matches("m"), 60 * 1000)
    } else if s.ends_with("hr") || s.ends_with("h") {
        (s.trim_end_matches("hr").trim_end_matches("h"), 60 * 60 * 1000)
    } else if s.ends_with("d") {
        (s.trim_end_matches("d"), 24 * 60 * 60 * 1000)
    } else {
        (s.as_str(), 1)
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid time format: {}", s))?;

    num.checked_mul(multiplier)
        .with_context(|| format!("Time out of range: {}", s))
}
