//! Wall-clock timing utilities
//!
//! Phase boundaries are absolute instants so that a caller on another machine
//! can hand us a shared start time. They are kept as milliseconds since the
//! Unix epoch rather than `Instant`, which has no absolute meaning.

use chrono::{DateTime, Local, TimeZone};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds since the Unix epoch
#[inline]
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Signed distance from now until `target_ms`
///
/// Negative when the target lies in the past.
#[inline]
pub fn millis_until(target_ms: u64) -> i64 {
    let delta = target_ms as i128 - now_ms() as i128;
    delta.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Render an epoch-millisecond timestamp in local time
///
/// # Examples
///
/// ```
/// use fusebench::util::time::format_epoch_ms;
///
/// assert!(!format_epoch_ms(0).is_empty());
/// ```
pub fn format_epoch_ms(epoch_ms: u64) -> String {
    let local: Option<DateTime<Local>> = Local.timestamp_millis_opt(epoch_ms as i64).single();
    match local {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        None => format!("{}ms", epoch_ms),
    }
}

/// Calculate throughput from bytes transferred over a millisecond window
///
/// Returns bytes per second, or 0.0 for an empty window.
pub fn calculate_throughput(bytes: u64, window_ms: u64) -> f64 {
    if window_ms == 0 {
        return 0.0;
    }
    bytes as f64 * 1000.0 / window_ms as f64
}

/// Format throughput in human-readable form (B/s, KB/s, MB/s, GB/s)
///
/// # Examples
///
/// ```
/// use fusebench::util::time::format_throughput;
///
/// assert_eq!(format_throughput(500.0), "500.00 B/s");
/// assert_eq!(format_throughput(1536.0), "1.50 KB/s");
/// assert_eq!(format_throughput(2_621_440.0), "2.50 MB/s");
/// ```
pub fn format_throughput(bytes_per_sec: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    const TB: f64 = GB * 1024.0;

    if bytes_per_sec >= TB {
        format!("{:.2} TB/s", bytes_per_sec / TB)
    } else if bytes_per_sec >= GB {
        format!("{:.2} GB/s", bytes_per_sec / GB)
    } else if bytes_per_sec >= MB {
        format!("{:.2} MB/s", bytes_per_sec / MB)
    } else if bytes_per_sec >= KB {
        format!("{:.2} KB/s", bytes_per_sec / KB)
    } else {
        format!("{:.2} B/s", bytes_per_sec)
    }
}

/// Format a byte count in human-readable form
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GiB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MiB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KiB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
