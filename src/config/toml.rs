//! TOML configuration file parsing
//!
//! ```toml
//! [base]
//! bench_timeout = "20m"
//!
//! [bench]
//! threads = [1, 2, 4]
//! num_files = 4
//! file_size = "1G"
//! operation = "read"
//! ```

use super::*;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_full_file() {
        let config = parse_toml_string(
            r#"
            [base]
            id = "node-3"
            start_ms = 1700000000000
            bench_timeout = "5m"

            [bench]
            threads = [4, 1]
            num_files = 16
            file_size = "1G"
            buffer_size = "1M"
            operation = "write"
            warmup = "0s"
            duration = "45s"
            local_path = "/mnt/fuse/bench"
            "#,
        )
        .unwrap();

        assert_eq!(config.base.id, "node-3");
        assert_eq!(config.base.start_ms, Some(1_700_000_000_000));
        assert_eq!(config.base.bench_timeout_ms().unwrap(), 300_000);
        assert_eq!(config.bench.threads, vec![4, 1]);
        assert_eq!(config.bench.num_files, 16);
        assert_eq!(config.bench.operation, IoOperation::Write);
        assert_eq!(config.bench.duration_ms().unwrap(), 45_000);
        assert_eq!(config.bench.local_path, PathBuf::from("/mnt/fuse/bench"));
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = parse_toml_string("[bench]\nnum_files = 2\n").unwrap();
        assert_eq!(config.bench.num_files, 2);
        assert_eq!(config.bench.threads, vec![1]);
        assert_eq!(config.base.start_lead_time, "10s");
    }

    #[test]
    fn test_unknown_operation_is_error() {
        assert!(parse_toml_string("[bench]\noperation = \"list_file\"\n").is_err());
    }

    #[test]
    fn test_parse_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[bench]\nthreads = [2]\nnum_files = 2").unwrap();
        let config = parse_toml_file(file.path()).unwrap();
        assert_eq!(config.bench.threads, vec![2]);
    }
}
