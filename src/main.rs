//! fusebench CLI entry point

use anyhow::{Context, Result};
use fusebench::config::cli::Cli;
use fusebench::coordinator::BenchDriver;
use fusebench::output::{json, text};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("fusebench=debug")
        } else {
            EnvFilter::new("fusebench=info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    println!("fusebench v{}", env!("CARGO_PKG_VERSION"));
    println!();

    let config = cli.to_config()?;
    let driver = BenchDriver::new(config).context("Configuration validation failed")?;

    let params = driver.parameters();
    info!(
        "{} benchmark on {} with {} files, thread counts {:?}",
        params.operation,
        params.local_path.display(),
        params.num_files,
        params.threads
    );

    let result = driver.run()?;

    text::print_results(&result);

    if let Some(path) = &cli.json {
        json::write_json_output(path, &result)?;
        if path.as_os_str() != "-" {
            println!("JSON results written to {}", path.display());
        }
    }

    Ok(())
}
