//! fusebench - read/write throughput benchmark for FUSE-mounted filesystems
//!
//! fusebench measures how fast a mounted filesystem moves bytes when several
//! threads read or write a set of data files at once. A run is a sequence of
//! phases, one per thread count; within a phase all workers start together at
//! a shared barrier instant, so several hosts can be pointed at the same mount
//! and start in lockstep.
//!
//! # Architecture
//!
//! - **Config**: CLI flags and TOML files, validated before any IO happens
//! - **Engine**: one executor per worker that moves one buffer per step
//! - **Worker**: barrier wait, warmup, measurement window, file hand-off
//! - **Coordinator**: fork-join per phase, timeout and cancellation
//! - **Stats**: per-worker bytes and errors, merged per phase
//! - **Profile**: optional time-to-first-byte latencies from a profiling log

pub mod config;
pub mod coordinator;
pub mod engine;
pub mod output;
pub mod profile;
pub mod stats;
pub mod util;
pub mod worker;

pub use config::{Config, IoOperation};
pub use coordinator::BenchDriver;
pub use stats::{PhaseResult, TaskResult, WorkerResult};

/// Result type used throughout fusebench
pub type Result<T> = anyhow::Result<T>;
