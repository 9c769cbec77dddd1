//! Operation executor abstraction
//!
//! An executor performs one buffered IO step against a single file at a time.
//! The worker drives it file by file; the executor owns the open handle and the
//! per-file offset, and tells the worker through a [`StepResult`] whether the
//! step moved bytes, found the file exhausted, or failed.
//!
//! # Step semantics
//!
//! - **Read**: read up to one buffer from the current file. A zero-length read
//!   means the file is exhausted and closes the handle.
//! - **Write**: write `min(remaining, buffer)` bytes of a constant fill byte.
//!   Once the file has reached its configured size the handle is closed and
//!   the step reports exhaustion without writing.
//!
//! # Example
//!
//! ```no_run
//! use fusebench::config::IoOperation;
//! use fusebench::engine::{OperationExecutor, StepOutcome};
//! use fusebench::engine::sync::SyncExecutor;
//! use std::path::Path;
//!
//! let mut executor = SyncExecutor::new(IoOperation::Write, 4096, 8192);
//! executor.start_file();
//! loop {
//!     let step = executor.step(Path::new("/mnt/fuse/data-0"));
//!     if step.outcome != StepOutcome::Ok {
//!         break;
//!     }
//! }
//! executor.close().expect("close failed");
//! ```

use crate::config::IoOperation;
use crate::Result;
use std::path::Path;

pub mod mock;
pub mod sync;

/// Byte written by every write step
pub const FILL_BYTE: u8 = b'A';

/// How a single step ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Bytes were transferred; keep going on this file
    Ok,
    /// Nothing left to read or write in this file
    Exhausted,
    /// The step failed; the worker must stop
    Fatal(String),
}

/// Result of one executor step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub bytes: u64,
    pub outcome: StepOutcome,
}

impl StepResult {
    #[inline]
    pub fn transferred(bytes: u64) -> Self {
        Self {
            bytes,
            outcome: StepOutcome::Ok,
        }
    }

    #[inline]
    pub fn exhausted() -> Self {
        Self {
            bytes: 0,
            outcome: StepOutcome::Exhausted,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            bytes: 0,
            outcome: StepOutcome::Fatal(message.into()),
        }
    }
}

/// Executes buffered sequential IO steps for a worker
///
/// Each worker owns its own executor, so implementations only need `Send`.
pub trait OperationExecutor: Send {
    /// The operation this executor performs
    fn operation(&self) -> IoOperation;

    /// Reset per-file state before moving on to a new file
    fn start_file(&mut self);

    /// Perform one step against `path`, opening it on first use
    fn step(&mut self, path: &Path) -> StepResult;

    /// Close whatever handle is open
    ///
    /// Safe to call repeatedly; closing with nothing open is a no-op.
    fn close(&mut self) -> Result<()>;
}

/// Create the executor for `operation`
pub fn create_executor(
    operation: IoOperation,
    buffer_size: usize,
    file_size: u64,
) -> Box<dyn OperationExecutor> {
    Box::new(sync::SyncExecutor::new(operation, buffer_size, file_size))
}
