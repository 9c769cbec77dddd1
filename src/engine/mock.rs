//! Mock executor for testing
//!
//! Simulates files of a fixed size without touching the filesystem, so worker
//! and phase tests are fast and deterministic.
//!
//! # Features
//!
//! - Configurable per-file size and step size
//! - Optional per-step delay to stretch a file across wall-clock time
//! - Failure injection on a chosen step or on close
//! - Shared log of visited paths and close calls for verification
//!
//! # Example
//!
//! ```
//! use fusebench::config::IoOperation;
//! use fusebench::engine::{OperationExecutor, StepOutcome};
//! use fusebench::engine::mock::MockExecutor;
//! use std::path::Path;
//!
//! let mut executor = MockExecutor::new(IoOperation::Read, 4096, 8192);
//! executor.start_file();
//! assert_eq!(executor.step(Path::new("data-0")).bytes, 4096);
//! assert_eq!(executor.step(Path::new("data-0")).bytes, 4096);
//! assert_eq!(executor.step(Path::new("data-0")).outcome, StepOutcome::Exhausted);
//! ```

use super::{OperationExecutor, StepResult};
use crate::config::IoOperation;
use crate::util::time::now_ms;
use crate::Result;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared record of what a mock executor was asked to do
#[derive(Debug, Default)]
pub struct MockLog {
    /// Every path passed to `step`, in order
    pub steps: Vec<PathBuf>,
    /// Every step that moved bytes, in order
    pub transfers: Vec<MockTransfer>,
    /// Number of `close` calls that found an open file
    pub closes: usize,
}

/// One data-moving step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockTransfer {
    pub bytes: u64,
    /// Wall clock when the step returned (epoch ms)
    pub finished_ms: u64,
}

/// Mock executor for testing
pub struct MockExecutor {
    operation: IoOperation,
    step_size: u64,
    file_size: u64,
    offset: u64,
    open: bool,
    step_delay: Option<Duration>,
    fail_on_step: Option<usize>,
    fail_on_close: bool,
    steps_taken: usize,
    log: Arc<Mutex<MockLog>>,
}

impl MockExecutor {
    /// Files of `file_size` bytes transferred `step_size` bytes at a time
    pub fn new(operation: IoOperation, step_size: u64, file_size: u64) -> Self {
        Self {
            operation,
            step_size,
            file_size,
            offset: 0,
            open: false,
            step_delay: None,
            fail_on_step: None,
            fail_on_close: false,
            steps_taken: 0,
            log: Arc::new(Mutex::new(MockLog::default())),
        }
    }

    /// Sleep this long inside every step
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = Some(delay);
        self
    }

    /// Fail the n-th step (0-based) with a fatal outcome
    pub fn with_failure_on_step(mut self, step: usize) -> Self {
        self.fail_on_step = Some(step);
        self
    }

    /// Report an error when an open file is closed
    pub fn with_close_failure(mut self) -> Self {
        self.fail_on_close = true;
        self
    }

    /// Handle to the shared log, valid after the executor is moved away
    pub fn log(&self) -> Arc<Mutex<MockLog>> {
        self.log.clone()
    }

    fn record_step(&self, path: &Path) {
        if let Ok(mut log) = self.log.lock() {
            log.steps.push(path.to_path_buf());
        }
    }
}

impl OperationExecutor for MockExecutor {
    fn operation(&self) -> IoOperation {
        self.operation
    }

    fn start_file(&mut self) {
        self.offset = 0;
    }

    fn step(&mut self, path: &Path) -> StepResult {
        self.record_step(path);
        let step_index = self.steps_taken;
        self.steps_taken += 1;

        if let Some(delay) = self.step_delay {
            std::thread::sleep(delay);
        }
        if self.fail_on_step == Some(step_index) {
            return StepResult::fatal(format!("Mock IO error on {}", path.display()));
        }

        self.open = true;
        let n = self.step_size.min(self.file_size - self.offset);
        if n == 0 {
            // Like a closed input stream, the next read reopens from the start
            self.open = false;
            if self.operation.is_read() {
                self.offset = 0;
            }
            return StepResult::exhausted();
        }
        self.offset += n;
        if let Ok(mut log) = self.log.lock() {
            log.transfers.push(MockTransfer {
                bytes: n,
                finished_ms: now_ms(),
            });
        }
        StepResult::transferred(n)
    }

    fn close(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        if let Ok(mut log) = self.log.lock() {
            log.closes += 1;
        }
        if self.fail_on_close {
            anyhow::bail!("Mock close error");
        }
        Ok(())
    }
}
