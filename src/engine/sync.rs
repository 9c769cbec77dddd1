//! Synchronous file executor
//!
//! Blocking `std::fs` reads and writes through a single reusable buffer. Reads
//! consume the file sequentially from the start; writes create (or truncate)
//! the file and fill it to exactly the configured size.

use super::{OperationExecutor, StepResult, FILL_BYTE};
use crate::config::IoOperation;
use crate::Result;
use anyhow::Context;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;

/// Sequential executor backed by `std::fs::File`
pub struct SyncExecutor {
    operation: IoOperation,

    /// IO buffer, pre-filled with `FILL_BYTE` for writes
    buffer: Vec<u8>,

    /// Target size of written files
    file_size: u64,

    input: Option<File>,
    output: Option<File>,

    /// Bytes written to the current file
    offset: u64,
}

impl SyncExecutor {
    pub fn new(operation: IoOperation, buffer_size: usize, file_size: u64) -> Self {
        Self {
            operation,
            buffer: vec![FILL_BYTE; buffer_size],
            file_size,
            input: None,
            output: None,
            offset: 0,
        }
    }

    fn read_step(&mut self, path: &Path) -> StepResult {
        if self.input.is_none() {
            match File::open(path) {
                Ok(file) => self.input = Some(file),
                Err(e) => {
                    return StepResult::fatal(format!("Failed to open {}: {}", path.display(), e))
                }
            }
        }
        let Some(input) = self.input.as_mut() else {
            return StepResult::exhausted();
        };

        loop {
            match input.read(&mut self.buffer) {
                Ok(0) => {
                    self.input = None;
                    return StepResult::exhausted();
                }
                Ok(n) => return StepResult::transferred(n as u64),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return StepResult::fatal(format!("Failed to read {}: {}", path.display(), e))
                }
            }
        }
    }

    fn write_step(&mut self, path: &Path) -> StepResult {
        if self.output.is_none() {
            let opened = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(path);
            match opened {
                Ok(file) => self.output = Some(file),
                Err(e) => {
                    return StepResult::fatal(format!("Failed to create {}: {}", path.display(), e))
                }
            }
        }

        let remaining = self.file_size.saturating_sub(self.offset);
        let to_write = remaining.min(self.buffer.len() as u64) as usize;
        if to_write == 0 {
            if let Err(e) = self.close_output() {
                return StepResult::fatal(format!("{:#}", e));
            }
            return StepResult::exhausted();
        }

        let Some(output) = self.output.as_mut() else {
            return StepResult::exhausted();
        };
        if let Err(e) = output.write_all(&self.buffer[..to_write]) {
            return StepResult::fatal(format!("Failed to write {}: {}", path.display(), e));
        }
        self.offset += to_write as u64;
        StepResult::transferred(to_write as u64)
    }

    fn close_output(&mut self) -> Result<()> {
        if let Some(mut output) = self.output.take() {
            output.flush().context("Failed to flush output file")?;
        }
        Ok(())
    }
}

impl OperationExecutor for SyncExecutor {
    fn operation(&self) -> IoOperation {
        self.operation
    }

    fn start_file(&mut self) {
        self.offset = 0;
    }

    fn step(&mut self, path: &Path) -> StepResult {
        match self.operation {
            IoOperation::Read => self.read_step(path),
            IoOperation::Write => self.write_step(path),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.input = None;
        self.close_output()
    }
}
