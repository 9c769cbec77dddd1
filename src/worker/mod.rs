//! Worker thread implementation
//!
//! A worker runs one thread's share of a phase: it waits on the start barrier,
//! then walks its files sequentially, stepping an [`OperationExecutor`] until
//! each file is exhausted (or, for reads, until the phase ends).
//!
//! # Lifecycle
//!
//! 1. **Barrier**: sleep until the phase start instant. Arriving after it is an
//!    error; the worker records it and measures nothing.
//! 2. **Warmup**: IO runs exactly as during measurement, but bytes transferred
//!    before the record instant are not counted. A file exhausted during
//!    warmup is simply reopened and read again.
//! 3. **Measurement**: bytes are counted; an exhausted file advances the worker
//!    to its next file.
//! 4. **Completion**: writes finish when every owned file reached its size.
//!    Reads finish at the phase end; running out of files before that is an
//!    error because the measurement window would be cut short.
//!
//! A worker never fails out of [`Worker::run`]. Every failure lands in the
//! error list of the returned [`WorkerResult`], and the executor is closed on
//! every exit path.

pub mod cancel;

use crate::config::data_file_path;
use crate::coordinator::phase::Phase;
use crate::engine::{OperationExecutor, StepOutcome};
use crate::stats::WorkerResult;
use crate::util::time::{millis_until, now_ms};
use crate::Result;
use cancel::CancelToken;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// Files owned by worker `index` of `num_workers`
///
/// Round-robin: worker `i` gets `data-i`, `data-(i+N)`, `data-(i+2N)`, ...
/// The subsets are disjoint and differ in size by at most one file.
pub fn partition_files(
    base_dir: &Path,
    index: usize,
    num_workers: usize,
    num_files: usize,
) -> Vec<PathBuf> {
    if num_workers == 0 {
        return Vec::new();
    }
    (index..num_files)
        .step_by(num_workers)
        .map(|i| data_file_path(base_dir, i))
        .collect()
}

/// One benchmark thread within a phase
pub struct Worker {
    id: usize,
    phase: Phase,
    files: Vec<PathBuf>,
    executor: Box<dyn OperationExecutor>,
    cancel: CancelToken,

    /// Set by the first worker of the run to get through a barrier
    barrier_passed: Arc<AtomicBool>,

    result: WorkerResult,
}

impl Worker {
    pub fn new(
        id: usize,
        phase: Phase,
        files: Vec<PathBuf>,
        executor: Box<dyn OperationExecutor>,
        cancel: CancelToken,
        barrier_passed: Arc<AtomicBool>,
    ) -> Self {
        let mut result = WorkerResult::new(id, phase.record_ms);
        result.files_owned = files.len();
        Self {
            id,
            phase,
            files,
            executor,
            cancel,
            barrier_passed,
            result,
        }
    }

    /// Run the worker to completion and hand back its result
    pub fn run(mut self) -> WorkerResult {
        if let Err(e) = self.run_internal() {
            error!("worker {}: failed: {:#}", self.id, e);
            self.result.add_error_message(format!("{:#}", e));
        }
        self.close_executor();

        self.result.set_end_ms(now_ms());
        self.result
    }

    fn run_internal(&mut self) -> Result<()> {
        debug!(
            "worker {}: {} files, start {} record {} end {}",
            self.id,
            self.files.len(),
            self.phase.start_ms,
            self.phase.record_ms,
            self.phase.end_ms
        );

        let wait_ms = millis_until(self.phase.start_ms);
        if wait_ms < 0 {
            anyhow::bail!(
                "Thread missed barrier. Set the start time to a later time. start: {} current: {}",
                self.phase.start_ms,
                now_ms()
            );
        }
        if self.cancel.sleep(Duration::from_millis(wait_ms as u64)) {
            return Ok(());
        }
        self.barrier_passed.store(true, Ordering::Relaxed);

        let is_read = self.executor.operation().is_read();
        for index in 0..self.files.len() {
            self.executor.start_file();
            let path = &self.files[index];

            loop {
                if self.cancel.is_cancelled() {
                    return Ok(());
                }
                if is_read && now_ms() > self.phase.end_ms {
                    return Ok(());
                }

                let step = self.executor.step(path);
                if let StepOutcome::Fatal(message) = step.outcome {
                    anyhow::bail!(message);
                }

                if now_ms() >= self.phase.record_ms {
                    match step.outcome {
                        StepOutcome::Exhausted => break,
                        _ => self.result.add_io_bytes(step.bytes),
                    }
                }
            }
        }

        if is_read && !self.files.is_empty() {
            anyhow::bail!(
                "Thread {} finishes reading all its files before the bench ends. For more \
                 accurate result, use more files, or larger files, or a shorter duration",
                self.id
            );
        }
        Ok(())
    }

    fn close_executor(&mut self) {
        if let Err(e) = self.executor.close() {
            self.result.add_error_message(format!("{:#}", e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IoOperation;
    use crate::engine::mock::MockExecutor;
    use cancel::CancelSource;

    fn phase_in(lead_ms: u64, warmup_ms: u64, duration_ms: u64) -> Phase {
        Phase::new(now_ms() + lead_ms, warmup_ms, duration_ms)
    }

    fn files(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| data_file_path(Path::new("/bench"), i)).collect()
    }

    fn worker(phase: Phase, files: Vec<PathBuf>, executor: MockExecutor) -> (Worker, Arc<AtomicBool>, CancelSource) {
        let source = CancelSource::new();
        let barrier = Arc::new(AtomicBool::new(false));
        let w = Worker::new(0, phase, files, Box::new(executor), source.token(), barrier.clone());
        (w, barrier, source)
    }

    #[test]
    fn test_partition_round_robin() {
        let base = Path::new("/mnt");
        assert_eq!(
            partition_files(base, 0, 2, 5),
            vec![base.join("data-0"), base.join("data-2"), base.join("data-4")]
        );
        assert_eq!(
            partition_files(base, 1, 2, 5),
            vec![base.join("data-1"), base.join("data-3")]
        );
        assert!(partition_files(base, 3, 4, 2).is_empty());
        assert!(partition_files(base, 0, 0, 2).is_empty());
    }

    #[test]
    fn test_partition_disjoint_and_complete() {
        let base = Path::new("/mnt");
        let mut all: Vec<PathBuf> = (0..3)
            .flat_map(|i| partition_files(base, i, 3, 10))
            .collect();
        assert_eq!(all.len(), 10);
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 10);
    }

    #[test]
    fn test_write_fills_every_file() {
        let executor = MockExecutor::new(IoOperation::Write, 4096, 8192);
        let log = executor.log();
        let (w, barrier, _source) = worker(phase_in(20, 0, 10_000), files(2), executor);

        let result = w.run();
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert_eq!(result.io_bytes, 2 * 8192);
        assert_eq!(result.files_owned, 2);
        assert!(barrier.load(Ordering::Relaxed));

        // Two data steps plus the exhausting step, per file
        let log = log.lock().unwrap();
        assert_eq!(log.steps.len(), 6);
        assert_eq!(log.steps[0], PathBuf::from("/bench/data-0"));
        assert_eq!(log.steps[5], PathBuf::from("/bench/data-1"));
    }

    #[test]
    fn test_write_partial_last_buffer() {
        let executor = MockExecutor::new(IoOperation::Write, 4096, 10_000);
        let (w, _, _source) = worker(phase_in(10, 0, 10_000), files(3), executor);
        let result = w.run();
        assert!(result.errors.is_empty());
        assert_eq!(result.io_bytes, 3 * 10_000);
    }

    #[test]
    fn test_missed_barrier() {
        let executor = MockExecutor::new(IoOperation::Write, 4096, 8192);
        let log = executor.log();
        let phase = Phase::new(now_ms() - 5_000, 0, 10_000);
        let (w, barrier, _source) = worker(phase, files(2), executor);

        let result = w.run();
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("missed barrier"));
        assert_eq!(result.io_bytes, 0);
        assert!(!barrier.load(Ordering::Relaxed));
        assert!(log.lock().unwrap().steps.is_empty());
    }

    #[test]
    fn test_read_runs_until_phase_end() {
        // Enough data that the files outlast the phase
        let executor = MockExecutor::new(IoOperation::Read, 1024, u64::MAX / 4)
            .with_step_delay(Duration::from_millis(1));
        let phase = phase_in(10, 0, 150);
        let (w, _, _source) = worker(phase, files(1), executor);

        let result = w.run();
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert!(result.io_bytes > 0);
        assert!(result.end_ms >= phase.end_ms);
    }

    #[test]
    fn test_read_excludes_warmup_bytes() {
        // 1 KiB per 5 ms: ~200 steps during warmup, ~40 during measurement
        let executor = MockExecutor::new(IoOperation::Read, 1024, u64::MAX / 4)
            .with_step_delay(Duration::from_millis(5));
        let log = executor.log();
        let phase = phase_in(10, 1_000, 200);
        let (w, _, _source) = worker(phase, files(1), executor);

        let result = w.run();
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert_eq!(result.record_start_ms, phase.record_ms);

        let log = log.lock().unwrap();
        let bytes_since = |ms: u64| -> u64 {
            log.transfers
                .iter()
                .filter(|t| t.finished_ms >= ms)
                .map(|t| t.bytes)
                .sum()
        };
        let warmup_bytes: u64 = log
            .transfers
            .iter()
            .filter(|t| t.finished_ms < phase.record_ms)
            .map(|t| t.bytes)
            .sum();
        assert!(warmup_bytes > 0);
        assert!(result.io_bytes > 0);

        // The worker reads the clock just after the executor does, so a step
        // returning in the last millisecond of warmup may still be counted
        let measured = bytes_since(phase.record_ms);
        let upper = bytes_since(phase.record_ms - 1);
        assert!(
            (measured..=upper).contains(&result.io_bytes),
            "counted {} bytes, measured window holds {}..={}",
            result.io_bytes,
            measured,
            upper
        );
        assert!(upper - measured <= 1024);
    }

    #[test]
    fn test_read_rereads_file_exhausted_in_warmup() {
        // A 4 KiB file is exhausted many times over during the warmup
        let executor = MockExecutor::new(IoOperation::Read, 1024, 4096)
            .with_step_delay(Duration::from_millis(1));
        let log = executor.log();
        let phase = phase_in(10, 200, 10_000);
        let (w, _, _source) = worker(phase, files(1), executor);

        let result = w.run();
        // After warmup the file is read once more, then the dataset runs out
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("finishes reading all its files"));
        assert!(result.io_bytes <= 4096);
        assert!(log.lock().unwrap().steps.len() > 10);
    }

    #[test]
    fn test_read_dataset_too_small() {
        let executor = MockExecutor::new(IoOperation::Read, 4096, 8192);
        let (w, _, _source) = worker(phase_in(10, 0, 60_000), files(2), executor);

        let result = w.run();
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("use more files, or larger files, or a shorter duration"));
        assert_eq!(result.io_bytes, 2 * 8192);
    }

    #[test]
    fn test_io_failure_recorded_and_closed() {
        let executor = MockExecutor::new(IoOperation::Write, 1024, 8192).with_failure_on_step(3);
        let log = executor.log();
        let (w, _, _source) = worker(phase_in(10, 0, 10_000), files(1), executor);

        let result = w.run();
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("Mock IO error"));
        assert_eq!(result.io_bytes, 3 * 1024);
        assert_eq!(log.lock().unwrap().closes, 1);
    }

    #[test]
    fn test_close_failure_recorded() {
        let executor = MockExecutor::new(IoOperation::Write, 1024, 8192)
            .with_failure_on_step(1)
            .with_close_failure();
        let (w, _, _source) = worker(phase_in(10, 0, 10_000), files(1), executor);

        let result = w.run();
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[1].contains("Mock close error"));
    }

    #[test]
    fn test_cancel_during_barrier() {
        let executor = MockExecutor::new(IoOperation::Write, 1024, 8192);
        let log = executor.log();
        let (w, barrier, mut source) = worker(phase_in(60_000, 0, 10_000), files(1), executor);

        let handle = std::thread::spawn(move || w.run());
        std::thread::sleep(Duration::from_millis(50));
        source.cancel();

        let result = handle.join().unwrap();
        assert!(result.errors.is_empty());
        assert_eq!(result.io_bytes, 0);
        assert!(!barrier.load(Ordering::Relaxed));
        assert!(log.lock().unwrap().steps.is_empty());
    }

    #[test]
    fn test_cancel_during_measurement() {
        let executor = MockExecutor::new(IoOperation::Read, 1024, u64::MAX / 4)
            .with_step_delay(Duration::from_millis(1));
        let log = executor.log();
        let (w, _, mut source) = worker(phase_in(10, 0, 60_000), files(1), executor);

        let handle = std::thread::spawn(move || w.run());
        std::thread::sleep(Duration::from_millis(200));
        source.cancel();

        let result = handle.join().unwrap();
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert!(result.io_bytes > 0);
        assert_eq!(log.lock().unwrap().closes, 1);
    }

    #[test]
    fn test_idle_worker_is_noop() {
        let executor = MockExecutor::new(IoOperation::Read, 1024, 1024);
        let (w, _, _source) = worker(phase_in(10, 0, 10_000), Vec::new(), executor);

        let result = w.run();
        assert!(result.errors.is_empty());
        assert_eq!(result.io_bytes, 0);
        assert_eq!(result.files_owned, 0);
    }
}
