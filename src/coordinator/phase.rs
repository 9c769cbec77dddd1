//! Phase coordination
//!
//! A phase is one fork-join run of the benchmark at a single thread count:
//! compute a common start instant, launch exactly N workers, and merge their
//! results as they arrive over a channel.
//!
//! # Start instant
//!
//! An externally supplied start instant is honoured only until some worker has
//! passed a barrier. Every later phase (and every phase without a supplied
//! instant) starts a fixed lead time from now, which leaves room for all
//! workers to reach the barrier before it expires.
//!
//! # Timeout
//!
//! The whole phase is bounded by the bench timeout. When it expires, all
//! workers are cancelled and given a grace period to report; whatever arrived
//! is merged and returned. Workers that never reported are listed as errors.

use crate::config::{BaseParameters, BenchParameters, IoOperation};
use crate::engine::{create_executor, OperationExecutor};
use crate::stats::{PhaseResult, WorkerResult};
use crate::util::time::now_ms;
use crate::worker::cancel::CancelSource;
use crate::worker::{partition_files, Worker};
use crate::Result;
use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Builds the executor for a given worker index
pub type ExecutorFactory = Arc<dyn Fn(usize) -> Box<dyn OperationExecutor> + Send + Sync>;

/// Wrap a closure as an [`ExecutorFactory`]
pub fn executor_factory<F>(f: F) -> ExecutorFactory
where
    F: Fn(usize) -> Box<dyn OperationExecutor> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Time boundaries of one phase, in epoch milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    /// Barrier instant
    pub start_ms: u64,
    /// End of warmup, start of measurement
    pub record_ms: u64,
    pub end_ms: u64,
}

impl Phase {
    pub fn new(start_ms: u64, warmup_ms: u64, duration_ms: u64) -> Self {
        Self {
            start_ms,
            record_ms: start_ms.saturating_add(warmup_ms),
            end_ms: start_ms.saturating_add(warmup_ms).saturating_add(duration_ms),
        }
    }
}

/// Resolved, numeric settings shared by every phase of a run
#[derive(Debug, Clone)]
pub struct PhaseSettings {
    pub operation: IoOperation,
    pub local_path: PathBuf,
    pub num_files: usize,
    pub file_size: u64,
    pub buffer_size: usize,
    pub warmup_ms: u64,
    pub duration_ms: u64,
    /// Caller-supplied barrier instant for the first phase
    pub start_ms: Option<u64>,
    pub start_lead_time: Duration,
    pub timeout: Duration,
    pub grace_period: Duration,
}

impl PhaseSettings {
    pub fn from_parameters(base: &BaseParameters, params: &BenchParameters) -> Result<Self> {
        Ok(Self {
            operation: params.operation,
            local_path: params.local_path.clone(),
            num_files: params.num_files,
            file_size: params.file_size_bytes()?,
            buffer_size: params.buffer_size_bytes()?,
            warmup_ms: params.warmup_ms()?,
            duration_ms: params.duration_ms()?,
            start_ms: base.start_ms,
            start_lead_time: Duration::from_millis(base.start_lead_time_ms()?),
            timeout: Duration::from_millis(base.bench_timeout_ms()?),
            grace_period: Duration::from_millis(base.grace_period_ms()?),
        })
    }
}

/// Runs phases one at a time, sharing the barrier-passed flag across them
pub struct PhaseCoordinator {
    settings: PhaseSettings,
    barrier_passed: Arc<AtomicBool>,
    executor_factory: ExecutorFactory,
}

impl PhaseCoordinator {
    pub fn new(settings: PhaseSettings, barrier_passed: Arc<AtomicBool>) -> Self {
        let (operation, buffer_size, file_size) =
            (settings.operation, settings.buffer_size, settings.file_size);
        Self {
            settings,
            barrier_passed,
            executor_factory: executor_factory(move |_| {
                create_executor(operation, buffer_size, file_size)
            }),
        }
    }

    /// Replace the executor used by workers
    pub fn with_executor_factory(mut self, factory: ExecutorFactory) -> Self {
        self.executor_factory = factory;
        self
    }

    /// Barrier instant for the next phase
    pub fn compute_start_ms(&self) -> u64 {
        match self.settings.start_ms {
            Some(start_ms) if !self.barrier_passed.load(Ordering::Relaxed) => start_ms,
            _ => now_ms().saturating_add(self.settings.start_lead_time.as_millis() as u64),
        }
    }

    /// Run one phase with `num_threads` workers and merge their results
    pub fn run(&self, num_threads: usize) -> PhaseResult {
        info!("Running benchmark for thread count: {}", num_threads);
        let phase = Phase::new(
            self.compute_start_ms(),
            self.settings.warmup_ms,
            self.settings.duration_ms,
        );

        let (tx, rx) = unbounded::<WorkerResult>();
        let mut cancel = CancelSource::new();
        let mut handles: Vec<(usize, JoinHandle<()>)> = Vec::with_capacity(num_threads);
        let mut launch_errors = Vec::new();

        for i in 0..num_threads {
            let files = partition_files(
                &self.settings.local_path,
                i,
                num_threads,
                self.settings.num_files,
            );
            let worker = Worker::new(
                i,
                phase,
                files,
                (self.executor_factory)(i),
                cancel.token(),
                self.barrier_passed.clone(),
            );
            let tx = tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("bench-thread-{}", i))
                .spawn(move || {
                    let _ = tx.send(worker.run());
                });
            match spawned {
                Ok(handle) => handles.push((i, handle)),
                Err(e) => launch_errors.push(format!("Failed to start worker {}: {}", i, e)),
            }
        }
        drop(tx);

        let mut merger = PhaseMerger::new(num_threads);
        let deadline = Instant::now().checked_add(self.settings.timeout);
        let mut all_done = merger.collect_until(&rx, deadline);
        if !all_done {
            warn!(
                "thread count {}: bench timeout of {:?} expired, cancelling workers",
                num_threads, self.settings.timeout
            );
            if now_ms() < phase.start_ms {
                let idle: Vec<usize> = (0..num_threads)
                    .filter(|i| !merger.reported().contains(i))
                    .collect();
                warn!(
                    "thread count {}: timeout fired before the start barrier at {}, \
                     workers {:?} are cancelled without measuring",
                    num_threads,
                    phase.start_ms,
                    idle
                );
            }
            cancel.cancel();
            let grace_deadline = Instant::now().checked_add(self.settings.grace_period);
            all_done = merger.collect_until(&rx, grace_deadline);
        }

        let reported = merger.reported().to_vec();
        let mut result = merger.finish();
        result.errors.extend(launch_errors);
        for (i, handle) in handles {
            if !all_done && !handle.is_finished() {
                // Still stuck in a blocking call; leave the thread behind
                if !reported.contains(&i) {
                    result.add_error_message(format!(
                        "Worker {} did not finish within the grace period",
                        i
                    ));
                }
                continue;
            }
            if let Err(panic) = handle.join() {
                let message = panic_message(panic.as_ref());
                error!("worker {}: panicked: {}", i, message);
                result.add_error_message(format!("Worker {} panicked: {}", i, message));
            }
        }

        info!(
            "thread count: {}, errors: {}, IO throughput (MB/s): {:.3}",
            num_threads,
            result.errors.len(),
            result.io_mbps()
        );
        result
    }
}

/// Sequential merge of worker results in arrival order
struct PhaseMerger {
    num_threads: usize,
    result: Option<PhaseResult>,
    reported: Vec<usize>,
}

impl PhaseMerger {
    fn new(num_threads: usize) -> Self {
        Self {
            num_threads,
            result: None,
            reported: Vec::with_capacity(num_threads),
        }
    }

    /// Merge arrivals until every sender is gone (`true`) or `deadline` passes
    ///
    /// A deadline too far out to represent means no deadline.
    fn collect_until(&mut self, rx: &Receiver<WorkerResult>, deadline: Option<Instant>) -> bool {
        let Some(deadline) = deadline else {
            for worker in rx.iter() {
                self.merge(worker);
            }
            return true;
        };
        loop {
            match rx.recv_deadline(deadline) {
                Ok(worker) => self.merge(worker),
                Err(RecvTimeoutError::Disconnected) => return true,
                Err(RecvTimeoutError::Timeout) => return false,
            }
        }
    }

    fn merge(&mut self, worker: WorkerResult) {
        self.reported.push(worker.worker_id);
        match self.result.as_mut() {
            None => self.result = Some(PhaseResult::from_worker(self.num_threads, worker)),
            Some(result) => {
                if let Err(e) = result.merge(&worker) {
                    result.add_error_message(format!("{:#}", e));
                }
            }
        }
    }

    /// Worker ids in arrival order
    fn reported(&self) -> &[usize] {
        &self.reported
    }

    fn finish(self) -> PhaseResult {
        let num_threads = self.num_threads;
        self.result.unwrap_or_else(|| PhaseResult::empty(num_threads))
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::MockExecutor;
    use crate::engine::{StepResult, OperationExecutor};
    use std::path::Path;

    fn settings(operation: IoOperation, num_files: usize, dir: &Path) -> PhaseSettings {
        PhaseSettings {
            operation,
            local_path: dir.to_path_buf(),
            num_files,
            file_size: 8192,
            buffer_size: 4096,
            warmup_ms: 0,
            duration_ms: 200,
            start_ms: None,
            start_lead_time: Duration::from_millis(100),
            timeout: Duration::from_secs(30),
            grace_period: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_phase_boundaries() {
        let phase = Phase::new(10_000, 2_000, 5_000);
        assert_eq!(phase.start_ms, 10_000);
        assert_eq!(phase.record_ms, 12_000);
        assert_eq!(phase.end_ms, 17_000);
    }

    #[test]
    fn test_settings_from_parameters() {
        let base = BaseParameters {
            grace_period: "2s".to_string(),
            start_lead_time: "250ms".to_string(),
            ..Default::default()
        };
        let s = PhaseSettings::from_parameters(&base, &BenchParameters::default()).unwrap();
        assert_eq!(s.grace_period, Duration::from_secs(2));
        assert_eq!(s.start_lead_time, Duration::from_millis(250));
        assert_eq!(s.timeout, Duration::from_secs(20 * 60));
        assert_eq!(s.file_size, 100 * 1024);
    }

    #[test]
    fn test_phase_boundaries_saturate() {
        let huge = 110_000_000_000 * 86_400_000;
        let phase = Phase::new(now_ms(), huge, huge);
        assert_eq!(phase.record_ms, u64::MAX);
        assert_eq!(phase.end_ms, u64::MAX);
    }

    #[test]
    fn test_supplied_start_used_until_barrier_passed() {
        let dir = Path::new("/unused");
        let mut s = settings(IoOperation::Write, 1, dir);
        let future = now_ms() + 3_600_000;
        s.start_ms = Some(future);
        let barrier = Arc::new(AtomicBool::new(false));
        let coordinator = PhaseCoordinator::new(s, barrier.clone());

        assert_eq!(coordinator.compute_start_ms(), future);

        barrier.store(true, Ordering::Relaxed);
        let recomputed = coordinator.compute_start_ms();
        assert_ne!(recomputed, future);
        assert!(recomputed >= now_ms() + 50);
        assert!(recomputed <= now_ms() + 100);
    }

    #[test]
    fn test_start_without_supplied_instant_uses_lead_time() {
        let s = settings(IoOperation::Write, 1, Path::new("/unused"));
        let coordinator = PhaseCoordinator::new(s, Arc::new(AtomicBool::new(false)));
        let before = now_ms();
        let start = coordinator.compute_start_ms();
        assert!(start >= before + 100);
        assert!(start <= now_ms() + 100);
    }

    #[test]
    fn test_write_phase_on_disk() {
        // 4 files, 2 threads, 8 KiB files in 4 KiB steps
        let dir = tempfile::TempDir::new().unwrap();
        let barrier = Arc::new(AtomicBool::new(false));
        let coordinator = PhaseCoordinator::new(settings(IoOperation::Write, 4, dir.path()), barrier.clone());

        let result = coordinator.run(2);
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert_eq!(result.num_threads, 2);
        assert_eq!(result.workers_reported, 2);
        assert_eq!(result.io_bytes, 32768);
        assert!(barrier.load(Ordering::Relaxed));
        for i in 0..4 {
            let len = std::fs::metadata(dir.path().join(format!("data-{}", i))).unwrap().len();
            assert_eq!(len, 8192);
        }
    }

    #[test]
    fn test_read_phase_on_disk_reports_undersized_dataset() {
        let dir = tempfile::TempDir::new().unwrap();
        for i in 0..2 {
            std::fs::write(dir.path().join(format!("data-{}", i)), vec![1u8; 8192]).unwrap();
        }
        let mut s = settings(IoOperation::Read, 2, dir.path());
        s.duration_ms = 60_000;
        let coordinator = PhaseCoordinator::new(s, Arc::new(AtomicBool::new(false)));

        let result = coordinator.run(2);
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors.iter().all(|e| e.contains("finishes reading all its files")));
        assert_eq!(result.io_bytes, 2 * 8192);
    }

    #[test]
    fn test_missed_supplied_start_reported_per_worker() {
        let mut s = settings(IoOperation::Write, 2, Path::new("/unused"));
        s.start_ms = Some(now_ms() - 1_000);
        let factory = executor_factory(|_| Box::new(MockExecutor::new(IoOperation::Write, 4096, 8192)));
        let coordinator = PhaseCoordinator::new(s, Arc::new(AtomicBool::new(false)))
            .with_executor_factory(factory);

        let result = coordinator.run(2);
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors.iter().all(|e| e.contains("missed barrier")));
        assert_eq!(result.io_bytes, 0);
    }

    #[test]
    fn test_later_phase_recomputes_stale_start() {
        let mut s = settings(IoOperation::Write, 2, Path::new("/unused"));
        s.start_ms = Some(now_ms() + 100);
        let factory = executor_factory(|_| Box::new(MockExecutor::new(IoOperation::Write, 4096, 8192)));
        let coordinator = PhaseCoordinator::new(s, Arc::new(AtomicBool::new(false)))
            .with_executor_factory(factory);

        let first = coordinator.run(1);
        assert!(first.errors.is_empty(), "{:?}", first.errors);
        // The supplied instant is now in the past; reusing it would miss the barrier
        let second = coordinator.run(2);
        assert!(second.errors.is_empty(), "{:?}", second.errors);
        assert_eq!(second.io_bytes, 2 * 8192);
    }

    #[test]
    fn test_timeout_cancels_and_keeps_partial_results() {
        let mut s = settings(IoOperation::Read, 2, Path::new("/unused"));
        s.duration_ms = 60_000;
        s.timeout = Duration::from_millis(400);
        let factory = executor_factory(|_| {
            Box::new(
                MockExecutor::new(IoOperation::Read, 1024, u64::MAX / 4)
                    .with_step_delay(Duration::from_millis(1)),
            )
        });
        let coordinator = PhaseCoordinator::new(s, Arc::new(AtomicBool::new(false)))
            .with_executor_factory(factory);

        let start = Instant::now();
        let result = coordinator.run(2);
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert_eq!(result.workers_reported, 2);
        assert!(result.io_bytes > 0);
    }

    #[test]
    fn test_timeout_before_barrier_cancels_waiting_workers() {
        let mut s = settings(IoOperation::Read, 2, Path::new("/unused"));
        s.start_lead_time = Duration::from_secs(10);
        s.timeout = Duration::from_millis(200);
        let factory = executor_factory(|_| Box::new(MockExecutor::new(IoOperation::Read, 1024, 4096)));
        let barrier = Arc::new(AtomicBool::new(false));
        let coordinator = PhaseCoordinator::new(s, barrier.clone()).with_executor_factory(factory);

        let start = Instant::now();
        let result = coordinator.run(2);
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(result.workers_reported, 2);
        assert_eq!(result.io_bytes, 0);
        assert!(!barrier.load(Ordering::Relaxed));
    }

    struct PanickingExecutor;

    impl OperationExecutor for PanickingExecutor {
        fn operation(&self) -> IoOperation {
            IoOperation::Write
        }
        fn start_file(&mut self) {}
        fn step(&mut self, _path: &Path) -> StepResult {
            panic!("executor exploded");
        }
        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_worker_panic_recorded() {
        let s = settings(IoOperation::Write, 2, Path::new("/unused"));
        let factory = executor_factory(|i| {
            if i == 0 {
                Box::new(PanickingExecutor)
            } else {
                Box::new(MockExecutor::new(IoOperation::Write, 4096, 8192))
            }
        });
        let coordinator = PhaseCoordinator::new(s, Arc::new(AtomicBool::new(false)))
            .with_executor_factory(factory);

        let result = coordinator.run(2);
        assert_eq!(result.workers_reported, 1);
        assert_eq!(result.io_bytes, 8192);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("Worker 0 panicked: executor exploded"));
    }

    #[test]
    fn test_merge_failure_degrades_to_error() {
        let mut merger = PhaseMerger::new(2);
        let mut big = WorkerResult::new(0, 0);
        big.add_io_bytes(u64::MAX);
        let mut small = WorkerResult::new(1, 0);
        small.add_io_bytes(1);

        merger.merge(big);
        merger.merge(small);
        assert_eq!(merger.reported(), &[0, 1]);
        let result = merger.finish();
        assert_eq!(result.io_bytes, u64::MAX);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("overflow"));
    }

    #[test]
    fn test_empty_merge() {
        let result = PhaseMerger::new(3).finish();
        assert_eq!(result.num_threads, 3);
        assert_eq!(result.workers_reported, 0);
        assert_eq!(result.io_bytes, 0);
    }
}
