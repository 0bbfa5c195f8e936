//! Worker pool for the mutation phase
//!
//! Each worker:
//! - Pulls jobs from the shared job queue
//! - Applies the conditional ownership change
//! - Sends the outcome to the result channel
//!
//! The calling thread drains the result channel into a
//! [`ResultAggregator`] while the workers run. Workers never stop the
//! process: under fail-fast the first failure sets the shared cancel flag,
//! every worker finishes its current job, and whatever is still queued is
//! discarded and counted as abandoned.

use crate::error::{Result, WorkerError};
use crate::owner::OwnerBackend;
use crate::walker::aggregate::{FailurePolicy, JobOutcome, ResultAggregator};
use crate::walker::changer::OwnershipChanger;
use crate::walker::queue::{JobQueue, JobReceiver};
use crossbeam_channel::{bounded, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, trace, warn};

/// Maximum reasonable worker count
pub const MAX_WORKERS: usize = 512;

/// Statistics collected by a worker
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Jobs this worker applied
    pub jobs: AtomicU64,

    /// Jobs that ended in failure
    pub failures: AtomicU64,
}

impl WorkerStats {
    pub fn jobs(&self) -> u64 {
        self.jobs.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    fn record_job(&self, failed: bool) {
        self.jobs.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// A worker thread that applies ownership changes
struct Worker {
    id: usize,
    handle: Option<JoinHandle<()>>,
    stats: Arc<WorkerStats>,
}

impl Worker {
    fn spawn<B: OwnerBackend + 'static>(
        id: usize,
        changer: Arc<OwnershipChanger<B>>,
        jobs: JobReceiver,
        results: Sender<JobOutcome>,
        cancel: Arc<AtomicBool>,
        policy: FailurePolicy,
    ) -> std::result::Result<Self, WorkerError> {
        let stats = Arc::new(WorkerStats::default());
        let stats_clone = Arc::clone(&stats);

        let handle = thread::Builder::new()
            .name(format!("chown-{}", id))
            .spawn(move || worker_loop(id, changer, jobs, results, cancel, policy, stats_clone))
            .map_err(|e| WorkerError::InitFailed {
                id,
                reason: e.to_string(),
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
            stats,
        })
    }

    /// Wait for the thread and return what it did
    fn join(mut self) -> std::result::Result<Arc<WorkerStats>, WorkerError> {
        if let Some(handle) = self.handle.take() {
            handle.join().map_err(|_| WorkerError::Panicked {
                id: self.id,
                message: "Worker thread panicked".into(),
            })?;
        }
        Ok(self.stats)
    }
}

/// Main worker loop
fn worker_loop<B: OwnerBackend>(
    id: usize,
    changer: Arc<OwnershipChanger<B>>,
    jobs: JobReceiver,
    results: Sender<JobOutcome>,
    cancel: Arc<AtomicBool>,
    policy: FailurePolicy,
    stats: Arc<WorkerStats>,
) {
    trace!(worker = id, "Worker starting");

    while !cancel.load(Ordering::SeqCst) {
        let Some(job) = jobs.recv() else {
            break;
        };

        let outcome = changer.apply(&job.path);
        let failed = outcome.is_failure();
        stats.record_job(failed);

        if failed && policy == FailurePolicy::FailFast {
            cancel.store(true, Ordering::SeqCst);
        }

        if results
            .send(JobOutcome {
                job,
                outcome,
                worker: id,
            })
            .is_err()
        {
            warn!(worker = id, "Result channel closed");
            break;
        }
    }

    trace!(worker = id, "Worker exiting");
}

/// Fixed-size pool applying ownership changes in parallel
pub struct WorkerPool<B: OwnerBackend> {
    changer: Arc<OwnershipChanger<B>>,
    worker_count: usize,
    policy: FailurePolicy,
    cancel: Arc<AtomicBool>,
}

impl<B: OwnerBackend + 'static> WorkerPool<B> {
    pub fn new(
        changer: OwnershipChanger<B>,
        worker_count: usize,
        policy: FailurePolicy,
    ) -> std::result::Result<Self, crate::error::ConfigError> {
        if worker_count == 0 || worker_count > MAX_WORKERS {
            return Err(crate::error::ConfigError::InvalidWorkerCount {
                count: worker_count,
                max: MAX_WORKERS,
            });
        }

        Ok(Self {
            changer: Arc::new(changer),
            worker_count,
            policy,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Get a clone of the cancel flag (for signal handlers)
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Drain `queue` with the pool's workers, feeding every outcome to
    /// `aggregator`
    ///
    /// Returns once all workers have exited. Jobs left in the queue after a
    /// cancellation are discarded and counted as abandoned.
    pub fn run(&self, queue: JobQueue, aggregator: &mut ResultAggregator<'_>) -> Result<()> {
        let total = queue.len();
        aggregator.set_total(total as u64);

        // Sized by the job count captured before any worker starts, so a
        // worker never blocks on a full result channel.
        let (result_tx, result_rx) = bounded::<JobOutcome>(total.max(1));

        info!(
            jobs = total,
            workers = self.worker_count,
            policy = self.policy.as_str(),
            dry_run = self.changer.is_dry_run(),
            "Starting ownership changes"
        );

        let mut workers = Vec::with_capacity(self.worker_count);
        let mut spawn_error = None;
        for id in 0..self.worker_count {
            match Worker::spawn(
                id,
                Arc::clone(&self.changer),
                queue.receiver(),
                result_tx.clone(),
                Arc::clone(&self.cancel),
                self.policy,
            ) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    self.cancel.store(true, Ordering::SeqCst);
                    spawn_error = Some(e);
                    break;
                }
            }
        }

        // Only workers hold senders now; the loop below ends when the last exits
        drop(result_tx);

        for outcome in result_rx.iter() {
            aggregator.record(&outcome);
        }

        let mut join_error = None;
        let mut jobs_per_worker = vec![0; self.worker_count];
        for worker in workers {
            let id = worker.id;
            match worker.join() {
                Ok(stats) => {
                    debug!(
                        worker = id,
                        jobs = stats.jobs(),
                        failures = stats.failures(),
                        "Worker finished"
                    );
                    jobs_per_worker[id] = stats.jobs();
                }
                Err(e) => {
                    warn!(error = %e, "Worker failed to join cleanly");
                    self.cancel.store(true, Ordering::SeqCst);
                    join_error.get_or_insert(e);
                }
            }
        }
        aggregator.set_worker_jobs(jobs_per_worker);

        let abandoned = queue.discard_remaining();
        if abandoned > 0 {
            info!(abandoned, "Discarded queued jobs after cancellation");
            aggregator.record_abandoned(abandoned);
        }

        let queue_stats = queue.stats();
        debug!(
            enqueued = queue_stats.enqueued(),
            dequeued = queue_stats.dequeued(),
            discarded = queue_stats.discarded(),
            "Job queue drained"
        );

        if self.cancel.load(Ordering::SeqCst) && aggregator.summary().failed == 0 {
            aggregator.mark_interrupted();
        }

        if let Some(e) = spawn_error.or(join_error) {
            return Err(e.into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::owner::Owner;
    use crate::testing::OverlayBackend;
    use crate::walker::classify::ClassificationResult;
    use std::path::{Path, PathBuf};
    use std::time::Duration;
    use tempfile::tempdir;

    const ROOT: Owner = Owner::from_raw(0);
    const USER: Owner = Owner::from_raw(1000);

    fn make_files(dir: &Path, n: usize) -> Vec<PathBuf> {
        (0..n)
            .map(|i| {
                let p = dir.join(format!("f{:03}", i));
                std::fs::write(&p, b"").unwrap();
                p
            })
            .collect()
    }

    fn queue_for(files: &[PathBuf]) -> JobQueue {
        JobQueue::from_classification(&ClassificationResult {
            files: files.to_vec(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_rejects_zero_workers() {
        let changer = OwnershipChanger::new(OverlayBackend::new(ROOT), ROOT, USER, false);
        assert!(WorkerPool::new(changer, 0, FailurePolicy::FailFast).is_err());
    }

    #[test]
    fn test_all_jobs_processed() {
        let dir = tempdir().unwrap();
        let files = make_files(dir.path(), 20);
        let backend = Arc::new(OverlayBackend::new(ROOT));
        backend.set(files[3].clone(), Owner::from_raw(5));

        let changer = OwnershipChanger::new(Arc::clone(&backend), ROOT, USER, false);
        let pool = WorkerPool::new(changer, 4, FailurePolicy::FailFast).unwrap();
        let mut agg = ResultAggregator::new(ROOT, USER);
        pool.run(queue_for(&files), &mut agg).unwrap();
        let summary = agg.finish(Duration::ZERO);

        assert_eq!(summary.total, 20);
        assert_eq!(summary.changed, 19);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.abandoned, 0);
        assert!(summary.is_success());
        assert_eq!(backend.owner_of(&files[3]), Owner::from_raw(5));
        assert_eq!(backend.owner_of(&files[0]), USER);
        assert_eq!(summary.jobs_per_worker.len(), 4);
        assert_eq!(summary.jobs_per_worker.iter().sum::<u64>(), 20);
    }

    #[test]
    fn test_more_workers_than_jobs() {
        let dir = tempdir().unwrap();
        let files = make_files(dir.path(), 2);
        let changer = OwnershipChanger::new(OverlayBackend::new(ROOT), ROOT, USER, false);
        let pool = WorkerPool::new(changer, 16, FailurePolicy::FailFast).unwrap();

        let mut agg = ResultAggregator::new(ROOT, USER);
        pool.run(queue_for(&files), &mut agg).unwrap();
        assert_eq!(agg.finish(Duration::ZERO).changed, 2);
    }

    #[test]
    fn test_empty_queue() {
        let changer = OwnershipChanger::new(OverlayBackend::new(ROOT), ROOT, USER, false);
        let pool = WorkerPool::new(changer, 4, FailurePolicy::FailFast).unwrap();

        let mut agg = ResultAggregator::new(ROOT, USER);
        pool.run(queue_for(&[]), &mut agg).unwrap();
        let summary = agg.finish(Duration::ZERO);
        assert_eq!(summary.processed(), 0);
        assert!(summary.is_success());
    }

    #[test]
    fn test_fail_fast_abandons_remaining() {
        let dir = tempdir().unwrap();
        let files = make_files(dir.path(), 10);
        let backend = Arc::new(OverlayBackend::new(ROOT));
        backend.fail_chown(files[2].clone());

        let changer = OwnershipChanger::new(Arc::clone(&backend), ROOT, USER, false);
        let pool = WorkerPool::new(changer, 1, FailurePolicy::FailFast).unwrap();
        let mut agg = ResultAggregator::new(ROOT, USER);
        pool.run(queue_for(&files), &mut agg).unwrap();
        let summary = agg.finish(Duration::ZERO);

        assert_eq!(summary.changed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.abandoned, 7);
        assert!(!summary.interrupted);
        assert_eq!(summary.first_error().unwrap().path(), files[2].as_path());
        assert_eq!(backend.attempts(), files[..3].to_vec());
        assert_eq!(summary.jobs_per_worker, vec![3]);
    }

    #[test]
    fn test_fail_soft_runs_everything() {
        let dir = tempdir().unwrap();
        let files = make_files(dir.path(), 10);
        let backend = Arc::new(OverlayBackend::new(ROOT));
        backend.fail_chown(files[2].clone());
        backend.fail_chown(files[7].clone());

        let changer = OwnershipChanger::new(Arc::clone(&backend), ROOT, USER, false);
        let pool = WorkerPool::new(changer, 3, FailurePolicy::FailSoft).unwrap();
        let mut agg = ResultAggregator::new(ROOT, USER);
        pool.run(queue_for(&files), &mut agg).unwrap();
        let summary = agg.finish(Duration::ZERO);

        assert_eq!(summary.changed, 8);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.abandoned, 0);
        assert!(!summary.is_success());
    }

    #[test]
    fn test_external_cancel_marks_interrupted() {
        let dir = tempdir().unwrap();
        let files = make_files(dir.path(), 5);
        let changer = OwnershipChanger::new(OverlayBackend::new(ROOT), ROOT, USER, false);
        let pool = WorkerPool::new(changer, 2, FailurePolicy::FailFast).unwrap();
        pool.cancel_flag().store(true, Ordering::SeqCst);

        let mut agg = ResultAggregator::new(ROOT, USER);
        pool.run(queue_for(&files), &mut agg).unwrap();
        let summary = agg.finish(Duration::ZERO);

        assert!(summary.interrupted);
        assert_eq!(summary.abandoned, 5);
        assert_eq!(summary.jobs_per_worker, vec![0, 0]);
        assert!(!summary.is_success());
    }

    #[test]
    fn test_tally_independent_of_worker_count() {
        let dir = tempdir().unwrap();
        let files = make_files(dir.path(), 40);

        for n in [1, 2, 7, 16, 64] {
            let backend = Arc::new(OverlayBackend::new(ROOT));
            for f in files.iter().step_by(3) {
                backend.set(f.clone(), Owner::from_raw(42));
            }

            let changer = OwnershipChanger::new(Arc::clone(&backend), ROOT, USER, false);
            let pool = WorkerPool::new(changer, n, FailurePolicy::FailSoft).unwrap();
            let mut agg = ResultAggregator::new(ROOT, USER);
            pool.run(queue_for(&files), &mut agg).unwrap();
            let summary = agg.finish(Duration::ZERO);

            assert_eq!((summary.changed, summary.skipped, summary.failed), (26, 14, 0), "workers = {}", n);
        }
    }
}
