//! Migration coordinator - ties the two phases together
//!
//! The coordinator is responsible for:
//! - Classifying the tree before anything is changed
//! - Building the job queue from the classification
//! - Running the worker pool and aggregating outcomes
//! - Exposing the cancel flag for signal handling
//!
//! Confirmation prompts and console output stay with the caller, between
//! [`MigrateCoordinator::scan`] and [`MigrateCoordinator::apply`].

use crate::changelog::ChangeLog;
use crate::config::MigrateConfig;
use crate::error::Result;
use crate::owner::OwnerBackend;
use crate::walker::aggregate::{ResultAggregator, RunSummary};
use crate::walker::changer::OwnershipChanger;
use crate::walker::classify::{ClassificationResult, PathClassifier};
use crate::walker::pool::WorkerPool;
use crate::walker::queue::JobQueue;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

type ProgressFn<'p> = &'p mut dyn FnMut(&RunSummary);

/// Coordinates classification and the parallel change phase
pub struct MigrateCoordinator<B: OwnerBackend + 'static> {
    config: Arc<MigrateConfig>,
    backend: Arc<B>,
    pool: WorkerPool<Arc<B>>,
}

impl<B: OwnerBackend + 'static> MigrateCoordinator<B> {
    pub fn new(config: MigrateConfig, backend: B) -> Result<Self> {
        let config = Arc::new(config);
        let backend = Arc::new(backend);

        let changer = OwnershipChanger::new(
            Arc::clone(&backend),
            config.old_owner,
            config.new_owner,
            config.dry_run,
        );
        let pool = WorkerPool::new(changer, config.worker_count, config.failure_policy)?;

        Ok(Self {
            config,
            backend,
            pool,
        })
    }

    pub fn config(&self) -> &MigrateConfig {
        &self.config
    }

    /// Get a clone of the cancel flag (for signal handlers)
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.pool.cancel_flag()
    }

    /// Classify the tree under the configured root
    ///
    /// Setting the cancel flag stops the walk at the next directory.
    pub fn scan(&self) -> Result<ClassificationResult> {
        let options = self.config.classify_options();
        let cancel = self.pool.cancel_flag();
        let start = Instant::now();

        info!(
            root = %self.config.root.display(),
            old_owner = %self.config.old_owner,
            "Scanning tree"
        );

        let result = PathClassifier::new(self.backend.as_ref(), &options)
            .with_cancel(&cancel)
            .classify(&self.config.root)?;

        info!(
            files = result.files.len(),
            directories = result.directories.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Scan complete"
        );

        Ok(result)
    }

    /// Change ownership of every classified path
    ///
    /// `change_log` receives one record per outcome; `progress` is called
    /// with the running tally after each one.
    pub fn apply(
        &self,
        classification: &ClassificationResult,
        change_log: Option<&mut dyn ChangeLog>,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<RunSummary> {
        let start = Instant::now();
        let queue = JobQueue::from_classification(classification)?;

        let mut aggregator = ResultAggregator::new(self.config.old_owner, self.config.new_owner);
        if let Some(log) = change_log {
            aggregator = aggregator.with_change_log(log);
        }
        if let Some(f) = progress {
            aggregator = aggregator.with_progress(f);
        }

        self.pool.run(queue, &mut aggregator)?;

        let summary = aggregator.finish(start.elapsed());

        info!(
            changed = summary.changed,
            would_change = summary.would_change,
            skipped = summary.skipped,
            failed = summary.failed,
            abandoned = summary.abandoned,
            busiest_worker_jobs = summary.jobs_per_worker.iter().max().copied().unwrap_or(0),
            duration_secs = summary.duration.as_secs(),
            "Run completed"
        );

        Ok(summary)
    }
}
