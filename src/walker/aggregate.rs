//! Outcome aggregation
//!
//! The aggregator is the single consumer of worker outcomes. All tallies,
//! the change log and progress callbacks are driven from it, so none of
//! them need locking.

use crate::changelog::{ChangeLog, ChangeRecord};
use crate::error::ChangeError;
use crate::owner::Owner;
use crate::walker::changer::ChangeOutcome;
use crate::walker::queue::Job;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of one job, as emitted by a worker
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job: Job,
    pub outcome: ChangeOutcome,
    pub worker: usize,
}

/// What to do when a change fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop at the first failure and discard queued jobs
    #[default]
    FailFast,

    /// Run every job and report failures at the end
    FailSoft,
}

impl FailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::FailFast => "fail-fast",
            FailurePolicy::FailSoft => "fail-soft",
        }
    }
}

/// Final tally of a run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Jobs in the queue when the run started
    pub total: u64,

    pub skipped: u64,
    pub changed: u64,

    /// Dry-run matches
    pub would_change: u64,

    pub failed: u64,

    /// Jobs never attempted because the run was cancelled
    pub abandoned: u64,

    /// Every failure, in arrival order
    pub failures: Vec<ChangeError>,

    /// Cancelled by an interrupt rather than a failure
    pub interrupted: bool,

    /// Jobs applied by each worker, indexed by worker id
    pub jobs_per_worker: Vec<u64>,

    pub duration: Duration,
}

impl RunSummary {
    pub fn first_error(&self) -> Option<&ChangeError> {
        self.failures.first()
    }

    /// Jobs that produced an outcome
    pub fn processed(&self) -> u64 {
        self.skipped + self.changed + self.would_change + self.failed
    }

    /// A run succeeds only if nothing failed and it was not interrupted
    pub fn is_success(&self) -> bool {
        self.failed == 0 && !self.interrupted
    }
}

type ProgressFn<'a> = Box<dyn FnMut(&RunSummary) + 'a>;

/// Collects job outcomes into a [`RunSummary`]
pub struct ResultAggregator<'a> {
    summary: RunSummary,
    expected: Owner,
    new_owner: Owner,
    change_log: Option<&'a mut dyn ChangeLog>,
    log_errors: u64,
    on_progress: Option<ProgressFn<'a>>,
}

impl<'a> ResultAggregator<'a> {
    pub fn new(expected: Owner, new_owner: Owner) -> Self {
        Self {
            summary: RunSummary::default(),
            expected,
            new_owner,
            change_log: None,
            log_errors: 0,
            on_progress: None,
        }
    }

    /// Record every outcome to `log`
    pub fn with_change_log(mut self, log: &'a mut dyn ChangeLog) -> Self {
        self.change_log = Some(log);
        self
    }

    /// Call `f` with the running tally after each outcome
    pub fn with_progress(mut self, f: impl FnMut(&RunSummary) + 'a) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    pub fn set_total(&mut self, total: u64) {
        self.summary.total = total;
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Tally one outcome
    pub fn record(&mut self, outcome: &JobOutcome) {
        match &outcome.outcome {
            ChangeOutcome::Skipped { current } => {
                debug!(path = %outcome.job.path.display(), current = %current, "Skipped");
                self.summary.skipped += 1;
            }
            ChangeOutcome::Changed => self.summary.changed += 1,
            ChangeOutcome::WouldChange => self.summary.would_change += 1,
            ChangeOutcome::Failed(err) => {
                warn!(worker = outcome.worker, error = %err, "Ownership change failed");
                self.summary.failed += 1;
                self.summary.failures.push(err.clone());
            }
        }

        self.log(outcome);

        if let Some(f) = self.on_progress.as_mut() {
            f(&self.summary);
        }
    }

    /// Count jobs discarded after cancellation
    pub fn record_abandoned(&mut self, count: u64) {
        self.summary.abandoned += count;
    }

    pub fn set_worker_jobs(&mut self, jobs: Vec<u64>) {
        self.summary.jobs_per_worker = jobs;
    }

    pub fn mark_interrupted(&mut self) {
        self.summary.interrupted = true;
    }

    /// Flush the change log and return the final tally
    pub fn finish(mut self, duration: Duration) -> RunSummary {
        if let Some(log) = self.change_log.as_mut() {
            if let Err(e) = log.flush() {
                warn!(error = %e, "Failed to flush change log");
            }
        }
        if self.log_errors > 0 {
            warn!(errors = self.log_errors, "Some change log records could not be written");
        }
        self.summary.duration = duration;
        self.summary
    }

    fn log(&mut self, outcome: &JobOutcome) {
        let Some(log) = self.change_log.as_mut() else {
            return;
        };

        let (old_owner, new_owner) = match &outcome.outcome {
            ChangeOutcome::Skipped { current } => (Some(*current), None),
            ChangeOutcome::Changed | ChangeOutcome::WouldChange => {
                (Some(self.expected), Some(self.new_owner))
            }
            ChangeOutcome::Failed(ChangeError::Chown { .. }) => (Some(self.expected), None),
            ChangeOutcome::Failed(ChangeError::Stat { .. }) => (None, None),
        };

        let record = ChangeRecord {
            path: &outcome.job.path,
            old_owner,
            new_owner,
            outcome: &outcome.outcome,
        };

        if let Err(e) = log.record(&record) {
            if self.log_errors == 0 {
                warn!(error = %e, "Failed to write change log record");
            }
            self.log_errors += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changelog::LineChangeLog;
    use crate::owner::EntryKind;
    use std::path::PathBuf;

    fn outcome(path: &str, outcome: ChangeOutcome) -> JobOutcome {
        JobOutcome {
            job: Job::new(PathBuf::from(path), EntryKind::File),
            outcome,
            worker: 0,
        }
    }

    fn owners() -> (Owner, Owner) {
        (Owner::from_raw(0), Owner::from_raw(1000))
    }

    #[test]
    fn test_tally() {
        let (old, new) = owners();
        let mut agg = ResultAggregator::new(old, new);
        agg.set_total(4);
        agg.record(&outcome("/a", ChangeOutcome::Changed));
        agg.record(&outcome("/b", ChangeOutcome::Changed));
        agg.record(&outcome("/c", ChangeOutcome::Skipped { current: new }));
        agg.record(&outcome("/d", ChangeOutcome::WouldChange));

        let summary = agg.finish(Duration::from_secs(1));
        assert_eq!(summary.changed, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.would_change, 1);
        assert_eq!(summary.processed(), 4);
        assert!(summary.is_success());
        assert!(summary.first_error().is_none());
    }

    #[test]
    fn test_failure_marks_run_unsuccessful() {
        let (old, new) = owners();
        let mut agg = ResultAggregator::new(old, new);
        let err = ChangeError::Chown {
            path: PathBuf::from("/bad"),
            reason: "denied".into(),
        };
        agg.record(&outcome("/bad", ChangeOutcome::Failed(err.clone())));
        agg.record_abandoned(3);

        let summary = agg.finish(Duration::ZERO);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.abandoned, 3);
        assert_eq!(summary.first_error(), Some(&err));
        assert!(!summary.is_success());
    }

    #[test]
    fn test_interrupted_is_unsuccessful() {
        let (old, new) = owners();
        let mut agg = ResultAggregator::new(old, new);
        agg.mark_interrupted();
        assert!(!agg.finish(Duration::ZERO).is_success());
    }

    #[test]
    fn test_change_log_and_progress() {
        let (old, new) = owners();
        let mut log = LineChangeLog::new(Vec::new());
        let mut seen = Vec::new();
        {
            let mut agg = ResultAggregator::new(old, new)
                .with_change_log(&mut log)
                .with_progress(|s| seen.push(s.processed()));
            agg.record(&outcome("/a", ChangeOutcome::Changed));
            agg.record(&outcome("/b", ChangeOutcome::Skipped { current: Owner::from_raw(5) }));
            agg.finish(Duration::ZERO);
        }

        assert_eq!(seen, vec![1, 2]);
        let text = String::from_utf8(log.into_inner()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("changed /a old=0 new=1000"));
        assert!(lines[1].ends_with("skipped /b old=5 new=-"));
    }
}
