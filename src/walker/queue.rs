//! Job queue for ownership changes
//!
//! A bounded crossbeam channel with explicit closure. The orchestrator
//! knows every job before the first one is pushed, so the queue is sized
//! to hold all of them and the producer never blocks. Closing drops the
//! last sender: workers drain what is left and then see disconnection.

use crate::error::WorkerError;
use crate::owner::EntryKind;
use crate::walker::classify::ClassificationResult;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One path whose owner should be changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub path: PathBuf,

    /// Type seen at classification time
    pub kind: EntryKind,
}

impl Job {
    pub fn new(path: PathBuf, kind: EntryKind) -> Self {
        Self { path, kind }
    }
}

/// Statistics for the job queue
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Total jobs enqueued
    pub enqueued: AtomicU64,

    /// Total jobs handed to workers
    pub dequeued: AtomicU64,

    /// Jobs thrown away after cancellation
    pub discarded: AtomicU64,
}

impl QueueStats {
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    pub fn dequeued(&self) -> u64 {
        self.dequeued.load(Ordering::Relaxed)
    }

    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }
}

/// Bounded, closable queue of jobs
pub struct JobQueue {
    /// `None` once closed
    sender: Option<Sender<Job>>,

    receiver: Receiver<Job>,

    capacity: usize,

    stats: Arc<QueueStats>,
}

impl JobQueue {
    /// Create an open, empty queue
    pub fn new(capacity: usize) -> Self {
        // A zero-capacity crossbeam channel is a rendezvous channel
        let capacity = capacity.max(1);
        let (sender, receiver) = bounded(capacity);

        Self {
            sender: Some(sender),
            receiver,
            capacity,
            stats: Arc::new(QueueStats::default()),
        }
    }

    /// Build a closed queue holding every classified path
    ///
    /// Directories are enqueued before files. Workers still complete them
    /// in any interleaving, so this is not an ordering guarantee.
    pub fn from_classification(result: &ClassificationResult) -> Result<Self, WorkerError> {
        let mut queue = Self::new(result.total());

        let dirs = result
            .directories
            .iter()
            .map(|p| Job::new(p.clone(), EntryKind::Directory));
        let files = result
            .files
            .iter()
            .map(|p| Job::new(p.clone(), EntryKind::File));

        for job in dirs.chain(files) {
            queue.push(job)?;
        }

        queue.close();
        Ok(queue)
    }

    /// Add a job; fails once the queue has been closed
    pub fn push(&self, job: Job) -> Result<(), WorkerError> {
        let sender = self.sender.as_ref().ok_or(WorkerError::QueueClosed)?;
        sender.send(job).map_err(|_| WorkerError::QueueClosed)?;
        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Stop accepting jobs. Queued jobs stay available to workers.
    pub fn close(&mut self) {
        self.sender = None;
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_none()
    }

    /// Get a receiver for this queue (clone for each worker)
    pub fn receiver(&self) -> JobReceiver {
        JobReceiver {
            receiver: self.receiver.clone(),
            stats: Arc::clone(&self.stats),
        }
    }

    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Throw away every job still queued, returning how many there were
    pub fn discard_remaining(&self) -> u64 {
        let mut count = 0u64;
        while self.receiver.try_recv().is_ok() {
            count += 1;
        }
        self.stats.discarded.fetch_add(count, Ordering::Relaxed);
        count
    }
}

/// Handle for taking jobs from the queue
#[derive(Clone)]
pub struct JobReceiver {
    receiver: Receiver<Job>,
    stats: Arc<QueueStats>,
}

impl JobReceiver {
    /// Block until a job is available
    ///
    /// Returns `None` when the queue is closed and empty.
    pub fn recv(&self) -> Option<Job> {
        match self.receiver.recv() {
            Ok(job) => {
                self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
                Some(job)
            }
            Err(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}
