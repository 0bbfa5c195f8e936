//! Conditional ownership change for a single path
//!
//! The owner is read again at call time because classification and the
//! change are separated in time. This narrows the race with concurrent
//! filesystem activity but cannot close it: nothing is locked between
//! the re-check and the syscall.

use crate::error::ChangeError;
use crate::owner::{Owner, OwnerBackend};
use std::path::Path;

/// Result of applying a change to one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// Current owner no longer matched the expected one
    Skipped { current: Owner },

    /// Owner was updated
    Changed,

    /// Dry run: the owner matched and would have been updated
    WouldChange,

    /// Re-check or syscall failed
    Failed(ChangeError),
}

impl ChangeOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ChangeOutcome::Failed(_))
    }

    /// Changed, or would have changed in a dry run
    pub fn is_change(&self) -> bool {
        matches!(self, ChangeOutcome::Changed | ChangeOutcome::WouldChange)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChangeOutcome::Skipped { .. } => "skipped",
            ChangeOutcome::Changed => "changed",
            ChangeOutcome::WouldChange => "would-change",
            ChangeOutcome::Failed(_) => "failed",
        }
    }
}

/// Applies `expected -> new` owner changes through a backend
pub struct OwnershipChanger<B: OwnerBackend> {
    backend: B,
    expected: Owner,
    new_owner: Owner,
    dry_run: bool,
}

impl<B: OwnerBackend> OwnershipChanger<B> {
    pub fn new(backend: B, expected: Owner, new_owner: Owner, dry_run: bool) -> Self {
        Self {
            backend,
            expected,
            new_owner,
            dry_run,
        }
    }

    pub fn expected(&self) -> Owner {
        self.expected
    }

    pub fn new_owner(&self) -> Owner {
        self.new_owner
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Change the owner of `path` if it is still owned by the expected id
    ///
    /// Applying twice is harmless: after the first change the owner no
    /// longer matches and the second call reports `Skipped`.
    pub fn apply(&self, path: &Path) -> ChangeOutcome {
        let stat = match self.backend.stat(path) {
            Ok(stat) => stat,
            Err(e) => {
                return ChangeOutcome::Failed(ChangeError::Stat {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })
            }
        };

        if stat.owner != self.expected {
            return ChangeOutcome::Skipped {
                current: stat.owner,
            };
        }

        if self.dry_run {
            return ChangeOutcome::WouldChange;
        }

        match self.backend.set_owner(path, self.new_owner) {
            Ok(()) => ChangeOutcome::Changed,
            Err(e) => ChangeOutcome::Failed(ChangeError::Chown {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }),
        }
    }
}
