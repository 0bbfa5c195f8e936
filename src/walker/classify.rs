//! Tree classification
//!
//! Walks the subtree under the root on a single thread, reads each entry's
//! owner without following symlinks, and sorts the eligible ones into the
//! file and directory lists that feed the job queue.
//!
//! Policy for entries that are neither regular files nor directories:
//! symlinks, devices, FIFOs and sockets are counted as special and never
//! classified. Symlinked directories are not descended into.

use crate::error::TraversalError;
use crate::owner::{EntryKind, Owner, OwnerBackend};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace};

/// What to classify and how to filter it
#[derive(Debug, Clone)]
pub struct ClassifyOptions {
    /// Only entries currently owned by this id are eligible
    pub old_owner: Owner,

    /// Collect regular files
    pub include_files: bool,

    /// Collect directories
    pub include_folders: bool,

    /// Entries whose full path matches are skipped, along with their subtree
    pub exclude_patterns: Vec<Regex>,
}

impl ClassifyOptions {
    pub fn new(old_owner: Owner, include_files: bool, include_folders: bool) -> Self {
        Self {
            old_owner,
            include_files,
            include_folders,
            exclude_patterns: Vec::new(),
        }
    }

    fn is_excluded(&self, path: &Path) -> bool {
        if self.exclude_patterns.is_empty() {
            return false;
        }
        let path = path.to_string_lossy();
        self.exclude_patterns.iter().any(|re| re.is_match(&path))
    }
}

/// Counters collected while walking
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Entries stat'ed (root excluded)
    pub visited: u64,

    /// Entries owned by someone other than the old owner
    pub foreign: u64,

    /// Symlinks, devices, FIFOs, sockets
    pub special: u64,

    /// Entries skipped by an exclude pattern
    pub excluded: u64,

    /// Total size of the classified files
    pub file_bytes: u64,
}

/// Eligible paths, partitioned by type
///
/// A path appears in at most one of the two lists. Both are in walk
/// order: depth-first, siblings sorted by name.
#[derive(Debug, Clone, Default)]
pub struct ClassificationResult {
    pub files: Vec<PathBuf>,
    pub directories: Vec<PathBuf>,
    pub stats: ScanStats,
}

impl ClassificationResult {
    /// Number of jobs this result will produce
    pub fn total(&self) -> usize {
        self.files.len() + self.directories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Walks a tree and classifies entries by owner and type
pub struct PathClassifier<'a, B: OwnerBackend + ?Sized> {
    backend: &'a B,
    options: &'a ClassifyOptions,
    cancel: Option<&'a AtomicBool>,
}

impl<'a, B: OwnerBackend + ?Sized> PathClassifier<'a, B> {
    pub fn new(backend: &'a B, options: &'a ClassifyOptions) -> Self {
        Self {
            backend,
            options,
            cancel: None,
        }
    }

    /// Stop at the next directory once `flag` is set
    pub fn with_cancel(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Classify every entry below `root`
    ///
    /// The first entry that cannot be listed or stat'ed aborts the walk;
    /// no partial result is returned. The same holds for cancellation.
    pub fn classify(&self, root: &Path) -> Result<ClassificationResult, TraversalError> {
        let root_stat = self
            .backend
            .stat(root)
            .map_err(|source| TraversalError::Stat {
                path: root.to_path_buf(),
                source,
            })?;
        if !root_stat.kind.is_dir() {
            return Err(TraversalError::NotADirectory {
                path: root.to_path_buf(),
            });
        }

        debug!(root = %root.display(), old_owner = %self.options.old_owner, "Classifying tree");

        let mut result = ClassificationResult::default();

        // Stack of directories still to list. Children are pushed in
        // reverse so they pop in name order.
        let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            if self.is_cancelled() {
                debug!(path = %dir.display(), "Classification interrupted");
                return Err(TraversalError::Interrupted { path: dir });
            }

            let children = self.list_dir(&dir)?;

            for child in children.into_iter().rev() {
                if let Some(subdir) = self.visit(child, &mut result)? {
                    pending.push(subdir);
                }
            }
        }

        debug!(
            files = result.files.len(),
            directories = result.directories.len(),
            visited = result.stats.visited,
            "Classification complete"
        );

        Ok(result)
    }

    /// Sorted child paths of a directory
    fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>, TraversalError> {
        let mut children = self
            .backend
            .list_dir(dir)
            .map_err(|source| TraversalError::ReadDir {
                path: dir.to_path_buf(),
                source,
            })?;
        children.sort();
        Ok(children)
    }

    /// Classify one entry; returns the path again if it should be descended into
    fn visit(
        &self,
        path: PathBuf,
        result: &mut ClassificationResult,
    ) -> Result<Option<PathBuf>, TraversalError> {
        if self.options.is_excluded(&path) {
            trace!(path = %path.display(), "Excluded");
            result.stats.excluded += 1;
            return Ok(None);
        }

        let stat = self
            .backend
            .stat(&path)
            .map_err(|source| TraversalError::Stat {
                path: path.clone(),
                source,
            })?;
        result.stats.visited += 1;

        let descend = stat.kind.is_dir();

        match stat.kind {
            EntryKind::Symlink | EntryKind::Special => {
                result.stats.special += 1;
            }
            _ if stat.owner != self.options.old_owner => {
                result.stats.foreign += 1;
            }
            EntryKind::Directory => {
                if self.options.include_folders {
                    result.directories.push(path.clone());
                }
            }
            EntryKind::File => {
                if self.options.include_files {
                    result.stats.file_bytes += stat.size;
                    result.files.push(path.clone());
                }
            }
        }

        Ok(descend.then_some(path))
    }
}

/// Convenience wrapper around [`PathClassifier::classify`]
pub fn classify<B: OwnerBackend + ?Sized>(
    backend: &B,
    root: &Path,
    options: &ClassifyOptions,
) -> Result<ClassificationResult, TraversalError> {
    PathClassifier::new(backend, options).classify(root)
}
