//! Error types for uid-migrate
//!
//! This module defines the error hierarchy for the tool:
//! - Traversal errors raised while classifying the tree
//! - Per-item change errors carried inside job outcomes
//! - Configuration and CLI errors
//! - Worker thread errors
//!
//! Design philosophy:
//! - Use thiserror for structured error types in library code
//! - Every filesystem error names the path it happened on
//! - Preserve error chains for debugging

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the uid-migrate application
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Classification could not complete
    #[error("Traversal error: {0}")]
    Traversal(#[from] TraversalError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// I/O errors (log file, console, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that abort classification of the tree
///
/// Classification never returns a partial inventory, so any of these
/// stops the run before a single ownership change is attempted.
#[derive(Error, Debug)]
pub enum TraversalError {
    /// Directory listing failed
    #[error("Failed to read directory '{}': {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Metadata could not be read for an entry
    #[error("Failed to stat '{}': {source}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The walk root is not a directory
    #[error("Root path '{}' is not a directory", path.display())]
    NotADirectory { path: PathBuf },

    /// Cancelled before the walk finished; `path` is the next directory
    /// that would have been listed
    #[error("Scan interrupted before '{}'", path.display())]
    Interrupted { path: PathBuf },
}

impl TraversalError {
    /// Returns the path the traversal failed on
    pub fn path(&self) -> &std::path::Path {
        match self {
            TraversalError::ReadDir { path, .. } => path,
            TraversalError::Stat { path, .. } => path,
            TraversalError::NotADirectory { path } => path,
            TraversalError::Interrupted { path } => path,
        }
    }
}

/// Failure of a single ownership change job
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChangeError {
    /// Re-reading the current owner failed
    #[error("Failed to stat '{}': {reason}", path.display())]
    Stat { path: PathBuf, reason: String },

    /// The ownership syscall failed
    #[error("Failed to change owner of '{}': {reason}", path.display())]
    Chown { path: PathBuf, reason: String },
}

impl ChangeError {
    /// Returns the path the change failed on
    pub fn path(&self) -> &std::path::Path {
        match self {
            ChangeError::Stat { path, .. } => path,
            ChangeError::Chown { path, .. } => path,
        }
    }
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Settings file could not be read
    #[error("Failed to read settings file '{}': {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Settings file is not valid TOML or has the wrong shape
    #[error("Failed to parse settings file '{}': {reason}", path.display())]
    ParseFailed { path: PathBuf, reason: String },

    /// No root path given in the settings file or on the command line
    #[error("No path to scan: set `path` in the settings file or pass it as an argument")]
    MissingPath,

    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// User name not present in the user database
    #[error("Unknown user '{name}'")]
    UnknownUser { name: String },

    /// User database lookup failed
    #[error("Failed to look up user '{name}': {reason}")]
    UserLookup { name: String, reason: String },

    /// Old and new owner are identical
    #[error("Old and new owner are both {owner}; nothing to change")]
    SameOwner { owner: u32 },

    /// Both inclusion flags are off
    #[error("Neither files nor folders are included; nothing to change")]
    NothingIncluded,

    /// Invalid exclude pattern
    #[error("Invalid exclude pattern '{pattern}': {reason}")]
    InvalidExcludePattern { pattern: String, reason: String },

    /// Unknown failure policy name
    #[error("Invalid failure policy '{value}': expected 'fail-fast' or 'fail-soft'")]
    InvalidFailurePolicy { value: String },
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker panicked
    #[error("Worker {id} panicked: {message}")]
    Panicked { id: usize, message: String },

    /// Worker thread could not be spawned
    #[error("Failed to initialize worker {id}: {reason}")]
    InitFailed { id: usize, reason: String },

    /// A job was pushed after the queue was closed
    #[error("Job queue is closed")]
    QueueClosed,
}

impl MigrateError {
    /// Whether the error only reports a cancellation
    pub fn is_interrupted(&self) -> bool {
        matches!(self, MigrateError::Traversal(TraversalError::Interrupted { .. }))
    }
}

/// Result type alias for MigrateError
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_traversal_error_names_path() {
        let err = TraversalError::ReadDir {
            path: PathBuf::from("/data/locked"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert_eq!(err.path(), std::path::Path::new("/data/locked"));
        assert!(err.to_string().contains("/data/locked"));
    }

    #[test]
    fn test_change_error_names_path() {
        let err = ChangeError::Chown {
            path: PathBuf::from("/data/file.txt"),
            reason: "Operation not permitted (os error 1)".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/data/file.txt"));
        assert!(msg.contains("Operation not permitted"));
    }

    #[test]
    fn test_error_conversion() {
        let err = TraversalError::NotADirectory {
            path: PathBuf::from("/etc/passwd"),
        };
        let top: MigrateError = err.into();
        assert!(matches!(top, MigrateError::Traversal(_)));
        assert!(!top.is_interrupted());
    }

    #[test]
    fn test_interrupted_scan() {
        let top: MigrateError = TraversalError::Interrupted {
            path: PathBuf::from("/data/deep"),
        }
        .into();
        assert!(top.is_interrupted());
        assert!(top.to_string().contains("/data/deep"));
    }
}
