//! uid-migrate - Recursive ownership migration
//!
//! Finds every file and directory under a root that belongs to one user
//! and hands it to another, for example after renumbering accounts or
//! moving data between systems with different uid assignments.
//!
//! # Features
//!
//! - **Two-phase run**: the whole tree is classified first, so nothing is
//!   changed unless the inventory is complete.
//! - **Parallel changes**: a fixed pool of worker threads drains a bounded
//!   job queue.
//! - **Safe re-check**: each worker re-reads the owner right before the
//!   change and skips entries that no longer match.
//! - **Dry run**: counts what would change without touching the tree.
//! - **Fail-fast or fail-soft**: stop at the first failed change, or run
//!   everything and report all failures.
//!
//! # Example
//!
//! ```bash
//! # See what would change
//! uid-migrate /srv/data --old-uid 1001 --new-uid 2001
//!
//! # Apply with 32 workers
//! uid-migrate /srv/data --old-uid 1001 --new-uid 2001 --apply -w 32
//!
//! # Drive everything from a settings file
//! uid-migrate -c settings.toml
//! ```

pub mod changelog;
pub mod config;
pub mod error;
pub mod owner;
pub mod progress;
pub mod walker;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{CliArgs, MigrateConfig, Settings};
pub use error::{MigrateError, Result};
pub use owner::{Owner, OwnerBackend, SystemBackend};
pub use walker::{MigrateCoordinator, RunSummary};
