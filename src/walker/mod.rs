//! Tree walking and the parallel change phase
//!
//! ```text
//!                 ┌──────────────────────────┐
//!                 │     PathClassifier       │
//!                 │  - single thread         │
//!                 │  - lstat every entry     │
//!                 └────────────┬─────────────┘
//!                              │ files + directories
//!                              ▼
//!                 ┌──────────────────────────┐
//!                 │        JobQueue          │
//!                 │  (crossbeam bounded,     │
//!                 │   closed before start)   │
//!                 └────────────┬─────────────┘
//!       ┌──────────────────────┼──────────────────────┐
//! ┌─────▼─────┐          ┌─────▼─────┐          ┌─────▼─────┐
//! │  Worker 1 │          │  Worker 2 │   ...    │  Worker N │
//! │  re-check │          │  re-check │          │  re-check │
//! │  fchownat │          │  fchownat │          │  fchownat │
//! └─────┬─────┘          └─────┬─────┘          └─────┬─────┘
//!       └──────────────────────┼──────────────────────┘
//!                              ▼
//!                 ┌──────────────────────────┐
//!                 │    ResultAggregator      │
//!                 │  - tallies, change log   │
//!                 └──────────────────────────┘
//! ```

pub mod aggregate;
pub mod changer;
pub mod classify;
pub mod coordinator;
pub mod pool;
pub mod queue;

pub use aggregate::{FailurePolicy, JobOutcome, ResultAggregator, RunSummary};
pub use changer::{ChangeOutcome, OwnershipChanger};
pub use classify::{classify, ClassificationResult, ClassifyOptions, PathClassifier, ScanStats};
pub use coordinator::MigrateCoordinator;
pub use pool::WorkerPool;
pub use queue::{Job, JobQueue};
