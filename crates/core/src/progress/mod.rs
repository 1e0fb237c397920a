//! Run progress tracking.
//!
//! The `ProgressAggregator` is the single owner of a run's state: the status
//! of every job, the run status and the completion log. Workers report into
//! it; presentation reads from it either by polling `snapshot()` or by
//! subscribing to `RunEvent`s.

mod aggregator;
mod types;

pub use aggregator::ProgressAggregator;
pub use types::{JobRecord, ProgressSnapshot, RunEvent, RunStatus};
