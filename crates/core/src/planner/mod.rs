//! Job planner: maps scanned sources to mirrored destinations.
//!
//! The whole job list is materialized up front so the total is known before
//! any conversion starts. Destinations that already exist become `Skipped`
//! jobs unless overwriting, and destination directories are created here so
//! workers never race on them.

#[allow(clippy::module_inception)]
mod planner;
mod types;

pub use planner::{JobPlanner, PlanningError};
pub use types::{Job, JobId, JobStatus, Plan};
