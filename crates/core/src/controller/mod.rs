//! Run controller: the entry point for one batch run.
//!
//! `NotStarted -> Running -> Completed | Cancelled | FatalAborted`
//!
//! The controller wires the scanner, planner, worker pool and progress
//! aggregator together. Presentation layers poll `snapshot()` or
//! `subscribe()` to events and call `cancel()` on user request.

mod runner;
mod types;

pub use runner::RunController;
pub use types::RunError;
