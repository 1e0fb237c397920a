//! Types for the run controller.

use crate::scanner::ScanError;

/// Errors surfaced by the run controller.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// `start()` was already called on this controller.
    #[error("Run already started")]
    AlreadyStarted,

    /// The operation needs a running run.
    #[error("Run is not running")]
    NotRunning,

    /// The converter could not be used; no jobs were created.
    #[error("Converter unavailable: {0}")]
    ToolNotFound(String),

    /// The input tree could not be scanned; no jobs were created.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// A background task failed unexpectedly.
    #[error("Internal error: {0}")]
    Internal(String),
}
