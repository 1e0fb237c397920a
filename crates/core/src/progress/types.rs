//! Types for the progress module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::planner::{Job, JobId, JobStatus};

/// Lifecycle of a run.
///
/// `NotStarted -> Running -> Completed | Cancelled | FatalAborted`. A fatal
/// error during start moves straight from `NotStarted` to `FatalAborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    NotStarted,
    Running,
    Completed,
    Cancelled,
    FatalAborted,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::FatalAborted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::FatalAborted => "fatal_aborted",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time counters of a run.
///
/// `ok + skipped + failed + pending + running == total` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub status: RunStatus,
    pub total: usize,
    /// Jobs in a terminal status.
    pub completed: usize,
    pub ok: usize,
    pub skipped: usize,
    pub failed: usize,
    pub pending: usize,
    pub running: usize,
    /// Milliseconds since the run began; frozen once it finished.
    pub elapsed_ms: u64,
}

impl ProgressSnapshot {
    pub(crate) fn empty(status: RunStatus) -> Self {
        Self {
            status,
            total: 0,
            completed: 0,
            ok: 0,
            skipped: 0,
            failed: 0,
            pending: 0,
            running: 0,
            elapsed_ms: 0,
        }
    }

    /// Completed fraction in `[0, 1]`. An empty run counts as done.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Final record of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    /// Wall time of the conversion; zero for jobs decided while planning.
    pub duration_ms: u64,
}

impl JobRecord {
    /// Record for a job whose status is already terminal.
    pub fn from_job(job: &Job, duration_ms: u64) -> Self {
        Self {
            job_id: job.id,
            source: job.source.clone(),
            destination: job.destination.clone(),
            status: job.status,
            diagnostic: job.diagnostic.clone(),
            duration_ms,
        }
    }
}

/// Push notifications emitted while a run progresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    JobStarted { job_id: JobId, source: PathBuf },
    JobFinished(JobRecord),
    RunFinished { status: RunStatus },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_run_statuses() {
        assert!(!RunStatus::NotStarted.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
        assert!(RunStatus::FatalAborted.is_terminal());
    }

    #[test]
    fn test_event_serialization() {
        let event = RunEvent::RunFinished {
            status: RunStatus::Cancelled,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"run_finished","status":"cancelled"}"#);

        let mut job = Job::pending(JobId(0), PathBuf::from("a.pdf"), PathBuf::from("a.epub"));
        job.fail("boom");
        let json = serde_json::to_string(&RunEvent::JobFinished(JobRecord::from_job(&job, 5))).unwrap();
        assert!(json.contains(r#""type":"job_finished""#));
        assert!(json.contains(r#""diagnostic":"boom""#));
    }

    #[test]
    fn test_fraction() {
        let mut snapshot = ProgressSnapshot::empty(RunStatus::Running);
        assert_eq!(snapshot.fraction(), 1.0);
        snapshot.total = 4;
        snapshot.completed = 1;
        assert_eq!(snapshot.fraction(), 0.25);
    }
}
