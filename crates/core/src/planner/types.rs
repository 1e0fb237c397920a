//! Types for the planner module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Identity of a job: its position in the planned (sorted) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub usize);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Status of a single job.
///
/// Transitions only move forward: `Pending -> Running -> Ok | Failed`, or
/// `Pending -> Skipped | Failed` while planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Ok,
    Skipped,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ok | Self::Skipped | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Ok => "ok",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One planned source to destination conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub status: JobStatus,
    /// Set only when the job failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl Job {
    pub fn pending(id: JobId, source: PathBuf, destination: PathBuf) -> Self {
        Self {
            id,
            source,
            destination,
            status: JobStatus::Pending,
            diagnostic: None,
        }
    }

    pub(crate) fn skip(&mut self) {
        self.status = JobStatus::Skipped;
    }

    /// Marks a pending job as failed during planning.
    pub(crate) fn fail(&mut self, diagnostic: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.diagnostic = Some(diagnostic.into());
    }
}

/// The fully materialized job list of a run, in dispatch order.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub jobs: Vec<Job>,
}

impl Plan {
    pub fn total(&self) -> usize {
        self.jobs.len()
    }

    pub fn count(&self, status: JobStatus) -> usize {
        self.jobs.iter().filter(|j| j.status == status).count()
    }

    /// Jobs still to be dispatched, in planned order.
    pub fn pending(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter().filter(|j| j.status == JobStatus::Pending)
    }

    pub fn into_pending(self) -> Vec<Job> {
        self.jobs
            .into_iter()
            .filter(|j| j.status == JobStatus::Pending)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Ok.is_terminal());
        assert!(JobStatus::Skipped.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_job_serialization() {
        let job = Job::pending(JobId(3), PathBuf::from("/in/a.pdf"), PathBuf::from("/out/a.epub"));
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("\"id\":3"));
        assert!(json.contains("\"status\":\"pending\""));
        assert!(!json.contains("diagnostic"));
    }

    #[test]
    fn test_plan_counts() {
        let mut failed = Job::pending(JobId(1), PathBuf::from("b"), PathBuf::from("b2"));
        failed.fail("boom");
        let plan = Plan {
            jobs: vec![
                Job::pending(JobId(0), PathBuf::from("a"), PathBuf::from("a2")),
                failed,
            ],
        };

        assert_eq!(plan.total(), 2);
        assert_eq!(plan.count(JobStatus::Pending), 1);
        assert_eq!(plan.count(JobStatus::Failed), 1);
        assert_eq!(plan.into_pending().len(), 1);
    }
}
