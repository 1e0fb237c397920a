//! Final run report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;
use uuid::Uuid;

use crate::converter::headline;
use crate::planner::JobStatus;
use crate::progress::{JobRecord, ProgressSnapshot, RunStatus};

/// Everything known about a run once it ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    /// Why the run aborted, for `FatalAborted`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fatal_reason: Option<String>,
    pub config_fingerprint: String,
    pub summary: ProgressSnapshot,
    /// Terminal job records sorted by source path.
    pub records: Vec<JobRecord>,
}

impl RunReport {
    /// Builds a report, sorting the completion log by source.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        status: RunStatus,
        fatal_reason: Option<String>,
        config_fingerprint: String,
        summary: ProgressSnapshot,
        mut records: Vec<JobRecord>,
    ) -> Self {
        records.sort_by(|a, b| a.source.cmp(&b.source));
        Self {
            run_id,
            started_at,
            finished_at,
            status,
            fatal_reason,
            config_fingerprint,
            summary,
            records,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &JobRecord> {
        self.records.iter().filter(|r| r.status == JobStatus::Failed)
    }

    /// Completed with nothing failed.
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed && self.summary.failed == 0
    }

    /// Human readable summary: one line of counts, then one line per failure.
    pub fn render_text(&self) -> String {
        let s = &self.summary;
        let mut out = format!(
            "Run {}: {} converted, {} skipped, {} failed, {} not started ({} total) in {:.1}s",
            self.status,
            s.ok,
            s.skipped,
            s.failed,
            s.pending + s.running,
            s.total,
            s.elapsed_ms as f64 / 1000.0
        );

        if let Some(ref reason) = self.fatal_reason {
            let _ = write!(out, "\nFATAL {}", reason);
        }

        for record in self.failures() {
            let reason = record
                .diagnostic
                .as_deref()
                .and_then(headline)
                .unwrap_or("unknown error");
            let _ = write!(
                out,
                "\nFAIL {} -> {} :: {}",
                record.source.display(),
                record.destination.display(),
                reason
            );
        }

        out
    }

    /// Writes the report as pretty JSON.
    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let mut writer = std::io::BufWriter::new(std::fs::File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::JobId;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn record(id: usize, source: &str, status: JobStatus, diagnostic: Option<&str>) -> JobRecord {
        JobRecord {
            job_id: JobId(id),
            source: PathBuf::from(source),
            destination: PathBuf::from(source.replace("/in/", "/out/").replace(".pdf", ".epub")),
            status,
            diagnostic: diagnostic.map(str::to_string),
            duration_ms: 10,
        }
    }

    fn report() -> RunReport {
        let summary = ProgressSnapshot {
            status: RunStatus::Completed,
            total: 3,
            completed: 3,
            ok: 1,
            skipped: 1,
            failed: 1,
            pending: 0,
            running: 0,
            elapsed_ms: 2500,
        };
        RunReport::new(
            Uuid::new_v4(),
            Utc::now(),
            Utc::now(),
            RunStatus::Completed,
            None,
            "0123456789abcdef".to_string(),
            summary,
            vec![
                record(2, "/in/c.pdf", JobStatus::Failed, Some("Converting\nValueError: bad pdf\n")),
                record(0, "/in/a.pdf", JobStatus::Ok, None),
                record(1, "/in/b.pdf", JobStatus::Skipped, None),
            ],
        )
    }

    #[test]
    fn test_records_sorted_by_source() {
        let report = report();
        let sources: Vec<_> = report.records.iter().map(|r| r.source.clone()).collect();
        assert_eq!(
            sources,
            vec![
                PathBuf::from("/in/a.pdf"),
                PathBuf::from("/in/b.pdf"),
                PathBuf::from("/in/c.pdf")
            ]
        );
    }

    #[test]
    fn test_render_text() {
        let text = report().render_text();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "Run completed: 1 converted, 1 skipped, 1 failed, 0 not started (3 total) in 2.5s"
        );
        assert_eq!(lines[1], "FAIL /in/c.pdf -> /out/c.epub :: ValueError: bad pdf");
    }

    #[test]
    fn test_success_requires_no_failures() {
        let mut report = report();
        assert!(!report.is_success());
        report.summary.failed = 0;
        assert!(report.is_success());
        report.status = RunStatus::Cancelled;
        assert!(!report.is_success());
    }

    #[test]
    fn test_write_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        report().write_json(&path).unwrap();

        let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["status"], "completed");
        assert_eq!(value["summary"]["failed"], 1);
        assert_eq!(value["records"].as_array().unwrap().len(), 3);
        assert!(value.get("fatal_reason").is_none());
    }
}
