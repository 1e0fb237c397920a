//! Console presentation of a running batch.

use std::io::{IsTerminal, Write};
use tokio::sync::mpsc;

use ebookbatch_core::converter::headline;
use ebookbatch_core::{JobStatus, ProgressSnapshot, RunEvent};

/// One line per finished job; `None` for events that are not printed.
pub fn format_event(event: &RunEvent) -> Option<String> {
    let RunEvent::JobFinished(record) = event else {
        return None;
    };

    let line = match record.status {
        JobStatus::Ok => format!(
            "OK   {} -> {}",
            record.source.display(),
            record.destination.display()
        ),
        JobStatus::Skipped => format!("SKIP {} (exists)", record.destination.display()),
        JobStatus::Failed => format!(
            "FAIL {} :: {}",
            record.source.display(),
            record
                .diagnostic
                .as_deref()
                .and_then(headline)
                .unwrap_or("unknown error")
        ),
        JobStatus::Pending | JobStatus::Running => return None,
    };
    Some(line)
}

pub fn format_progress(snapshot: &ProgressSnapshot) -> String {
    format!(
        "[{}/{}] {:>3.0}%  ok {}  skipped {}  failed {}  running {}  {}s",
        snapshot.completed,
        snapshot.total,
        snapshot.fraction() * 100.0,
        snapshot.ok,
        snapshot.skipped,
        snapshot.failed,
        snapshot.running,
        snapshot.elapsed_ms / 1000
    )
}

/// Rewrites the progress line in place; silent when stderr is not a terminal.
pub fn print_progress(snapshot: &ProgressSnapshot) {
    let mut stderr = std::io::stderr();
    if stderr.is_terminal() {
        let _ = write!(stderr, "\r{}", format_progress(snapshot));
        let _ = stderr.flush();
    }
}

/// Prints job lines until the run finishes.
pub async fn print_events(mut events: mpsc::UnboundedReceiver<RunEvent>) {
    while let Some(event) = events.recv().await {
        if matches!(event, RunEvent::RunFinished { .. }) {
            break;
        }
        if let Some(line) = format_event(&event) {
            println!("{}", line);
        }
    }
}
