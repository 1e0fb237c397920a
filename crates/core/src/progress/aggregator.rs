//! Progress aggregator implementation.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::metrics;
use crate::planner::{JobId, JobStatus, Plan};

use super::types::{JobRecord, ProgressSnapshot, RunEvent, RunStatus};

/// Mutable state of a run. Only touched under the aggregator's lock.
#[derive(Debug)]
struct RunState {
    status: RunStatus,
    jobs: HashMap<JobId, JobStatus>,
    ok: usize,
    skipped: usize,
    failed: usize,
    pending: usize,
    running: usize,
    /// Terminal records in completion order.
    log: Vec<JobRecord>,
    cancel_requested: bool,
    fatal_reason: Option<String>,
    started_at: Option<Instant>,
    elapsed_at_finish: Option<Duration>,
    /// One unbounded queue per subscriber so no event is ever dropped.
    subscribers: Vec<mpsc::UnboundedSender<RunEvent>>,
}

impl RunState {
    fn new() -> Self {
        Self {
            status: RunStatus::NotStarted,
            jobs: HashMap::new(),
            ok: 0,
            skipped: 0,
            failed: 0,
            pending: 0,
            running: 0,
            log: Vec::new(),
            cancel_requested: false,
            fatal_reason: None,
            started_at: None,
            elapsed_at_finish: None,
            subscribers: Vec::new(),
        }
    }

    fn elapsed(&self) -> Duration {
        self.elapsed_at_finish
            .or_else(|| self.started_at.map(|t| t.elapsed()))
            .unwrap_or_default()
    }

    fn count_terminal(&mut self, status: JobStatus) {
        match status {
            JobStatus::Ok => self.ok += 1,
            JobStatus::Skipped => self.skipped += 1,
            JobStatus::Failed => self.failed += 1,
            JobStatus::Pending | JobStatus::Running => {}
        }
    }

    /// Delivers an event to every live subscriber, dropping closed ones.
    fn emit(&mut self, event: RunEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            status: self.status,
            total: self.jobs.len(),
            completed: self.ok + self.skipped + self.failed,
            ok: self.ok,
            skipped: self.skipped,
            failed: self.failed,
            pending: self.pending,
            running: self.running,
            elapsed_ms: self.elapsed().as_millis() as u64,
        }
    }
}

/// Owns the run state and publishes every change to it.
///
/// All mutation happens in one short critical section per call. Calls never
/// fail: transitions that do not fit the current state are logged and ignored.
pub struct ProgressAggregator {
    state: Mutex<RunState>,
    status_tx: watch::Sender<RunStatus>,
}

impl Default for ProgressAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressAggregator {
    pub fn new() -> Self {
        let (status_tx, _) = watch::channel(RunStatus::NotStarted);
        Self {
            state: Mutex::new(RunState::new()),
            status_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        // State stays consistent between calls, so a poisoned lock is still usable
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_status(&self, state: &mut RunState, status: RunStatus) {
        state.status = status;
        self.status_tx.send_replace(status);
    }

    /// Registers the planned jobs and enters `Running`.
    ///
    /// Jobs the planner already decided (skipped, failed) are logged and
    /// announced right away.
    pub fn begin(&self, plan: &Plan) {
        let mut state = self.lock();
        if state.status != RunStatus::NotStarted {
            warn!("Ignoring begin() in state {}", state.status);
            return;
        }

        state.started_at = Some(Instant::now());
        for job in &plan.jobs {
            if state.jobs.insert(job.id, job.status).is_some() {
                warn!("Duplicate job id {} in plan", job.id);
                continue;
            }
            match job.status {
                JobStatus::Pending => state.pending += 1,
                JobStatus::Running => {
                    warn!("Job {} planned as running; treating as pending", job.id);
                    state.jobs.insert(job.id, JobStatus::Pending);
                    state.pending += 1;
                }
                terminal => {
                    state.count_terminal(terminal);
                    let record = JobRecord::from_job(job, 0);
                    state.log.push(record.clone());
                    state.emit(RunEvent::JobFinished(record));
                }
            }
        }

        self.set_status(&mut state, RunStatus::Running);
        info!(
            "Run started: {} jobs ({} pending, {} skipped, {} failed)",
            state.jobs.len(),
            state.pending,
            state.skipped,
            state.failed
        );
    }

    /// Moves a job from `Pending` to `Running`.
    ///
    /// Returns `false` when the job must not start: cancellation was requested,
    /// the run is not running, or the job is not pending.
    pub fn mark_running(&self, job_id: JobId, source: &std::path::Path) -> bool {
        let mut state = self.lock();
        if state.status != RunStatus::Running || state.cancel_requested {
            return false;
        }

        match state.jobs.get_mut(&job_id) {
            Some(status @ JobStatus::Pending) => {
                *status = JobStatus::Running;
            }
            Some(other) => {
                warn!("Job {} cannot start from {}", job_id, other);
                return false;
            }
            None => {
                warn!("Unknown job {}", job_id);
                return false;
            }
        }

        state.pending -= 1;
        state.running += 1;
        debug!("Job {} running: {:?}", job_id, source);
        state.emit(RunEvent::JobStarted {
            job_id,
            source: source.to_path_buf(),
        });
        true
    }

    /// Stores the terminal result of a running job. Accepted once per job.
    pub fn record_result(&self, record: JobRecord) {
        let mut state = self.lock();
        if !matches!(record.status, JobStatus::Ok | JobStatus::Failed) {
            warn!("Job {} reported non-terminal result {}", record.job_id, record.status);
            return;
        }

        match state.jobs.get_mut(&record.job_id) {
            Some(status @ JobStatus::Running) => {
                *status = record.status;
            }
            Some(other) => {
                warn!("Ignoring result for job {} in state {}", record.job_id, other);
                return;
            }
            None => {
                warn!("Ignoring result for unknown job {}", record.job_id);
                return;
            }
        }

        state.running -= 1;
        state.count_terminal(record.status);
        state.log.push(record.clone());
        state.emit(RunEvent::JobFinished(record));
    }

    /// Flags the run for cancellation. Returns `false` unless it is running.
    ///
    /// Takes effect atomically: no `mark_running` succeeds afterwards.
    pub fn request_cancel(&self) -> bool {
        let mut state = self.lock();
        if state.status != RunStatus::Running {
            return false;
        }
        if !state.cancel_requested {
            state.cancel_requested = true;
            info!("Cancellation requested; {} jobs still running", state.running);
        }
        true
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.lock().cancel_requested
    }

    /// Ends a running run with `Completed` or `Cancelled`.
    ///
    /// A pending cancellation always wins over `Completed`.
    pub fn finish(&self, status: RunStatus) {
        let mut state = self.lock();
        if state.status != RunStatus::Running {
            warn!("Ignoring finish({}) in state {}", status, state.status);
            return;
        }
        let status = match status {
            RunStatus::Completed if state.cancel_requested => RunStatus::Cancelled,
            RunStatus::Completed | RunStatus::Cancelled => status,
            other => {
                warn!("finish() called with non-final status {}", other);
                return;
            }
        };
        if status == RunStatus::Completed && state.running > 0 {
            warn!("Run completed with {} jobs still running", state.running);
        }

        self.close(&mut state, status);
    }

    /// Ends the run with `FatalAborted`, from either `NotStarted` or `Running`.
    pub fn abort(&self, reason: impl Into<String>) {
        let mut state = self.lock();
        if state.status.is_terminal() {
            warn!("Ignoring abort in state {}", state.status);
            return;
        }
        let reason = reason.into();
        warn!("Run aborted: {}", reason);
        state.fatal_reason = Some(reason);
        self.close(&mut state, RunStatus::FatalAborted);
    }

    fn close(&self, state: &mut RunState, status: RunStatus) {
        state.elapsed_at_finish = Some(state.elapsed());
        self.set_status(state, status);
        metrics::RUNS_TOTAL.with_label_values(&[status.as_str()]).inc();
        info!(
            "Run {}: {} ok, {} skipped, {} failed, {} not started",
            status, state.ok, state.skipped, state.failed, state.pending
        );
        state.emit(RunEvent::RunFinished { status });
        // Receivers see the channel close after the final event
        state.subscribers.clear();
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.lock().snapshot()
    }

    /// Terminal job records in completion order.
    pub fn log(&self) -> Vec<JobRecord> {
        self.lock().log.clone()
    }

    pub fn status(&self) -> RunStatus {
        self.lock().status
    }

    pub fn fatal_reason(&self) -> Option<String> {
        self.lock().fatal_reason.clone()
    }

    /// Subscribe to run events emitted from now on.
    ///
    /// Delivery is lossless and in emission order. The receiver yields `None`
    /// once the run has finished.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<RunEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock();
        if state.status.is_terminal() {
            // Nothing more will be emitted; dropping tx closes rx
            return rx;
        }
        state.subscribers.push(tx);
        rx
    }

    /// Watch the run status; resolves waits without holding the lock.
    pub fn watch_status(&self) -> watch::Receiver<RunStatus> {
        self.status_tx.subscribe()
    }
}
