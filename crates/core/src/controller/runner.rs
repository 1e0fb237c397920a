//! Run controller implementation.
//!
//! Drives one run through its state machine:
//! - Start: validate the converter, scan, plan (fatal errors abort here)
//! - Running: the worker pool drains the plan in the background
//! - End: completed once drained, or cancelled if asked to stop

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::RunConfig;
use crate::converter::{ConversionInvoker, Converter};
use crate::planner::{JobPlanner, Plan};
use crate::pool::WorkerPool;
use crate::progress::{JobRecord, ProgressAggregator, ProgressSnapshot, RunEvent, RunStatus};
use crate::report::RunReport;
use crate::scanner::{ScanError, TreeScanner};

use super::types::RunError;

/// Owns one batch run from start to report.
///
/// Terminal states are final: a new run needs a new controller.
pub struct RunController {
    run_id: Uuid,
    config: Arc<RunConfig>,
    converter: Arc<dyn Converter>,
    aggregator: Arc<ProgressAggregator>,
    started: AtomicBool,
    started_at: OnceLock<DateTime<Utc>>,
}

impl RunController {
    pub fn new(config: RunConfig, converter: Arc<dyn Converter>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            config: Arc::new(config),
            converter,
            aggregator: Arc::new(ProgressAggregator::new()),
            started: AtomicBool::new(false),
            started_at: OnceLock::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Validate, scan and plan, then dispatch the plan in the background.
    ///
    /// Returns once the run is `Running`. On a fatal error the run moves to
    /// `FatalAborted` and the error is returned; no job is created.
    pub async fn start(&self) -> Result<(), RunError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(RunError::AlreadyStarted);
        }
        let _ = self.started_at.set(Utc::now());

        info!(
            run_id = %self.run_id,
            config = %self.config.fingerprint(),
            "Starting run: {:?} -> {:?} ({}, {} workers, converter {})",
            self.config.input_root,
            self.config.output_root,
            self.config.target,
            self.config.workers,
            self.converter.name()
        );

        if let Err(e) = self.converter.validate().await {
            let reason = e.to_string();
            self.aggregator.abort(reason.clone());
            return Err(RunError::ToolNotFound(reason));
        }

        let plan = match self.scan_and_plan().await {
            Ok(plan) => plan,
            Err(e) => {
                self.aggregator.abort(e.to_string());
                return Err(e);
            }
        };

        self.aggregator.begin(&plan);
        self.spawn_pool(plan);
        Ok(())
    }

    /// Walking the tree and creating directories is blocking work.
    async fn scan_and_plan(&self) -> Result<Plan, RunError> {
        let config = Arc::clone(&self.config);
        tokio::task::spawn_blocking(move || {
            let candidates = TreeScanner::from_config(&config).scan()?;
            Ok::<_, ScanError>(JobPlanner::new(&config).plan(candidates))
        })
        .await
        .map_err(|e| RunError::Internal(format!("planning task failed: {}", e)))?
        .map_err(RunError::from)
    }

    fn spawn_pool(&self, plan: Plan) {
        let invoker = Arc::new(ConversionInvoker::new(
            Arc::clone(&self.converter),
            &self.config,
        ));
        let pool = WorkerPool::new(self.config.workers);
        let aggregator = Arc::clone(&self.aggregator);
        let jobs = plan.into_pending();

        // The pool runs in its own task so a panic there still ends the run
        let pool_task = tokio::spawn({
            let aggregator = Arc::clone(&aggregator);
            async move { pool.run(jobs, invoker, aggregator).await }
        });

        tokio::spawn(async move {
            match pool_task.await {
                Ok(started) => {
                    debug!("Worker pool drained after starting {} jobs", started);
                    aggregator.finish(RunStatus::Completed);
                }
                Err(e) => {
                    error!("Worker pool failed: {}", e);
                    aggregator.abort(format!("worker pool failed: {}", e));
                }
            }
        });
    }

    /// Stop dispatching new jobs. In-flight jobs finish; the run then ends
    /// as `Cancelled`.
    pub fn cancel(&self) -> Result<(), RunError> {
        if self.aggregator.request_cancel() {
            Ok(())
        } else {
            Err(RunError::NotRunning)
        }
    }

    /// Wait for the run to end and return its report. Safe to cancel and call again.
    pub async fn wait(&self) -> Result<RunReport, RunError> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(RunError::NotRunning);
        }

        let mut status = self.aggregator.watch_status();
        status
            .wait_for(|s| s.is_terminal())
            .await
            .map_err(|e| RunError::Internal(format!("status channel closed: {}", e)))?;

        Ok(self.report())
    }

    /// Start and wait in one call.
    pub async fn run(&self) -> Result<RunReport, RunError> {
        self.start().await?;
        self.wait().await
    }

    /// Report of the run as it stands now.
    pub fn report(&self) -> RunReport {
        let started_at = self.started_at.get().copied().unwrap_or_else(Utc::now);
        RunReport::new(
            self.run_id,
            started_at,
            Utc::now(),
            self.aggregator.status(),
            self.aggregator.fatal_reason(),
            self.config.fingerprint(),
            self.aggregator.snapshot(),
            self.aggregator.log(),
        )
    }

    pub fn status(&self) -> RunStatus {
        self.aggregator.status()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.aggregator.snapshot()
    }

    /// Terminal job records in completion order.
    pub fn log(&self) -> Vec<JobRecord> {
        self.aggregator.log()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<RunEvent> {
        self.aggregator.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetFormat;
    use crate::testing::{fixtures, MockConverter};
    use tempfile::TempDir;

    fn controller(input: &TempDir, output: &TempDir, converter: &MockConverter) -> RunController {
        let config = RunConfig::new(input.path(), output.path(), TargetFormat::KindleApp);
        RunController::new(config, Arc::new(converter.clone()))
    }

    #[tokio::test]
    async fn test_run_to_completion() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        fixtures::source_tree(input.path(), &["a.pdf", "sub/b.pdf"]);
        let converter = MockConverter::new();
        let controller = controller(&input, &output, &converter);

        assert_eq!(controller.status(), RunStatus::NotStarted);
        let report = controller.run().await.unwrap();

        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.summary.ok, 2);
        assert!(report.is_success());
        assert!(output.path().join("sub/b.epub").is_file());
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let controller = controller(&input, &output, &MockConverter::new());

        controller.start().await.unwrap();
        assert!(matches!(controller.start().await, Err(RunError::AlreadyStarted)));
        controller.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_and_wait_before_start() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let controller = controller(&input, &output, &MockConverter::new());

        assert!(matches!(controller.cancel(), Err(RunError::NotRunning)));
        assert!(matches!(controller.wait().await, Err(RunError::NotRunning)));
    }

    #[tokio::test]
    async fn test_missing_input_root_aborts() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let converter = MockConverter::new();
        let config = RunConfig::new(input.path().join("missing"), output.path(), TargetFormat::KindleApp);
        let controller = RunController::new(config, Arc::new(converter.clone()));

        let err = controller.start().await.unwrap_err();
        assert!(matches!(err, RunError::Scan(ScanError::NotFound { .. })));
        assert_eq!(controller.status(), RunStatus::FatalAborted);

        let report = controller.wait().await.unwrap();
        assert!(report.fatal_reason.is_some());
        assert_eq!(report.summary.total, 0);
        assert_eq!(converter.conversion_count().await, 0);
    }
}
