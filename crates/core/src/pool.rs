//! Worker pool that drains planned jobs with bounded concurrency.

use futures::future::join_all;
use futures::FutureExt;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::converter::{ConversionInvoker, InvocationOutcome};
use crate::metrics;
use crate::planner::{Job, JobStatus};
use crate::progress::{JobRecord, ProgressAggregator};

/// Runs pending jobs on `concurrency` tokio workers.
///
/// Workers pull from one shared queue in planned order, so a slow job never
/// holds back others. Cancellation is checked at each pull through the
/// aggregator; in-flight jobs are always allowed to finish.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    concurrency: usize,
}

impl WorkerPool {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Drains `jobs` and reports every started job to the aggregator.
    ///
    /// Returns the number of jobs that were started.
    pub async fn run(
        &self,
        jobs: Vec<Job>,
        invoker: Arc<ConversionInvoker>,
        aggregator: Arc<ProgressAggregator>,
    ) -> usize {
        let workers = self.concurrency.min(jobs.len());
        if workers == 0 {
            return 0;
        }

        let queue = Arc::new(Mutex::new(VecDeque::from(jobs)));
        let started = Arc::new(AtomicUsize::new(0));
        debug!("Starting {} workers", workers);

        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                tokio::spawn(worker_loop(
                    worker,
                    Arc::clone(&queue),
                    Arc::clone(&invoker),
                    Arc::clone(&aggregator),
                    Arc::clone(&started),
                ))
            })
            .collect();

        for result in join_all(handles).await {
            if let Err(e) = result {
                error!("Worker task ended abnormally: {}", e);
            }
        }

        started.load(Ordering::Relaxed)
    }
}

async fn worker_loop(
    worker: usize,
    queue: Arc<Mutex<VecDeque<Job>>>,
    invoker: Arc<ConversionInvoker>,
    aggregator: Arc<ProgressAggregator>,
    started: Arc<AtomicUsize>,
) {
    loop {
        let Some(job) = queue.lock().await.pop_front() else {
            break;
        };

        if !aggregator.mark_running(job.id, &job.source) {
            if aggregator.is_cancel_requested() {
                debug!("Worker {} stopping: run cancelled", worker);
                break;
            }
            continue;
        }
        started.fetch_add(1, Ordering::Relaxed);

        metrics::ACTIVE_CONVERSIONS.inc();
        let outcome = AssertUnwindSafe(invoker.invoke(&job)).catch_unwind().await;
        metrics::ACTIVE_CONVERSIONS.dec();

        let outcome = outcome.unwrap_or_else(|panic| {
            let reason = panic_message(panic.as_ref());
            warn!("Worker {} panicked on job {}: {}", worker, job.id, reason);
            metrics::CONVERSIONS_TOTAL.with_label_values(&["panicked"]).inc();
            InvocationOutcome {
                status: JobStatus::Failed,
                diagnostic: Some(format!("converter panicked: {}", reason)),
                duration: Default::default(),
            }
        });

        aggregator.record_result(JobRecord {
            job_id: job.id,
            source: job.source,
            destination: job.destination,
            status: outcome.status,
            diagnostic: outcome.diagnostic,
            duration_ms: outcome.duration.as_millis() as u64,
        });
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
