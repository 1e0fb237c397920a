//! Conversion invoker: runs one job against a converter and classifies it.

use std::fs::Metadata;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, warn};

use crate::config::{RunConfig, TargetFormat};
use crate::metrics;
use crate::planner::{Job, JobStatus};

use super::diagnostic::truncate_diagnostic;
use super::error::ConverterError;
use super::traits::Converter;

/// Terminal result of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationOutcome {
    /// Either `Ok` or `Failed`.
    pub status: JobStatus,
    /// Bounded failure text, set only when failed.
    pub diagnostic: Option<String>,
    pub duration: Duration,
}

/// Executes jobs one at a time on behalf of a worker.
///
/// Never retries. A job succeeds only if the converter succeeds and leaves a
/// non-empty destination file behind that this invocation wrote. Copy mode
/// trusts a completed copy, empty or not.
pub struct ConversionInvoker {
    converter: Arc<dyn Converter>,
    format: TargetFormat,
    timeout: Option<Duration>,
    max_diagnostic_bytes: usize,
}

impl ConversionInvoker {
    pub fn new(converter: Arc<dyn Converter>, config: &RunConfig) -> Self {
        Self {
            converter,
            format: config.target.clone(),
            timeout: config.timeout,
            max_diagnostic_bytes: config.max_diagnostic_bytes,
        }
    }

    pub fn converter_name(&self) -> &str {
        self.converter.name()
    }

    /// Runs the conversion for a pending job and returns its terminal status.
    pub async fn invoke(&self, job: &Job) -> InvocationOutcome {
        let start = Instant::now();
        let result = self.run(job).await;
        let duration = start.elapsed();

        metrics::CONVERSION_DURATION
            .with_label_values(&[if result.is_ok() { "ok" } else { "failed" }])
            .observe(duration.as_secs_f64());

        match result {
            Ok(()) => {
                metrics::CONVERSIONS_TOTAL.with_label_values(&["ok"]).inc();
                debug!("Job {} converted in {:?}", job.id, duration);
                InvocationOutcome {
                    status: JobStatus::Ok,
                    diagnostic: None,
                    duration,
                }
            }
            Err(e) => {
                let label = match e {
                    ConverterError::Timeout { .. } => "timeout",
                    _ => "failed",
                };
                metrics::CONVERSIONS_TOTAL.with_label_values(&[label]).inc();
                warn!("Job {} failed: {}", job.id, e);

                let diagnostic = truncate_diagnostic(&e.diagnostic(), self.max_diagnostic_bytes);
                InvocationOutcome {
                    status: JobStatus::Failed,
                    diagnostic: Some(diagnostic),
                    duration,
                }
            }
        }
    }

    async fn run(&self, job: &Job) -> Result<(), ConverterError> {
        // Present only when overwriting an earlier output
        let previous = OutputStamp::read(&job.destination).await;

        let conversion = self
            .converter
            .convert(&job.source, &job.destination, &self.format);

        match self.timeout {
            // Dropping the conversion future on timeout kills the process
            Some(limit) => tokio::time::timeout(limit, conversion)
                .await
                .map_err(|_| ConverterError::Timeout { limit })??,
            None => conversion.await?,
        }

        if matches!(self.format, TargetFormat::Copy) {
            verify_copied(&job.destination).await
        } else {
            verify_output(&job.destination, previous).await
        }
    }
}

/// Size and modification time of an output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OutputStamp {
    len: u64,
    modified: Option<SystemTime>,
}

impl OutputStamp {
    fn of(meta: &Metadata) -> Self {
        Self {
            len: meta.len(),
            modified: meta.modified().ok(),
        }
    }

    async fn read(path: &Path) -> Option<Self> {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => Some(Self::of(&meta)),
            _ => None,
        }
    }
}

async fn verify_output(path: &Path, previous: Option<OutputStamp>) -> Result<(), ConverterError> {
    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => meta,
        _ => {
            return Err(ConverterError::MissingOutput {
                path: path.to_path_buf(),
            })
        }
    };

    if meta.len() == 0 {
        return Err(ConverterError::EmptyOutput {
            path: path.to_path_buf(),
        });
    }
    if previous == Some(OutputStamp::of(&meta)) {
        return Err(ConverterError::StaleOutput {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

async fn verify_copied(path: &Path) -> Result<(), ConverterError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(()),
        _ => Err(ConverterError::MissingOutput {
            path: path.to_path_buf(),
        }),
    }
}
