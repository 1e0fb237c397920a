//! Mock converter for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::config::TargetFormat;
use crate::converter::{Converter, ConverterError};

/// Bytes written to the destination of a successful mock conversion.
pub const MOCK_OUTPUT: &[u8] = b"converted";

/// A recorded conversion request for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedConversion {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub format: TargetFormat,
}

/// Mock implementation of the Converter trait.
///
/// Provides controllable behavior for testing:
/// - Track conversion requests for assertions
/// - Simulate slow conversions
/// - Fail every job, or only specific sources
/// - Make `validate()` report a missing tool
/// - Measure how many conversions overlapped
///
/// Clones share state, so a test can keep one handle and give another to the
/// code under test.
///
/// # Example
///
/// ```rust,ignore
/// use ebookbatch_core::testing::MockConverter;
///
/// let converter = MockConverter::new();
/// converter.fail_path("/books/broken.pdf", "no text layer").await;
///
/// let controller = RunController::new(config, Arc::new(converter.clone()));
/// // ...
/// assert_eq!(converter.conversion_count().await, 3);
/// ```
#[derive(Debug, Clone)]
pub struct MockConverter {
    /// Recorded conversions, in call order.
    conversions: Arc<RwLock<Vec<RecordedConversion>>>,
    /// Simulated conversion duration.
    conversion_duration: Arc<RwLock<Duration>>,
    /// If set, every conversion fails with this stderr.
    always_fail: Arc<RwLock<Option<String>>>,
    /// Sources that fail with the given stderr.
    failing_paths: Arc<RwLock<HashMap<PathBuf, String>>>,
    /// Sources whose conversion panics.
    panicking_paths: Arc<RwLock<Vec<PathBuf>>>,
    /// If set, `validate()` fails with this reason.
    validate_error: Arc<RwLock<Option<String>>>,
    /// Whether a successful conversion writes the destination.
    write_output: Arc<RwLock<bool>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl Default for MockConverter {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight counter even when the conversion is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockConverter {
    /// Create a new mock converter.
    pub fn new() -> Self {
        Self {
            conversions: Arc::new(RwLock::new(Vec::new())),
            conversion_duration: Arc::new(RwLock::new(Duration::ZERO)),
            always_fail: Arc::new(RwLock::new(None)),
            failing_paths: Arc::new(RwLock::new(HashMap::new())),
            panicking_paths: Arc::new(RwLock::new(Vec::new())),
            validate_error: Arc::new(RwLock::new(None)),
            write_output: Arc::new(RwLock::new(true)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get all recorded conversions.
    pub async fn recorded_conversions(&self) -> Vec<RecordedConversion> {
        self.conversions.read().await.clone()
    }

    /// Clear recorded conversions.
    pub async fn clear_recorded(&self) {
        self.conversions.write().await.clear();
    }

    /// Get the number of conversions started.
    pub async fn conversion_count(&self) -> usize {
        self.conversions.read().await.len()
    }

    /// Highest number of conversions seen running at once.
    pub fn max_concurrent(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Set the simulated conversion duration.
    pub async fn set_conversion_duration(&self, duration: Duration) {
        *self.conversion_duration.write().await = duration;
    }

    /// Make every conversion fail with the given stderr, or stop doing so.
    pub async fn set_always_fail(&self, stderr: Option<String>) {
        *self.always_fail.write().await = stderr;
    }

    /// Make conversions of one source fail.
    pub async fn fail_path(&self, source: impl AsRef<Path>, stderr: impl Into<String>) {
        self.failing_paths
            .write()
            .await
            .insert(source.as_ref().to_path_buf(), stderr.into());
    }

    /// Make conversions of one source panic.
    pub async fn panic_on_path(&self, source: impl AsRef<Path>) {
        self.panicking_paths
            .write()
            .await
            .push(source.as_ref().to_path_buf());
    }

    /// Make `validate()` fail as if the tool were missing.
    pub async fn set_validate_error(&self, reason: Option<String>) {
        *self.validate_error.write().await = reason;
    }

    /// Whether successful conversions write the destination file.
    pub async fn set_write_output(&self, write: bool) {
        *self.write_output.write().await = write;
    }

    async fn failure_for(&self, source: &Path) -> Option<String> {
        if let Some(stderr) = self.always_fail.read().await.clone() {
            return Some(stderr);
        }
        self.failing_paths.read().await.get(source).cloned()
    }
}

#[async_trait]
impl Converter for MockConverter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        match self.validate_error.read().await.clone() {
            Some(reason) => Err(ConverterError::tool_not_found("mock-convert", reason)),
            None => Ok(()),
        }
    }

    async fn convert(
        &self,
        source: &Path,
        destination: &Path,
        format: &TargetFormat,
    ) -> Result<(), ConverterError> {
        self.conversions.write().await.push(RecordedConversion {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            format: format.clone(),
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        // Simulate conversion time
        let duration = *self.conversion_duration.read().await;
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }

        if self.panicking_paths.read().await.iter().any(|p| p == source) {
            panic!("mock converter panicked on {}", source.display());
        }

        if let Some(stderr) = self.failure_for(source).await {
            return Err(ConverterError::conversion_failed(
                "mock-convert exited with code Some(1)",
                Some(stderr),
            ));
        }

        if *self.write_output.read().await {
            tokio::fs::write(destination, MOCK_OUTPUT).await?;
        }
        Ok(())
    }
}
