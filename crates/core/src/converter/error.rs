//! Error types for the converter module.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use super::diagnostic::headline;

/// Errors that can occur during conversion.
#[derive(Debug, Error)]
pub enum ConverterError {
    /// Converter executable missing or not runnable.
    #[error("Converter not usable at {path}: {reason}")]
    ToolNotFound { path: PathBuf, reason: String },

    /// Converter process failed.
    #[error("Conversion failed: {reason}")]
    ConversionFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// Converter reported success but wrote nothing.
    #[error("Output file not created: {path}")]
    MissingOutput { path: PathBuf },

    /// Converter reported success but the output is empty.
    #[error("Output file is empty: {path}")]
    EmptyOutput { path: PathBuf },

    /// Converter reported success but left a pre-existing output untouched.
    #[error("Output file not rewritten: {path}")]
    StaleOutput { path: PathBuf },

    /// Conversion timed out.
    #[error("Conversion timed out after {}", describe_limit(.limit))]
    Timeout { limit: Duration },

    /// I/O error during conversion.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_limit(limit: &Duration) -> String {
    if limit.subsec_nanos() == 0 {
        format!("{} seconds", limit.as_secs())
    } else {
        format!("{} ms", limit.as_millis())
    }
}

impl ConverterError {
    /// Creates a new conversion failed error with stderr output.
    pub fn conversion_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::ConversionFailed {
            reason: reason.into(),
            stderr,
        }
    }

    pub fn tool_not_found(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ToolNotFound {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Text shown to the user for a failed job.
    ///
    /// Prefers the converter's own last error line over our summary.
    pub fn diagnostic(&self) -> String {
        match self {
            Self::ConversionFailed {
                reason,
                stderr: Some(stderr),
            } => match headline(stderr) {
                Some(line) => format!("{} ({})", line, reason),
                None => self.to_string(),
            },
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_prefers_stderr_headline() {
        let err = ConverterError::conversion_failed(
            "ebook-convert exited with code 1",
            Some("Converting...\nValueError: no text found\n\n".to_string()),
        );
        assert_eq!(
            err.diagnostic(),
            "ValueError: no text found (ebook-convert exited with code 1)"
        );
    }

    #[test]
    fn test_diagnostic_without_stderr() {
        let err = ConverterError::conversion_failed("exited with code 2", None);
        assert_eq!(err.diagnostic(), "Conversion failed: exited with code 2");

        let err = ConverterError::Timeout {
            limit: Duration::from_secs(5),
        };
        assert_eq!(err.diagnostic(), "Conversion timed out after 5 seconds");
    }

    #[test]
    fn test_subsecond_timeout_is_reported_in_ms() {
        let err = ConverterError::Timeout {
            limit: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "Conversion timed out after 250 ms");
    }
}
