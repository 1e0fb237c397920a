//! Trait definitions for the converter module.

use async_trait::async_trait;
use std::path::Path;

use crate::config::TargetFormat;

use super::error::ConverterError;

/// A converter that turns one file into another format.
///
/// Implementations only do the conversion; deciding what to convert,
/// timeouts and output verification are handled by the caller.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Returns the name of this converter implementation.
    fn name(&self) -> &str;

    /// Checks that the converter is installed and runnable.
    ///
    /// Called once before a run; failure is reported as
    /// [`ConverterError::ToolNotFound`].
    async fn validate(&self) -> Result<(), ConverterError>;

    /// Converts `source` into `destination` in the given format.
    async fn convert(
        &self,
        source: &Path,
        destination: &Path,
        format: &TargetFormat,
    ) -> Result<(), ConverterError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingConverter {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Converter for CountingConverter {
        fn name(&self) -> &str {
            "counting"
        }

        async fn validate(&self) -> Result<(), ConverterError> {
            Ok(())
        }

        async fn convert(
            &self,
            _source: &Path,
            _destination: &Path,
            _format: &TargetFormat,
        ) -> Result<(), ConverterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_trait_object_dispatch() {
        let converter: Box<dyn Converter> = Box::new(CountingConverter {
            calls: AtomicUsize::new(0),
        });

        converter.validate().await.unwrap();
        converter
            .convert(Path::new("/in/a.pdf"), Path::new("/out/a.epub"), &TargetFormat::KindleApp)
            .await
            .unwrap();

        assert_eq!(converter.name(), "counting");
    }
}
