//! Copy mode: mirrors the originals without converting them.

use async_trait::async_trait;
use std::path::Path;

use crate::config::TargetFormat;

use super::error::ConverterError;
use super::traits::Converter;

/// "Converter" that copies the source byte for byte.
#[derive(Debug, Default, Clone, Copy)]
pub struct CopyConverter;

#[async_trait]
impl Converter for CopyConverter {
    fn name(&self) -> &str {
        "copy"
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        Ok(())
    }

    async fn convert(
        &self,
        source: &Path,
        destination: &Path,
        _format: &TargetFormat,
    ) -> Result<(), ConverterError> {
        tokio::fs::copy(source, destination).await.map_err(|e| {
            ConverterError::conversion_failed(format!("copy failed: {}", e), None)
        })?;
        Ok(())
    }
}
