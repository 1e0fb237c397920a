//! Calibre `ebook-convert` based converter implementation.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::debug;

use crate::config::TargetFormat;

use super::config::ConverterConfig;
use super::diagnostic::StderrTail;
use super::error::ConverterError;
use super::traits::Converter;

/// How long `--version` may take before the tool is considered broken.
const VERSION_TIMEOUT: Duration = Duration::from_secs(60);

/// Converter that shells out to Calibre's `ebook-convert`.
///
/// The output format is implied by the destination's extension. The child is
/// killed when the conversion future is dropped, which is how a per-job
/// timeout terminates a hung process.
pub struct EbookConvert {
    config: ConverterConfig,
}

impl EbookConvert {
    /// Creates a new converter with the given configuration.
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    /// Creates a converter with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ConverterConfig::default())
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Builds `ebook-convert` arguments for one conversion.
    fn build_args(&self, source: &Path, destination: &Path) -> Vec<OsString> {
        let mut args = vec![source.as_os_str().to_owned(), destination.as_os_str().to_owned()];

        if let Some(ref profile) = self.config.output_profile {
            args.push(OsString::from("--output-profile"));
            args.push(OsString::from(profile));
        }

        args.extend(self.config.extra_args.iter().map(OsString::from));

        args
    }

    fn spawn_error(&self, e: std::io::Error) -> ConverterError {
        match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                ConverterError::tool_not_found(&self.config.converter_path, e.to_string())
            }
            _ => ConverterError::Io(e),
        }
    }

    /// Runs `ebook-convert --version` and returns its first output line.
    pub async fn version(&self) -> Result<String, ConverterError> {
        let output = timeout(
            VERSION_TIMEOUT,
            Command::new(&self.config.converter_path)
                .arg("--version")
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| {
            ConverterError::tool_not_found(&self.config.converter_path, "--version did not finish")
        })?
        .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(ConverterError::tool_not_found(
                &self.config.converter_path,
                format!("--version exited with code {:?}", output.status.code()),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let text = if stdout.trim().is_empty() { stderr } else { stdout };
        Ok(text.lines().next().unwrap_or("OK").trim().to_string())
    }
}

#[async_trait]
impl Converter for EbookConvert {
    fn name(&self) -> &str {
        "ebook-convert"
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        let version = self.version().await?;
        debug!("Using {:?}: {}", self.config.converter_path, version);
        Ok(())
    }

    async fn convert(
        &self,
        source: &Path,
        destination: &Path,
        _format: &TargetFormat,
    ) -> Result<(), ConverterError> {
        let args = self.build_args(source, destination);

        let mut child = Command::new(&self.config.converter_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let mut tail = StderrTail::new(self.config.max_stderr_bytes);
        if let Some(stderr) = child.stderr.take() {
            // Read raw bytes: converter output is not guaranteed to be UTF-8
            let mut reader = BufReader::new(stderr);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => break,
                    Ok(_) => tail.push_line(&String::from_utf8_lossy(&buf)),
                    Err(e) => {
                        debug!("Stopped reading converter stderr: {}", e);
                        break;
                    }
                }
            }
        }

        let status = child.wait().await?;
        if status.success() {
            return Ok(());
        }

        let stderr = (!tail.is_empty()).then(|| tail.into_string());
        Err(ConverterError::conversion_failed(
            format!("ebook-convert exited with code {:?}", status.code()),
            stderr,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_build_args_with_profile() {
        let converter = EbookConvert::with_defaults();
        let args = converter.build_args(Path::new("/in/a.pdf"), Path::new("/out/a.azw3"));

        assert_eq!(
            args,
            vec![
                OsString::from("/in/a.pdf"),
                OsString::from("/out/a.azw3"),
                OsString::from("--output-profile"),
                OsString::from("kindle"),
            ]
        );
    }

    #[test]
    fn test_build_args_without_profile_with_extras() {
        let config = ConverterConfig::default()
            .with_output_profile(None)
            .with_extra_args(vec!["--pretty-print".to_string()]);
        let converter = EbookConvert::new(config);
        let args = converter.build_args(Path::new("a.pdf"), Path::new("a.epub"));

        assert_eq!(args.len(), 3);
        assert_eq!(args[2], OsString::from("--pretty-print"));
        assert!(!args.contains(&OsString::from("--output-profile")));
    }

    #[tokio::test]
    async fn test_missing_binary_is_tool_not_found() {
        let converter = EbookConvert::new(ConverterConfig::with_path(PathBuf::from(
            "/nonexistent/ebook-convert",
        )));

        let err = converter.validate().await.unwrap_err();
        assert!(matches!(err, ConverterError::ToolNotFound { .. }));

        let err = converter
            .convert(Path::new("/in/a.pdf"), Path::new("/out/a.epub"), &TargetFormat::KindleApp)
            .await
            .unwrap_err();
        assert!(matches!(err, ConverterError::ToolNotFound { .. }));
    }
}
