//! Configuration for the converter module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::RunConfig;

use super::locate::CONVERTER_BINARY;

/// Configuration for the `ebook-convert` based converter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Path to the ebook-convert binary.
    #[serde(default = "default_converter_path")]
    pub converter_path: PathBuf,

    /// Calibre output profile (`--output-profile`).
    #[serde(default = "default_output_profile")]
    pub output_profile: Option<String>,

    /// Additional arguments appended after the output profile.
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// How much of the converter's stderr to keep, in bytes.
    #[serde(default = "default_max_stderr_bytes")]
    pub max_stderr_bytes: usize,
}

fn default_converter_path() -> PathBuf {
    PathBuf::from(CONVERTER_BINARY)
}

fn default_output_profile() -> Option<String> {
    Some("kindle".to_string())
}

fn default_max_stderr_bytes() -> usize {
    8 * 1024
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            converter_path: default_converter_path(),
            output_profile: default_output_profile(),
            extra_args: Vec::new(),
            max_stderr_bytes: default_max_stderr_bytes(),
        }
    }
}

impl ConverterConfig {
    /// Creates a new config with a custom converter path.
    pub fn with_path(converter_path: PathBuf) -> Self {
        Self {
            converter_path,
            ..Default::default()
        }
    }

    /// Sets the output profile.
    pub fn with_output_profile(mut self, profile: Option<String>) -> Self {
        self.output_profile = profile;
        self
    }

    /// Sets the extra arguments.
    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    /// Converter settings of a run. `None` when the run copies instead of converting.
    pub fn from_run_config(config: &RunConfig) -> Option<Self> {
        let converter_path = config.converter_path.clone()?;
        Some(Self {
            converter_path,
            output_profile: config.output_profile.clone(),
            extra_args: config.extra_args.clone(),
            max_stderr_bytes: default_max_stderr_bytes().max(config.max_diagnostic_bytes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetFormat;

    #[test]
    fn test_default_config() {
        let config = ConverterConfig::default();
        assert_eq!(config.converter_path, PathBuf::from(CONVERTER_BINARY));
        assert_eq!(config.output_profile.as_deref(), Some("kindle"));
        assert!(config.extra_args.is_empty());
    }

    #[test]
    fn test_config_builder() {
        let config = ConverterConfig::with_path(PathBuf::from("/opt/calibre/ebook-convert"))
            .with_output_profile(Some("kindle_pw3".to_string()))
            .with_extra_args(vec!["--no-inline-toc".to_string()]);

        assert_eq!(config.converter_path, PathBuf::from("/opt/calibre/ebook-convert"));
        assert_eq!(config.output_profile.as_deref(), Some("kindle_pw3"));
        assert_eq!(config.extra_args, vec!["--no-inline-toc"]);
    }

    #[test]
    fn test_from_run_config() {
        let run = RunConfig::new("/in", "/out", TargetFormat::KindleDevice)
            .with_converter_path("/usr/bin/ebook-convert");
        let config = ConverterConfig::from_run_config(&run).unwrap();
        assert_eq!(config.converter_path, PathBuf::from("/usr/bin/ebook-convert"));

        let copy = RunConfig::new("/in", "/out", TargetFormat::Copy);
        assert!(ConverterConfig::from_run_config(&copy).is_none());
    }
}
