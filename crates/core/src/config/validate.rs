use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::converter::{locate_converter, CONVERTER_BINARY};

use super::types::{RunConfig, Settings, TargetFormat};
use super::ConfigError;

/// Extensions selected by the `common` preset.
pub const COMMON_EXTENSIONS: &[&str] = &["pdf", "epub", "mobi"];

/// Normalize an extension allow-list into lower-case entries without a dot.
///
/// Accepts `pdf`, `.PDF`, comma-separated lists such as `"pdf, .epub"` and the
/// `common` preset.
pub fn normalize_extensions<I, S>(items: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .flat_map(|item| {
            item.as_ref()
                .split(',')
                .map(|part| part.trim().trim_start_matches('.').to_lowercase())
                .collect::<Vec<_>>()
        })
        .flat_map(|part| match part.as_str() {
            "common" => COMMON_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            "" => Vec::new(),
            _ => vec![part],
        })
        .collect()
}

impl RunConfig {
    /// Validate layered settings and resolve them into a run configuration.
    ///
    /// Checks:
    /// - Both roots are set and not empty
    /// - At least one worker and one extension
    /// - Target format parses
    /// - A converter can be located unless copying
    pub fn from_settings(settings: Settings) -> Result<Self, ConfigError> {
        let input_root = required_path(settings.input_root.as_deref(), "input_root")?;
        let output_root = required_path(settings.output_root.as_deref(), "output_root")?;

        if settings.workers == 0 {
            return Err(ConfigError::ValidationError(
                "workers must be at least 1".to_string(),
            ));
        }

        if settings.max_diagnostic_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "max_diagnostic_bytes cannot be 0".to_string(),
            ));
        }

        let extensions = normalize_extensions(&settings.extensions);
        if extensions.is_empty() {
            return Err(ConfigError::ValidationError(
                "no input extensions selected".to_string(),
            ));
        }

        let target: TargetFormat = settings.target.parse()?;

        let converter_path = if target.is_copy() {
            None
        } else {
            let path = locate_converter(settings.converter_path.as_deref()).ok_or_else(|| {
                match &settings.converter_path {
                    Some(path) => ConfigError::ConverterNotFound(format!(
                        "{} does not exist",
                        path.display()
                    )),
                    None => ConfigError::ConverterNotFound(format!(
                        "could not find '{}'; install Calibre and put {} on PATH, or set converter_path",
                        CONVERTER_BINARY, CONVERTER_BINARY
                    )),
                }
            })?;
            Some(path)
        };

        let output_profile = Some(settings.output_profile.trim().to_string()).filter(|p| !p.is_empty());
        let timeout = Some(settings.timeout_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Ok(Self {
            input_root,
            output_root,
            recursive: settings.recursive,
            extensions,
            target,
            overwrite: settings.overwrite,
            workers: settings.workers,
            converter_path,
            output_profile,
            extra_args: settings.extra_args,
            timeout,
            flatten: settings.flatten,
            max_diagnostic_bytes: settings.max_diagnostic_bytes,
        })
    }
}

fn required_path(path: Option<&Path>, key: &str) -> Result<PathBuf, ConfigError> {
    let path = path
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| ConfigError::ValidationError(format!("{} is required", key)))?;

    std::path::absolute(path)
        .map_err(|e| ConfigError::ValidationError(format!("{} is not usable: {}", key, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings_with_converter(dir: &TempDir) -> Settings {
        let converter = dir.path().join("ebook-convert");
        std::fs::write(&converter, b"#!/bin/sh\n").unwrap();

        Settings {
            input_root: Some(dir.path().join("in")),
            output_root: Some(dir.path().join("out")),
            converter_path: Some(converter),
            ..Settings::default()
        }
    }

    #[test]
    fn test_normalize_extensions() {
        let exts = normalize_extensions(["pdf, .EPUB", " mobi ", "", ".pdf"]);
        let expected: BTreeSet<String> = ["epub", "mobi", "pdf"].iter().map(|s| s.to_string()).collect();
        assert_eq!(exts, expected);
    }

    #[test]
    fn test_common_preset_expands() {
        let exts = normalize_extensions(["common,azw3"]);
        assert_eq!(exts.len(), 4);
        assert!(exts.contains("mobi"));
        assert!(exts.contains("azw3"));
    }

    #[test]
    fn test_valid_settings() {
        let dir = TempDir::new().unwrap();
        let config = RunConfig::from_settings(settings_with_converter(&dir)).unwrap();

        assert!(config.input_root.is_absolute());
        assert_eq!(config.target, TargetFormat::KindleApp);
        assert_eq!(config.output_profile.as_deref(), Some("kindle"));
        assert_eq!(config.timeout, Some(Duration::from_secs(1800)));
        assert!(config.converter_path.is_some());
    }

    #[test]
    fn test_missing_input_root_fails() {
        let dir = TempDir::new().unwrap();
        let settings = Settings {
            input_root: None,
            ..settings_with_converter(&dir)
        };
        let err = RunConfig::from_settings(settings).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_zero_workers_fails() {
        let dir = TempDir::new().unwrap();
        let settings = Settings {
            workers: 0,
            ..settings_with_converter(&dir)
        };
        assert!(matches!(
            RunConfig::from_settings(settings),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_empty_extensions_fail() {
        let dir = TempDir::new().unwrap();
        let settings = Settings {
            extensions: vec![" , ".to_string()],
            ..settings_with_converter(&dir)
        };
        assert!(matches!(
            RunConfig::from_settings(settings),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_missing_explicit_converter_fails() {
        let dir = TempDir::new().unwrap();
        let settings = Settings {
            converter_path: Some(dir.path().join("nope")),
            ..settings_with_converter(&dir)
        };
        assert!(matches!(
            RunConfig::from_settings(settings),
            Err(ConfigError::ConverterNotFound(_))
        ));
    }

    #[test]
    fn test_copy_mode_needs_no_converter() {
        let dir = TempDir::new().unwrap();
        let settings = Settings {
            target: "copy".to_string(),
            converter_path: Some(dir.path().join("nope")),
            ..settings_with_converter(&dir)
        };
        let config = RunConfig::from_settings(settings).unwrap();
        assert!(config.converter_path.is_none());
        assert!(config.target.is_copy());
    }

    #[test]
    fn test_zero_timeout_disables_it() {
        let dir = TempDir::new().unwrap();
        let settings = Settings {
            timeout_secs: 0,
            output_profile: String::new(),
            ..settings_with_converter(&dir)
        };
        let config = RunConfig::from_settings(settings).unwrap();
        assert_eq!(config.timeout, None);
        assert_eq!(config.output_profile, None);
    }
}
