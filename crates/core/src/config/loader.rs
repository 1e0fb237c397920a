use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Settings, ConfigError};

/// Prefix of environment variables that override configuration keys.
pub const CONFIG_ENV_PREFIX: &str = "EBOOKBATCH_";

/// Build the layered configuration: defaults, optional TOML file, environment.
///
/// Callers may merge further providers (command-line flags) before extracting.
pub fn settings_figment(path: Option<&Path>) -> Result<Figment, ConfigError> {
    let mut figment = Figment::new().merge(Serialized::defaults(Settings::default()));

    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        figment = figment.merge(Toml::file(path));
    }

    Ok(figment.merge(Env::prefixed(CONFIG_ENV_PREFIX)))
}

/// Load settings from an optional file with environment variable overrides
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    settings_figment(path)?
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load settings from TOML string (useful for testing)
pub fn load_settings_from_str(toml_str: &str) -> Result<Settings, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_settings_from_str_valid() {
        let toml = r#"
input_root = "/library"
output_root = "/kindle"
target = "kindle-device"
overwrite = true
"#;
        let settings = load_settings_from_str(toml).unwrap();
        assert_eq!(settings.input_root, Some(PathBuf::from("/library")));
        assert_eq!(settings.target, "kindle-device");
        assert!(settings.overwrite);
    }

    #[test]
    fn test_load_settings_from_str_wrong_type() {
        let toml = r#"
workers = "many"
"#;
        let result = load_settings_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_settings_file_not_found() {
        let result = load_settings(Some(Path::new("/nonexistent/ebookbatch.toml")));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_settings_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
input_root = "/library"
workers = 3
extensions = ["pdf", "mobi"]
"#
        )
        .unwrap();

        let settings = load_settings(Some(temp_file.path())).unwrap();
        assert_eq!(settings.workers, 3);
        assert_eq!(settings.extensions, vec!["pdf", "mobi"]);
        // Untouched keys keep their defaults
        assert_eq!(settings.target, "kindle-app");
    }

    #[test]
    fn test_later_providers_override_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "workers = 3").unwrap();

        let settings: Settings = settings_figment(Some(temp_file.path()))
            .unwrap()
            .merge(Serialized::defaults(serde_json::json!({ "workers": 9 })))
            .extract()
            .unwrap();
        assert_eq!(settings.workers, 9);
    }
}
