mod loader;
mod types;
mod validate;

pub use loader::{load_settings, load_settings_from_str, settings_figment, CONFIG_ENV_PREFIX};
pub use types::*;
pub use validate::{normalize_extensions, COMMON_EXTENSIONS};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Converter not found: {0}")]
    ConverterNotFound(String),
}
