use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::ConfigError;

/// Raw, layered configuration as read from defaults, file, environment and flags.
///
/// Nothing here is checked yet; [`RunConfig::from_settings`] turns it into the
/// immutable configuration of one run.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub input_root: Option<PathBuf>,
    #[serde(default)]
    pub output_root: Option<PathBuf>,
    #[serde(default = "default_recursive")]
    pub recursive: bool,
    /// Accepted source extensions. Entries may themselves be comma-separated.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// `kindle-app`, `kindle-device`, `copy`, or a raw output format such as `mobi`.
    #[serde(default = "default_target")]
    pub target: String,
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Explicit converter executable. When unset the usual install locations are probed.
    #[serde(default)]
    pub converter_path: Option<PathBuf>,
    /// Value for `--output-profile`; empty disables the flag.
    #[serde(default = "default_output_profile")]
    pub output_profile: String,
    #[serde(default)]
    pub extra_args: Vec<String>,
    /// Per-job timeout in seconds, 0 disables it.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub flatten: bool,
    #[serde(default = "default_max_diagnostic_bytes")]
    pub max_diagnostic_bytes: usize,
}

fn default_recursive() -> bool {
    true
}

fn default_extensions() -> Vec<String> {
    vec!["pdf".to_string()]
}

fn default_target() -> String {
    "kindle-app".to_string()
}

fn default_workers() -> usize {
    6
}

fn default_output_profile() -> String {
    "kindle".to_string()
}

fn default_timeout_secs() -> u64 {
    1800 // 30 minutes
}

fn default_max_diagnostic_bytes() -> usize {
    2048
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input_root: None,
            output_root: None,
            recursive: default_recursive(),
            extensions: default_extensions(),
            target: default_target(),
            overwrite: false,
            workers: default_workers(),
            converter_path: None,
            output_profile: default_output_profile(),
            extra_args: Vec::new(),
            timeout_secs: default_timeout_secs(),
            flatten: false,
            max_diagnostic_bytes: default_max_diagnostic_bytes(),
        }
    }
}

/// What the converter should produce.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TargetFormat {
    /// Kindle apps (phone, desktop, Send-to-Kindle): EPUB.
    KindleApp,
    /// Physical Kindle over USB: AZW3.
    KindleDevice,
    /// No conversion, the original file is copied with its own extension.
    Copy,
    /// Any other output format understood by the converter, lower-cased, no dot.
    Raw(String),
}

impl TargetFormat {
    /// Output extension without the leading dot. `None` for [`TargetFormat::Copy`],
    /// which keeps each source's extension.
    pub fn extension(&self) -> Option<&str> {
        match self {
            Self::KindleApp => Some("epub"),
            Self::KindleDevice => Some("azw3"),
            Self::Copy => None,
            Self::Raw(format) => Some(format),
        }
    }

    pub fn is_copy(&self) -> bool {
        matches!(self, Self::Copy)
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KindleApp => write!(f, "kindle-app"),
            Self::KindleDevice => write!(f, "kindle-device"),
            Self::Copy => write!(f, "copy"),
            Self::Raw(format) => write!(f, "{}", format),
        }
    }
}

impl FromStr for TargetFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().trim_start_matches('.').to_ascii_lowercase();
        match normalized.as_str() {
            "kindle-app" | "app" => Ok(Self::KindleApp),
            "kindle-device" | "device" => Ok(Self::KindleDevice),
            "copy" => Ok(Self::Copy),
            "" => Err(ConfigError::ValidationError(
                "target format cannot be empty".to_string(),
            )),
            raw if raw.chars().all(|c| c.is_ascii_alphanumeric()) => Ok(Self::Raw(raw.to_string())),
            _ => Err(ConfigError::ValidationError(format!(
                "invalid target format: {:?}",
                s
            ))),
        }
    }
}

impl TryFrom<String> for TargetFormat {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TargetFormat> for String {
    fn from(value: TargetFormat) -> Self {
        value.to_string()
    }
}

/// Immutable configuration of one batch run.
#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    /// Absolute input root.
    pub input_root: PathBuf,
    /// Absolute output root.
    pub output_root: PathBuf,
    pub recursive: bool,
    /// Lower-case extensions without the leading dot.
    pub extensions: BTreeSet<String>,
    pub target: TargetFormat,
    pub overwrite: bool,
    /// Maximum number of concurrent conversions.
    pub workers: usize,
    /// Converter executable. Always set unless the target is [`TargetFormat::Copy`].
    pub converter_path: Option<PathBuf>,
    pub output_profile: Option<String>,
    pub extra_args: Vec<String>,
    pub timeout: Option<Duration>,
    /// Write every output directly under the output root.
    pub flatten: bool,
    pub max_diagnostic_bytes: usize,
}

impl RunConfig {
    /// Creates a config with default options. Paths are taken as given.
    pub fn new(input_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>, target: TargetFormat) -> Self {
        Self {
            input_root: input_root.into(),
            output_root: output_root.into(),
            recursive: default_recursive(),
            extensions: default_extensions().into_iter().collect(),
            target,
            overwrite: false,
            workers: default_workers(),
            converter_path: None,
            output_profile: Some(default_output_profile()),
            extra_args: Vec::new(),
            timeout: Some(Duration::from_secs(default_timeout_secs())),
            flatten: false,
            max_diagnostic_bytes: default_max_diagnostic_bytes(),
        }
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = super::normalize_extensions(extensions);
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_converter_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.converter_path = Some(path.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_flatten(mut self, flatten: bool) -> Self {
        self.flatten = flatten;
        self
    }

    pub fn with_max_diagnostic_bytes(mut self, max: usize) -> Self {
        self.max_diagnostic_bytes = max;
        self
    }

    /// Short hash of the effective configuration, logged at run start.
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};

        let json = serde_json::to_string(self).unwrap_or_default();
        let hash = format!("{:x}", Sha256::digest(json.as_bytes()));
        hash[..16].to_string()
    }
}
