//! Tree scanner: finds candidate source files under an input root.
//!
//! The scan is lazy; paths are produced as the directory tree is walked and the
//! order is whatever the filesystem returns. The planner sorts the result.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;
use walkdir::WalkDir;

use crate::config::RunConfig;

/// Errors that prevent a scan from starting.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The input root does not exist.
    #[error("Input root not found: {path}")]
    NotFound { path: PathBuf },

    /// The input root exists but is not a directory.
    #[error("Input root is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// The input root could not be read.
    #[error("Input root is not readable: {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Walks an input root and yields files with an accepted extension.
#[derive(Debug, Clone)]
pub struct TreeScanner {
    root: PathBuf,
    recursive: bool,
    extensions: BTreeSet<String>,
}

impl TreeScanner {
    /// `extensions` must already be normalized (lower case, no leading dot).
    pub fn new(root: impl Into<PathBuf>, recursive: bool, extensions: BTreeSet<String>) -> Self {
        Self {
            root: root.into(),
            recursive,
            extensions,
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(
            config.input_root.clone(),
            config.recursive,
            config.extensions.clone(),
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Starts the scan. Fails only if the root itself is unusable.
    pub fn scan(&self) -> Result<ScanIter, ScanError> {
        let metadata = std::fs::metadata(&self.root).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScanError::NotFound {
                    path: self.root.clone(),
                }
            } else {
                ScanError::Unreadable {
                    path: self.root.clone(),
                    source: e,
                }
            }
        })?;

        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory {
                path: self.root.clone(),
            });
        }

        // Surface permission problems on the root itself instead of an empty scan
        std::fs::read_dir(&self.root).map_err(|e| ScanError::Unreadable {
            path: self.root.clone(),
            source: e,
        })?;

        let mut walker = WalkDir::new(&self.root).min_depth(1).follow_links(true);
        if !self.recursive {
            walker = walker.max_depth(1);
        }

        Ok(ScanIter {
            inner: walker.into_iter(),
            extensions: self.extensions.clone(),
        })
    }
}

/// Lazy sequence of matching files produced by [`TreeScanner::scan`].
pub struct ScanIter {
    inner: walkdir::IntoIter,
    extensions: BTreeSet<String>,
}

impl Iterator for ScanIter {
    type Item = PathBuf;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next()? {
                Ok(entry) => {
                    if entry.file_type().is_file() && has_extension(entry.path(), &self.extensions) {
                        return Some(entry.into_path());
                    }
                }
                Err(e) => {
                    warn!("Skipping unreadable entry during scan: {}", e);
                }
            }
        }
    }
}

/// Whether the path's final extension, lower-cased, is in the set.
pub fn has_extension(path: &Path, extensions: &BTreeSet<String>) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.contains(&ext.to_lowercase()))
        .unwrap_or(false)
}
