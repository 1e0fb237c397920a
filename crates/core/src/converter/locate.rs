//! Finding Calibre's `ebook-convert` on this machine.

use std::path::{Path, PathBuf};

/// Name of the converter executable.
#[cfg(windows)]
pub const CONVERTER_BINARY: &str = "ebook-convert.exe";
/// Name of the converter executable.
#[cfg(not(windows))]
pub const CONVERTER_BINARY: &str = "ebook-convert";

/// Install locations checked after `PATH`.
const WELL_KNOWN_LOCATIONS: &[&str] = &[
    r"C:\Program Files\Calibre2\ebook-convert.exe",
    r"C:\Program Files (x86)\Calibre2\ebook-convert.exe",
    "/Applications/calibre.app/Contents/MacOS/ebook-convert",
    "/opt/calibre/ebook-convert",
    "/usr/bin/ebook-convert",
    "/usr/local/bin/ebook-convert",
];

/// Resolve the converter executable.
///
/// An explicit path is used as-is when it exists and is never second-guessed.
/// Without one, `PATH` is searched first, then the usual install locations.
pub fn locate_converter(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.is_file().then(|| path.to_path_buf());
    }

    find_in_path(CONVERTER_BINARY).or_else(|| {
        WELL_KNOWN_LOCATIONS
            .iter()
            .map(PathBuf::from)
            .find(|candidate| candidate.is_file())
    })
}

/// Search the `PATH` environment variable for an executable name.
pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}
