//! Testing utilities and mock implementations.
//!
//! `MockConverter` stands in for `ebook-convert` so that whole runs can be
//! exercised without Calibre installed.
//!
//! # Example
//!
//! ```rust,ignore
//! use ebookbatch_core::testing::{fixtures, MockConverter};
//!
//! let input = tempfile::TempDir::new()?;
//! fixtures::source_tree(input.path(), &["papers/a.pdf", "papers/b.pdf", "notes.txt"]);
//!
//! let converter = MockConverter::new();
//! converter.set_conversion_duration(Duration::from_millis(50)).await;
//! ```

mod mock_converter;

pub use mock_converter::{MockConverter, RecordedConversion, MOCK_OUTPUT};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};

    /// Minimal bytes that look like a PDF.
    pub const PDF_BYTES: &[u8] = b"%PDF-1.7\n%%EOF\n";

    /// Create files at the given relative paths under `root`, with parents.
    ///
    /// Returns the absolute paths in the order given.
    pub fn source_tree(root: &Path, relative: &[&str]) -> Vec<PathBuf> {
        relative
            .iter()
            .map(|rel| {
                let path = root.join(rel);
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).expect("create fixture directory");
                }
                std::fs::write(&path, PDF_BYTES).expect("write fixture file");
                path
            })
            .collect()
    }

    /// Create an existing output file, as left behind by an earlier run.
    pub fn existing_output(root: &Path, relative: &str) -> PathBuf {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create fixture directory");
        }
        std::fs::write(&path, b"old output").expect("write fixture file");
        path
    }
}
