//! Error types for archive parsing, generation and reconciliation.
//!
//! Library operations return [`Error`]; the CLI converts them to
//! `anyhow::Error` at its boundary with the `?` operator.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the symplectic core.
#[derive(Error, Debug)]
pub enum Error {
    /// The subfolder requested for generation does not exist under the base directory.
    #[error("Subfolder '{}' does not exist", path.display())]
    SubfolderNotFound { path: PathBuf },

    /// A section header carried no file path.
    #[error("Section {index} has an empty file path")]
    EmptyPath { index: usize },

    /// A section path is absolute or escapes the base directory.
    #[error("Section path '{path}' must be relative and stay inside the base directory")]
    UnsafePath { path: String },

    /// A file store operation failed.
    #[error("Failed to {op} '{}': {source}", path.display())]
    Store {
        /// Operation that failed (e.g. "write", "remove directory").
        op: &'static str,
        /// Path the operation was applied to.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The ignore matcher could not be built.
    #[error("Failed to build ignore rules for '{}': {source}", path.display())]
    Ignore {
        /// Base directory the ignore files were loaded from.
        path: PathBuf,
        /// Underlying pattern or ignore-file error.
        source: ignore::Error,
    },
}

impl Error {
    /// Wrap an I/O error with the operation and path it came from.
    pub fn store(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Store {
            op,
            path: path.into(),
            source,
        }
    }
}
