//! Unified error handling for binmap.

use std::path::PathBuf;
use thiserror::Error;

/// Error type shared across the binmap crates.
#[derive(Error, Debug)]
pub enum Error {
    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Read request that cannot be represented (offset + length overflow)
    #[error("Invalid offset: offset {offset} with length {length}")]
    InvalidOffset { offset: u64, length: u64 },

    /// Grammar document failed validation; all diagnostics are collected
    #[error("Schema error: {}", .errors.join("; "))]
    Schema {
        /// Every validation failure found in the document
        errors: Vec<String>,
    },

    /// Record stream can no longer advance
    #[error("Fatal stream error at offset {offset}: {message}")]
    FatalStream { offset: u64, message: String },
}

/// Result type using the unified [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build a [`Error::Schema`] from collected loader diagnostics.
    pub fn schema(errors: Vec<String>) -> Self {
        Error::Schema { errors }
    }

    /// Check if this is a "not found" error (drives the CLI exit code).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::FileNotFound(_))
            || matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}
