//! Error types for firmrank.
//!
//! Library crates use [`FirmRankError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all firmrank operations.
#[derive(Debug, thiserror::Error)]
pub enum FirmRankError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error during a firm lookup.
    #[error("network error: {0}")]
    Network(String),

    /// HTML or text parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Dataset shape error: missing sheet, missing required column, duplicate rank.
    #[error("dataset error: {message}")]
    Dataset { message: String },

    /// Spreadsheet codec error (reading or writing a workbook).
    #[error("spreadsheet error: {0}")]
    Spreadsheet(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad row reference, out-of-range column, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FirmRankError>;

impl FirmRankError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a dataset error from any displayable message.
    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
