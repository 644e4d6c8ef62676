//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable held something other than a non-negative integer.
    #[error("failed to parse {name}='{value}': {source}")]
    InvalidNumber {
        name: &'static str,
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// A setting that must be positive was zero.
    #[error("{name} must be greater than zero")]
    ZeroValue { name: &'static str },

    /// Specified path does not exist on the filesystem.
    #[error("path does not exist: {path}")]
    PathNotFound { path: PathBuf },

    /// Path exists but is not a file (when a file was expected).
    #[error("path is not a file: {path}")]
    NotAFile { path: PathBuf },

    /// The pattern file could not be read.
    #[error("failed to read pattern file {path}: {source}")]
    PatternFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The pattern table JSON was malformed.
    #[error("invalid pattern table: {source}")]
    InvalidPatterns {
        #[source]
        source: serde_json::Error,
    },

    /// Two pattern rows share a name.
    #[error("duplicate pattern name: {name}")]
    DuplicatePattern { name: String },

    /// A pattern row had an empty name, which would match every key.
    #[error("pattern names must not be empty")]
    EmptyPatternName,
}
