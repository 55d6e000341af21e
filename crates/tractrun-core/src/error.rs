//! Error types for the `tractrun` core library.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the tractrun Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for dispatcher operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Specification has no SUBJECT=<id> token, or the value is empty.
    /// Recoverable: the specification is reported and skipped.
    #[error("Missing SUBJECT in specification: {0}")]
    MissingSubject(String),

    /// Batch line has an unterminated double-quoted group.
    #[error("Unclosed quote in line: {0}")]
    UnclosedQuote(String),

    /// Batch file could not be opened or read. Fatal for the whole batch.
    #[error("Failed to read batch file {path}: {source}")]
    BatchFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The submission command could not be spawned or exited non-zero.
    /// Surfaced as-is, never retried.
    #[error("Job submission failed: {0}")]
    Submission(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Lookup-table inconsistency: malformed rows, duplicate colors,
    /// missing rules or regions.
    #[error("Invalid LUT data: {0}")]
    Lut(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
