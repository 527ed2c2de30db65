//! Error types for the sections crate.

use std::io;
use std::path::PathBuf;

/// Errors that can occur during section operations.
#[derive(Debug, thiserror::Error)]
pub enum SectionError {
    /// No section carries the given id.
    #[error("section not found: {0}")]
    NotFound(String),

    /// The section title does not occur in the compiled text.
    #[error("section title not found in compiled text: {0}")]
    TitleNotFound(String),

    /// A title that is not a Markdown heading line.
    #[error("invalid section title: {0:?}")]
    InvalidTitle(String),

    /// A section file no longer matches the hash in `sections.json`.
    #[error("hash mismatch for {id}: expected {expected}, computed {actual}")]
    HashMismatch {
        id: String,
        expected: String,
        actual: String,
    },

    /// A section listed in `sections.json` has no body file.
    #[error("section file missing for {id}: {file}")]
    MissingFile { id: String, file: String },

    /// `sections.json` does not exist.
    #[error("section metadata not found: {0}")]
    MissingMeta(PathBuf),

    /// `sections.json` exists but cannot be decoded.
    #[error("corrupt section metadata at {path}: {reason}")]
    CorruptMeta { path: PathBuf, reason: String },

    /// Unknown sync direction name.
    #[error("invalid sync direction: {0}")]
    InvalidDirection(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Convenience alias for section results.
pub type SectionResult<T> = Result<T, SectionError>;
