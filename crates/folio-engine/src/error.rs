use std::fmt;
use std::io;

use folio_chunks::ChunkError;
use folio_sections::SectionError;
use folio_types::TypeError;
use serde::Serialize;

/// Errors surfaced by the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The caller's expected section version is stale.
    #[error("version_mismatch: expected {expected}, current {actual}")]
    VersionMismatch { expected: u64, actual: u64 },

    #[error("invalid document key: {0}")]
    Key(#[from] TypeError),

    #[error(transparent)]
    Chunk(#[from] ChunkError),

    #[error(transparent)]
    Section(#[from] SectionError),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Stable classification of an [`EngineError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    VersionMismatch,
    NotFound,
    EmptyContent,
    Invalid,
    HashMismatch,
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VersionMismatch => "version_mismatch",
            Self::NotFound => "not_found",
            Self::EmptyContent => "empty_content",
            Self::Invalid => "invalid",
            Self::HashMismatch => "hash_mismatch",
            Self::Io => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::VersionMismatch { .. } => ErrorKind::VersionMismatch,
            Self::Key(_) | Self::Config(_) => ErrorKind::Invalid,
            Self::Io(_) => ErrorKind::Io,
            Self::Chunk(e) => match e {
                ChunkError::VersionMismatch { .. } => ErrorKind::VersionMismatch,
                ChunkError::EmptyContent { .. } => ErrorKind::EmptyContent,
                ChunkError::ChunkNotFound(_) => ErrorKind::NotFound,
                ChunkError::CorruptMeta { .. } | ChunkError::Serialization(_) => {
                    ErrorKind::Invalid
                }
                ChunkError::Io(_) => ErrorKind::Io,
            },
            Self::Section(e) => match e {
                SectionError::NotFound(_)
                | SectionError::TitleNotFound(_)
                | SectionError::MissingFile { .. }
                | SectionError::MissingMeta(_) => ErrorKind::NotFound,
                SectionError::HashMismatch { .. } => ErrorKind::HashMismatch,
                SectionError::InvalidTitle(_)
                | SectionError::InvalidDirection(_)
                | SectionError::CorruptMeta { .. }
                | SectionError::Serialization(_) => ErrorKind::Invalid,
                SectionError::Io(_) => ErrorKind::Io,
            },
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
