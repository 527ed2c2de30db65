use std::io;
use std::path::PathBuf;

/// Errors produced by the change-log store.
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    /// The caller's expected version is stale.
    #[error("version_mismatch: expected {expected}, current {actual}")]
    VersionMismatch { expected: u64, actual: u64 },

    /// Whitespace-only content submitted with an op other than `replace_full`.
    #[error("empty_content: refusing to append empty content with op {op}")]
    EmptyContent { op: String },

    /// No chunk carries the requested sequence number.
    #[error("chunk not found: seq {0}")]
    ChunkNotFound(u64),

    /// `meta.json` exists but cannot be decoded.
    #[error("corrupt document metadata at {path}: {reason}")]
    CorruptMeta { path: PathBuf, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Convenience alias used throughout the chunks crate.
pub type ChunkResult<T> = std::result::Result<T, ChunkError>;
