//! Persisted records of the change log.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use folio_types::ChunkOp;
use serde::{Deserialize, Serialize};

/// One immutable change-log entry. Only `active` changes after the write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocChunk {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub op: ChunkOp,
    pub content: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub source: String,
    pub hash: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Bounded FIFO of recent content hashes used to drop duplicate appends.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashWindow(VecDeque<String>);

impl HashWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Window holding the last `cap` of `hashes`.
    pub fn from_tail<I>(hashes: I, cap: usize) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut window = Self::new();
        for hash in hashes {
            window.push(hash, cap);
        }
        window
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.0.iter().any(|h| h == hash)
    }

    /// Push `hash`, evicting the oldest entries beyond `cap`.
    pub fn push(&mut self, hash: String, cap: usize) {
        self.0.push_back(hash);
        while self.0.len() > cap.max(1) {
            self.0.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Document metadata stored in `meta.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMeta {
    pub version: u64,
    pub last_sequence: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub doc_type: String,
    #[serde(default)]
    pub hash_window: HashWindow,
    pub chunk_count: u64,
    pub deleted_count: u64,
    #[serde(default)]
    pub etag: String,
}

impl DocMeta {
    /// Metadata of a document that has never been written.
    pub fn init(doc_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            version: 0,
            last_sequence: 0,
            created_at: now,
            updated_at: now,
            doc_type: doc_type.into(),
            hash_window: HashWindow::new(),
            chunk_count: 0,
            deleted_count: 0,
            etag: String::new(),
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Input of [`crate::DocStore::append`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppendRequest {
    pub content: String,
    pub op: ChunkOp,
    pub user: String,
    pub source: String,
    pub expected_version: Option<u64>,
    /// Record the chunk even when its hash is in the dedup window.
    pub skip_dedup: bool,
}

impl AppendRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn op(mut self, op: impl Into<ChunkOp>) -> Self {
        self.op = op.into();
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn expect_version(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }

    /// Bypass the dedup window. Used when `compiled.md` already holds the
    /// content, so the log and metadata must catch up with it.
    pub fn skip_dedup(mut self) -> Self {
        self.skip_dedup = true;
        self
    }
}

/// Result of an append.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AppendOutcome {
    pub meta: DocMeta,
    /// The written chunk; `None` for a duplicate.
    pub chunk: Option<DocChunk>,
    pub duplicate: bool,
    /// The caller should re-derive sections from the compiled blob.
    pub reparse: bool,
}
