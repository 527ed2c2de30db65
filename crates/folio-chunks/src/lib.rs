//! Append-only change log for Folio documents.
//!
//! Every accepted write lands as one [`DocChunk`] in `chunks.ndjson`; the
//! flattened `compiled.md` and the [`DocMeta`] record (version, sequence,
//! dedup window, ETag) are derived from it and can always be regenerated by
//! replaying the active chunks.
//!
//! # Key Types
//!
//! - [`DocStore`] - Append, rebuild, soft-delete, toggle, and squash
//! - [`ChunkLog`] - The newline-delimited JSON log file
//! - [`MetaStore`] - Crash-safe `meta.json` persistence
//! - [`replay`] - Deterministic fold of chunks into compiled text

pub mod error;
pub mod log;
pub mod meta;
pub mod record;
pub mod replay;
pub mod store;

pub use error::{ChunkError, ChunkResult};
pub use log::ChunkLog;
pub use meta::MetaStore;
pub use record::{AppendOutcome, AppendRequest, DocChunk, DocMeta, HashWindow};
pub use replay::{replay, ReplayResult};
pub use store::{DocStore, StoreOptions, DEFAULT_HASH_WINDOW};
