//! Folio document engine.
//!
//! [`DocumentEngine`] is the entry point for every document operation. It
//! resolves a [`DocKey`](folio_types::DocKey) to a document directory, holds
//! that document's lock for the whole call, and keeps the change log, the
//! compiled blob and the section tree consistent with each other.

pub mod config;
pub mod engine;
pub mod error;
pub mod locks;
pub mod resolver;

#[cfg(test)]
mod scenarios;

pub use config::EngineConfig;
pub use engine::{DocumentEngine, EditOutcome, SECTION_EDIT_USER};
pub use error::{EngineError, EngineResult, ErrorKind};
pub use locks::LockRegistry;
pub use resolver::{DocResolver, LayoutResolver};

pub use folio_chunks::{AppendOutcome, AppendRequest, DocChunk, DocMeta};
pub use folio_sections::{Section, SectionContent, SectionMeta, SyncDirection};
pub use folio_types::{ChunkOp, DocKey, DocScope};
