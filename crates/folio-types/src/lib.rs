//! Foundation types for Folio.
//!
//! This crate provides the identifiers shared by every other Folio crate:
//! content digests, chunk operation tags, and the keys that address a
//! document on disk.
//!
//! # Key Types
//!
//! - [`Digest`] - BLAKE3 content digest
//! - [`ChunkOp`] - Operation tag recorded on every change-log chunk
//! - [`DocKey`] - Logical or path-based document address
//! - [`DocScope`] - The scope a logical document key lives in
//! - [`DocLayout`] - File paths of one document directory

pub mod digest;
pub mod error;
pub mod key;
pub mod layout;
pub mod op;

pub use digest::Digest;
pub use error::TypeError;
pub use key::{DocKey, DocScope};
pub use layout::DocLayout;
pub use op::{ChunkOp, SectionEdit};
