//! Content addressing for Folio.
//!
//! Every digest the engine persists (chunk hashes, document ETags, section
//! hashes, section-set ETags) is produced here with a domain-separated
//! BLAKE3 hasher, so the same bytes hashed for two purposes never collide.

pub mod hasher;

pub use hasher::{
    chunk_hash, document_etag, section_hash, section_set_etag, ContentHasher, SECTION_HASH_PREFIX,
};
