use folio_types::Digest;

/// Prefix carried by every section hash string.
pub const SECTION_HASH_PREFIX: &str = "blake3:";

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g., `"folio-chunk-v1"`) that is
/// prepended to every hash computation. A chunk and a section body with
/// identical bytes therefore produce different digests.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for change-log chunk content (dedup window entries).
    pub const CHUNK: Self = Self {
        domain: "folio-chunk-v1",
    };
    /// Hasher for the compiled document (document ETag).
    pub const COMPILED: Self = Self {
        domain: "folio-compiled-v1",
    };
    /// Hasher for a single section body.
    pub const SECTION: Self = Self {
        domain: "folio-section-v1",
    };
    /// Hasher for the ordered set of section ids and hashes.
    pub const SECTION_SET: Self = Self {
        domain: "folio-section-set-v1",
    };

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> Digest {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        Digest::from_hash(*hasher.finalize().as_bytes())
    }

    pub fn hash_str(&self, data: &str) -> Digest {
        self.hash(data.as_bytes())
    }

    /// Hash several parts as one stream, in order, without intermediate copies.
    pub fn hash_parts<'a, I>(&self, parts: I) -> Digest
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        for part in parts {
            hasher.update(part);
        }
        Digest::from_hash(*hasher.finalize().as_bytes())
    }

    /// Verify that data produces the expected digest.
    pub fn verify(&self, data: &[u8], expected: &Digest) -> bool {
        self.hash(data) == *expected
    }
}

/// Hex digest of chunk content, stored on the chunk and in the hash window.
pub fn chunk_hash(content: &str) -> String {
    ContentHasher::CHUNK.hash_str(content).to_hex()
}

/// ETag of a compiled document.
pub fn document_etag(compiled: &str) -> String {
    ContentHasher::COMPILED.hash_str(compiled).to_hex()
}

/// Compact digest of a section body: `blake3:` followed by 32 hex characters.
pub fn section_hash(body: &str) -> String {
    format!(
        "{SECTION_HASH_PREFIX}{}",
        ContentHasher::SECTION.hash_str(body).prefix_hex(16)
    )
}

/// ETag over an ordered list of `(section id, section hash)` pairs.
pub fn section_set_etag<'a, I>(entries: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let parts: Vec<&[u8]> = entries
        .into_iter()
        .flat_map(|(id, hash)| [id.as_bytes(), hash.as_bytes()])
        .collect();
    ContentHasher::SECTION_SET.hash_parts(parts).to_hex()
}
