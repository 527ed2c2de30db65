use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use folio_crypto::{chunk_hash, document_etag};
use folio_types::layout::{read_optional, write_atomic};
use folio_types::{ChunkOp, DocLayout};
use tracing::{debug, info};

use crate::error::{ChunkError, ChunkResult};
use crate::log::ChunkLog;
use crate::meta::MetaStore;
use crate::record::{AppendOutcome, AppendRequest, DocChunk, DocMeta, HashWindow};
use crate::replay::{apply_one, replay};

/// Default number of recent content hashes kept for deduplication.
pub const DEFAULT_HASH_WINDOW: usize = 10;

const SQUASH_SOURCE: &str = "squash";

/// Tunables of a [`DocStore`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreOptions {
    /// Size of the dedup hash window.
    pub hash_window: usize,
    /// Sync the log and metadata to disk before returning.
    pub fsync: bool,
    /// Source recorded on chunks appended without one.
    pub default_source: String,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            hash_window: DEFAULT_HASH_WINDOW,
            fsync: true,
            default_source: "api".into(),
        }
    }
}

/// Change-log store of one document directory.
///
/// Operations are synchronous and take no locks; callers serialize access
/// per document.
pub struct DocStore {
    layout: DocLayout,
    doc_type: String,
    options: StoreOptions,
    log: ChunkLog,
    metas: MetaStore,
}

impl DocStore {
    pub fn new(base: impl Into<PathBuf>, doc_type: impl Into<String>, options: StoreOptions) -> Self {
        let layout = DocLayout::new(base);
        let log = ChunkLog::new(layout.chunks(), options.fsync);
        let metas = MetaStore::new(layout.meta(), options.fsync);
        Self {
            layout,
            doc_type: doc_type.into(),
            options,
            log,
            metas,
        }
    }

    pub fn base(&self) -> &Path {
        self.layout.base()
    }

    pub fn layout(&self) -> &DocLayout {
        &self.layout
    }

    /// Stored metadata, or the initial record for a new document.
    pub fn meta(&self) -> ChunkResult<DocMeta> {
        self.metas.load_or_init(&self.doc_type)
    }

    /// Current compiled text, `None` when the document has none yet.
    pub fn compiled(&self) -> ChunkResult<Option<String>> {
        Ok(read_optional(&self.layout.compiled())?)
    }

    /// Record one write.
    ///
    /// A content hash already present in the window is reported as a
    /// duplicate and nothing is written, unless the request skips dedup.
    pub fn append(&self, req: AppendRequest) -> ChunkResult<AppendOutcome> {
        let start = Instant::now();

        if req.content.trim().is_empty() && !req.op.allows_empty() {
            return Err(ChunkError::EmptyContent {
                op: req.op.to_string(),
            });
        }

        let mut meta = self.meta()?;
        if let Some(expected) = req.expected_version {
            if expected != meta.version {
                return Err(ChunkError::VersionMismatch {
                    expected,
                    actual: meta.version,
                });
            }
        }

        let hash = chunk_hash(&req.content);
        if !req.skip_dedup && meta.hash_window.contains(&hash) {
            info!(
                doc_type = %self.doc_type,
                seq = meta.last_sequence,
                version = meta.version,
                op = %req.op,
                duplicate = true,
                content_size = req.content.len(),
                dur_ms = start.elapsed().as_millis() as u64,
                "chunk append"
            );
            return Ok(AppendOutcome {
                meta,
                chunk: None,
                duplicate: true,
                reparse: false,
            });
        }

        let source = if req.source.is_empty() {
            self.options.default_source.clone()
        } else {
            req.source
        };
        let chunk = DocChunk {
            sequence: meta.last_sequence + 1,
            timestamp: Utc::now(),
            op: req.op,
            content: req.content,
            user: req.user,
            source,
            hash: hash.clone(),
            active: true,
        };

        self.log.append(&chunk)?;

        let current = self.compiled()?;
        let compiled = apply_one(current.as_deref(), &chunk);
        write_atomic(&self.layout.compiled(), compiled.as_bytes(), false)?;

        meta.version += 1;
        meta.last_sequence = chunk.sequence;
        meta.hash_window.push(hash, self.options.hash_window);
        meta.chunk_count += 1;
        meta.etag = document_etag(&compiled);
        meta.touch();
        self.metas.save(&meta)?;

        let reparse = chunk.op.requires_reparse();
        info!(
            doc_type = %self.doc_type,
            seq = chunk.sequence,
            version = meta.version,
            op = %chunk.op,
            duplicate = false,
            content_size = chunk.content.len(),
            compiled_size = compiled.len(),
            total_chunks = meta.chunk_count,
            dur_ms = start.elapsed().as_millis() as u64,
            "chunk append"
        );

        Ok(AppendOutcome {
            meta,
            chunk: Some(chunk),
            duplicate: false,
            reparse,
        })
    }

    /// Regenerate the compiled blob and derived metadata from the log.
    ///
    /// Deterministic and idempotent; the version is left alone.
    pub fn rebuild(&self) -> ChunkResult<DocMeta> {
        self.rebuild_inner(false)
    }

    /// Soft-delete chunk `sequence`. Deleting an inactive chunk is a no-op.
    pub fn delete(&self, sequence: u64) -> ChunkResult<DocMeta> {
        let was_active = self.log.update_active(sequence, |_| false)?;
        if !was_active {
            debug!(seq = sequence, "chunk already inactive");
            return self.meta();
        }
        let meta = self.rebuild_inner(true)?;
        info!(doc_type = %self.doc_type, seq = sequence, version = meta.version, "chunk deleted");
        Ok(meta)
    }

    /// Flip the `active` flag of chunk `sequence`.
    pub fn toggle(&self, sequence: u64) -> ChunkResult<DocMeta> {
        let was_active = self.log.update_active(sequence, |active| !active)?;
        let meta = self.rebuild_inner(true)?;
        info!(
            doc_type = %self.doc_type,
            seq = sequence,
            active = !was_active,
            version = meta.version,
            deleted_chunks = meta.deleted_count,
            "chunk toggled"
        );
        Ok(meta)
    }

    /// Compact the log into a single `replace_full` chunk holding the
    /// current compiled text. The previous log is archived beside it.
    pub fn squash(
        &self,
        user: &str,
        source: Option<&str>,
        expected_version: Option<u64>,
    ) -> ChunkResult<DocMeta> {
        let start = Instant::now();

        let current = self.meta()?;
        if let Some(expected) = expected_version {
            if expected != current.version {
                return Err(ChunkError::VersionMismatch {
                    expected,
                    actual: current.version,
                });
            }
        }

        let mut meta = self.rebuild_inner(false)?;
        let merged = self.compiled()?.unwrap_or_default();

        let backup = self.backup_path();
        self.log.archive(&backup)?;

        let hash = chunk_hash(&merged);
        let chunk = DocChunk {
            sequence: meta.last_sequence + 1,
            timestamp: Utc::now(),
            op: ChunkOp::ReplaceFull,
            content: merged,
            user: user.to_string(),
            source: source
                .filter(|s| !s.is_empty())
                .unwrap_or(SQUASH_SOURCE)
                .to_string(),
            hash: hash.clone(),
            active: true,
        };
        self.log.replace(std::slice::from_ref(&chunk))?;
        write_atomic(&self.layout.compiled(), chunk.content.as_bytes(), false)?;

        meta.version += 1;
        meta.last_sequence = chunk.sequence;
        meta.chunk_count = 1;
        meta.deleted_count = 0;
        meta.hash_window = HashWindow::from_tail([hash], self.options.hash_window);
        meta.etag = document_etag(&chunk.content);
        meta.touch();
        self.metas.save(&meta)?;

        info!(
            doc_type = %self.doc_type,
            seq = chunk.sequence,
            version = meta.version,
            merged_size = chunk.content.len(),
            backup = %backup.display(),
            dur_ms = start.elapsed().as_millis() as u64,
            "chunk log squashed"
        );
        Ok(meta)
    }

    /// Every decodable chunk in log order, with the current metadata.
    pub fn list(&self) -> ChunkResult<(Vec<DocChunk>, DocMeta)> {
        let chunks = self.log.read_all()?;
        Ok((chunks, self.meta()?))
    }

    /// Compiled text (empty when absent) with the current metadata.
    pub fn export(&self) -> ChunkResult<(String, DocMeta)> {
        let compiled = self.compiled()?.unwrap_or_default();
        Ok((compiled, self.meta()?))
    }

    fn rebuild_inner(&self, bump_version: bool) -> ChunkResult<DocMeta> {
        let start = Instant::now();
        let mut meta = self.meta()?;
        let chunks = self.log.read_all()?;
        let result = replay(&chunks, self.options.hash_window);

        write_atomic(&self.layout.compiled(), result.compiled.as_bytes(), false)?;

        if bump_version {
            meta.version += 1;
        }
        meta.last_sequence = meta.last_sequence.max(result.last_sequence);
        meta.chunk_count = result.chunk_count;
        meta.deleted_count = result.deleted_count;
        meta.hash_window = result.hash_window;
        meta.etag = document_etag(&result.compiled);
        meta.touch();
        self.metas.save(&meta)?;

        info!(
            doc_type = %self.doc_type,
            version = meta.version,
            total_chunks = result.chunk_count,
            active_chunks = result.active_count,
            deleted_chunks = result.deleted_count,
            compiled_size = result.compiled.len(),
            dur_ms = start.elapsed().as_millis() as u64,
            "compiled rebuilt"
        );
        Ok(meta)
    }

    fn backup_path(&self) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S").to_string();
        let mut candidate = self.layout.chunks_backup(&stamp);
        let mut n = 1;
        while candidate.exists() {
            candidate = self.layout.chunks_backup(&format!("{stamp}-{n}"));
            n += 1;
        }
        candidate
    }
}
