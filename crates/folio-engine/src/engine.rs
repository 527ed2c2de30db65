use std::path::PathBuf;
use std::sync::{Arc, PoisonError};
use std::time::Instant;

use folio_chunks::{AppendOutcome, AppendRequest, DocChunk, DocMeta, DocStore, StoreOptions};
use folio_crypto::section_hash;
use folio_sections::{
    replace_section_range, Section, SectionContent, SectionMeta, SectionStore, SyncDirection,
    SyncManager,
};
use folio_types::layout::write_atomic;
use folio_types::{ChunkOp, DocKey, SectionEdit};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::locks::LockRegistry;
use crate::resolver::{DocResolver, LayoutResolver};

/// User recorded on change-log chunks written by section edits.
pub const SECTION_EDIT_USER: &str = "section_edit";

/// Result of a mutating section call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EditOutcome {
    /// Section metadata after the edit.
    pub sections: SectionMeta,
    /// Document metadata after the edit.
    pub doc: DocMeta,
    /// The section that was updated or inserted, when there is one.
    pub section: Option<Section>,
}

/// Handles of one resolved document, valid while its lock is held.
struct Doc {
    base: PathBuf,
    chunks: DocStore,
    sync: SyncManager,
}

impl Doc {
    fn sections(&self) -> &SectionStore {
        self.sync.store()
    }
}

/// Document engine over a storage root.
///
/// Every call resolves its key, then holds the document lock for the whole
/// operation, reads included.
pub struct DocumentEngine<R = LayoutResolver> {
    resolver: R,
    locks: Arc<LockRegistry>,
    options: StoreOptions,
}

impl DocumentEngine<LayoutResolver> {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            LayoutResolver::new(config.projects_root.clone()),
            config.store_options(),
        )
    }
}

impl<R: DocResolver> DocumentEngine<R> {
    pub fn new(resolver: R, options: StoreOptions) -> Self {
        Self::with_locks(resolver, options, Arc::new(LockRegistry::new()))
    }

    /// Engine sharing `locks` with other engines over the same storage.
    pub fn with_locks(resolver: R, options: StoreOptions, locks: Arc<LockRegistry>) -> Self {
        Self {
            resolver,
            locks,
            options,
        }
    }

    pub fn locks(&self) -> &Arc<LockRegistry> {
        &self.locks
    }

    pub fn resolve(&self, key: &DocKey) -> EngineResult<PathBuf> {
        self.resolver.resolve(key)
    }

    fn with_doc<T>(&self, key: &DocKey, f: impl FnOnce(&Doc) -> EngineResult<T>) -> EngineResult<T> {
        let base = self.resolver.resolve(key)?;
        let lock = self.locks.lock_for(&base);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let doc = Doc {
            chunks: DocStore::new(base.clone(), key.doc_type(), self.options.clone()),
            sync: SyncManager::new(base.clone()),
            base,
        };
        f(&doc)
    }

    // ---------------------------------------------------------------
    // Change log
    // ---------------------------------------------------------------

    /// Append to the change log. A `replace_full` append re-derives the
    /// section tree; if that fails the append still stands.
    pub fn append(&self, key: &DocKey, req: AppendRequest) -> EngineResult<AppendOutcome> {
        self.with_doc(key, |doc| {
            let outcome = doc.chunks.append(req)?;
            if outcome.reparse {
                match doc.sync.sync_from_compiled() {
                    Ok(meta) => debug!(%key, sections = meta.sections.len(), "sections resynced"),
                    Err(e) => warn!(%key, error = %e, "section resync after append failed"),
                }
            }
            Ok(outcome)
        })
    }

    /// Regenerate the compiled blob from the log. Like every operation that
    /// rewrites the blob from the log, an existing section tree is
    /// re-derived afterwards.
    pub fn rebuild(&self, key: &DocKey) -> EngineResult<DocMeta> {
        self.with_doc(key, |doc| {
            let meta = doc.chunks.rebuild()?;
            resync_sections(doc, key);
            Ok(meta)
        })
    }

    pub fn delete_chunk(&self, key: &DocKey, sequence: u64) -> EngineResult<DocMeta> {
        self.with_doc(key, |doc| {
            let meta = doc.chunks.delete(sequence)?;
            resync_sections(doc, key);
            Ok(meta)
        })
    }

    pub fn toggle_chunk(&self, key: &DocKey, sequence: u64) -> EngineResult<DocMeta> {
        self.with_doc(key, |doc| {
            let meta = doc.chunks.toggle(sequence)?;
            resync_sections(doc, key);
            Ok(meta)
        })
    }

    pub fn squash(
        &self,
        key: &DocKey,
        user: &str,
        source: Option<&str>,
        expected_version: Option<u64>,
    ) -> EngineResult<DocMeta> {
        self.with_doc(key, |doc| {
            let meta = doc.chunks.squash(user, source, expected_version)?;
            resync_sections(doc, key);
            Ok(meta)
        })
    }

    pub fn list_chunks(&self, key: &DocKey) -> EngineResult<(Vec<DocChunk>, DocMeta)> {
        self.with_doc(key, |doc| Ok(doc.chunks.list()?))
    }

    pub fn export(&self, key: &DocKey) -> EngineResult<(String, DocMeta)> {
        self.with_doc(key, |doc| Ok(doc.chunks.export()?))
    }

    pub fn doc_meta(&self, key: &DocKey) -> EngineResult<DocMeta> {
        self.with_doc(key, |doc| Ok(doc.chunks.meta()?))
    }

    // ---------------------------------------------------------------
    // Sections
    // ---------------------------------------------------------------

    /// Section metadata, derived from the compiled blob on first access.
    pub fn get_sections(&self, key: &DocKey) -> EngineResult<SectionMeta> {
        self.with_doc(key, load_sections)
    }

    pub fn get_section(
        &self,
        key: &DocKey,
        id: &str,
        include_children: bool,
    ) -> EngineResult<SectionContent> {
        self.with_doc(key, |doc| {
            let meta = load_sections(doc)?;
            section_content(doc, &meta, id, include_children)
        })
    }

    /// Replace the body of one section.
    pub fn update_section(
        &self,
        key: &DocKey,
        id: &str,
        content: &str,
        expected_version: Option<u64>,
    ) -> EngineResult<EditOutcome> {
        self.with_doc(key, |doc| {
            let start = Instant::now();
            let mut meta = load_sections(doc)?;
            check_version(&meta, expected_version)?;

            let mut section = meta.get(id)?.clone();
            let body = content.trim();
            doc.sections().write_section_file(&section, body)?;
            section.hash = section_hash(body);
            meta.update_section(section.clone())?;
            doc.sections().save_meta(&meta)?;

            let doc_meta = record(doc, SectionEdit::Update, "update_section")?;
            info!(
                %key,
                id,
                version = meta.version,
                doc_version = doc_meta.version,
                dur_ms = start.elapsed().as_millis() as u64,
                "section updated"
            );
            Ok(EditOutcome {
                sections: meta,
                doc: doc_meta,
                section: Some(section),
            })
        })
    }

    /// Insert a new section after `after_id`, or at the end.
    pub fn insert_section(
        &self,
        key: &DocKey,
        title: &str,
        content: &str,
        after_id: Option<&str>,
        expected_version: Option<u64>,
    ) -> EngineResult<EditOutcome> {
        self.with_doc(key, |doc| {
            let start = Instant::now();
            let mut meta = load_sections(doc)?;
            check_version(&meta, expected_version)?;

            let section = meta.insert_section(title, content, after_id)?;
            doc.sections().write_section_file(&section, content.trim())?;
            doc.sections().save_meta(&meta)?;

            let doc_meta = record(doc, SectionEdit::Insert, "insert_section")?;
            info!(
                %key,
                id = %section.id,
                after = after_id.unwrap_or("-"),
                version = meta.version,
                doc_version = doc_meta.version,
                dur_ms = start.elapsed().as_millis() as u64,
                "section inserted"
            );
            Ok(EditOutcome {
                sections: meta,
                doc: doc_meta,
                section: Some(section),
            })
        })
    }

    /// Delete a section, with `cascade` its whole subtree. File removals
    /// are best effort.
    pub fn delete_section(
        &self,
        key: &DocKey,
        id: &str,
        cascade: bool,
        expected_version: Option<u64>,
    ) -> EngineResult<EditOutcome> {
        self.with_doc(key, |doc| {
            let start = Instant::now();
            let mut meta = load_sections(doc)?;
            check_version(&meta, expected_version)?;

            let removed = meta.remove_section(id, cascade)?;
            remove_files(doc, &removed);
            doc.sections().save_meta(&meta)?;

            let doc_meta = record(doc, SectionEdit::Delete, "delete_section")?;
            info!(
                %key,
                id,
                cascade,
                removed = removed.len(),
                version = meta.version,
                doc_version = doc_meta.version,
                dur_ms = start.elapsed().as_millis() as u64,
                "section deleted"
            );
            Ok(EditOutcome {
                sections: meta,
                doc: doc_meta,
                section: None,
            })
        })
    }

    /// Replace a section and its subtree with `full_content`, exactly as
    /// the caller sees that range in the compiled text, then re-derive the
    /// section tree.
    pub fn update_section_full(
        &self,
        key: &DocKey,
        id: &str,
        full_content: &str,
        expected_version: Option<u64>,
    ) -> EngineResult<EditOutcome> {
        self.with_doc(key, |doc| {
            let start = Instant::now();
            let mut meta = load_sections(doc)?;
            check_version(&meta, expected_version)?;

            let section = meta.get(id)?.clone();
            let occurrence = meta.title_occurrence(id)?;
            let compiled = doc.chunks.compiled()?.unwrap_or_default();
            let spliced = replace_section_range(
                &compiled,
                &section,
                meta.root_level,
                occurrence,
                full_content,
            )?;

            let removed = meta.remove_section(id, true)?;
            remove_files(doc, &removed);
            doc.sections().save_meta(&meta)?;

            write_atomic(&doc.chunks.layout().compiled(), spliced.as_bytes(), false)?;
            let outcome = doc.chunks.append(
                AppendRequest::new(spliced.as_str())
                    .op(section_op(SectionEdit::Full, &spliced))
                    .user(SECTION_EDIT_USER)
                    .source("update_section_full")
                    .skip_dedup(),
            )?;

            let sections = doc.sync.sync_from_compiled()?;
            info!(
                %key,
                id,
                replaced = removed.len(),
                sections = sections.sections.len(),
                version = sections.version,
                doc_version = outcome.meta.version,
                dur_ms = start.elapsed().as_millis() as u64,
                "section range replaced"
            );
            Ok(EditOutcome {
                sections,
                doc: outcome.meta,
                section: None,
            })
        })
    }

    /// Move one section after `after_id`, or to the end. Only the section
    /// tree and compiled blob change; the change log is not written.
    pub fn reorder_section(
        &self,
        key: &DocKey,
        id: &str,
        after_id: Option<&str>,
        expected_version: Option<u64>,
    ) -> EngineResult<EditOutcome> {
        self.with_doc(key, |doc| {
            let mut meta = load_sections(doc)?;
            check_version(&meta, expected_version)?;

            meta.move_section(id, after_id)?;
            doc.sections().save_meta(&meta)?;
            doc.sync.sync_to_compiled()?;

            let doc_meta = doc.chunks.meta()?;
            info!(%key, id, after = after_id.unwrap_or("-"), version = meta.version, "section moved");
            Ok(EditOutcome {
                section: Some(meta.get(id)?.clone()),
                sections: meta,
                doc: doc_meta,
            })
        })
    }

    /// Force a sync in `direction` and return the resulting section tree.
    pub fn sync_sections(&self, key: &DocKey, direction: SyncDirection) -> EngineResult<SectionMeta> {
        self.with_doc(key, |doc| {
            doc.sync.force_sync(direction)?;
            info!(%key, %direction, "sections synced");
            Ok(doc
                .sections()
                .load_meta_optional()?
                .unwrap_or_else(|| SectionMeta::empty(0)))
        })
    }

    /// Sync whichever side is stale by modification time.
    pub fn auto_sync(&self, key: &DocKey) -> EngineResult<Option<SyncDirection>> {
        self.with_doc(key, |doc| Ok(doc.sync.auto_sync()?))
    }

    /// Verify every section file against its recorded hash.
    pub fn validate_sections(&self, key: &DocKey) -> EngineResult<SectionMeta> {
        self.with_doc(key, |doc| {
            let meta = load_sections(doc)?;
            doc.sections().validate(&meta)?;
            debug!(base = %doc.base.display(), sections = meta.sections.len(), "sections valid");
            Ok(meta)
        })
    }
}

fn check_version(meta: &SectionMeta, expected: Option<u64>) -> EngineResult<()> {
    match expected {
        Some(expected) if expected != meta.version => Err(EngineError::VersionMismatch {
            expected,
            actual: meta.version,
        }),
        _ => Ok(()),
    }
}

fn load_sections(doc: &Doc) -> EngineResult<SectionMeta> {
    if doc.sections().meta_exists() {
        return Ok(doc.sections().load_meta()?);
    }
    if doc.chunks.layout().compiled().exists() {
        debug!(base = %doc.base.display(), "deriving sections on first access");
        return Ok(doc.sync.sync_from_compiled()?);
    }
    Ok(SectionMeta::empty(0))
}

fn section_content(
    doc: &Doc,
    meta: &SectionMeta,
    id: &str,
    include_children: bool,
) -> EngineResult<SectionContent> {
    let section = meta.get(id)?.clone();
    let content = doc.sections().read_section_file(&section)?;
    let children_content = if include_children {
        section
            .children
            .iter()
            .map(|child| section_content(doc, meta, child, true))
            .collect::<EngineResult<Vec<_>>>()?
    } else {
        Vec::new()
    };
    Ok(SectionContent {
        section,
        content,
        children_content,
    })
}

fn remove_files(doc: &Doc, removed: &[Section]) {
    for section in removed {
        if let Err(e) = doc.sections().delete_section_file(section) {
            warn!(id = %section.id, error = %e, "section file not removed");
        }
    }
}

/// Op recorded for a section edit. A document emptied by the edit is
/// recorded as an explicit clear.
fn section_op(kind: SectionEdit, compiled: &str) -> ChunkOp {
    if compiled.trim().is_empty() {
        ChunkOp::ReplaceFull
    } else {
        ChunkOp::Section(kind)
    }
}

/// Regenerate the compiled blob from the section files and record it in
/// the change log without re-deriving sections.
///
/// The blob is already on disk, so the append bypasses the dedup window;
/// the log and `meta.json` always end up describing the written blob.
fn record(doc: &Doc, kind: SectionEdit, source: &str) -> EngineResult<DocMeta> {
    let compiled = doc.sync.sync_to_compiled()?;
    let op = section_op(kind, &compiled);
    let outcome = doc.chunks.append(
        AppendRequest::new(compiled)
            .op(op)
            .user(SECTION_EDIT_USER)
            .source(source)
            .skip_dedup(),
    )?;
    Ok(outcome.meta)
}

/// Re-derive an existing section tree after the log rewrote the blob.
/// Documents never read through sections are left alone; a failure is
/// logged and the log operation stands.
fn resync_sections(doc: &Doc, key: &DocKey) {
    if !doc.sections().meta_exists() {
        return;
    }
    match doc.sync.sync_from_compiled() {
        Ok(meta) => debug!(%key, sections = meta.sections.len(), "sections resynced"),
        Err(e) => warn!(%key, error = %e, "section resync after log rewrite failed"),
    }
}
