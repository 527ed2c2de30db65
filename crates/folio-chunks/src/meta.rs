use std::path::{Path, PathBuf};

use folio_types::layout::{read_optional, write_atomic};
use tracing::debug;

use crate::error::{ChunkError, ChunkResult};
use crate::record::DocMeta;

/// Crash-safe persistence of `meta.json`.
///
/// Saves go through a sibling temp file and a rename, so a crash leaves
/// either the previous or the new metadata in place.
pub struct MetaStore {
    path: PathBuf,
    fsync: bool,
}

impl MetaStore {
    pub fn new(path: impl Into<PathBuf>, fsync: bool) -> Self {
        Self {
            path: path.into(),
            fsync,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored metadata, or the initial record when none exists.
    ///
    /// An unreadable record is reported, never replaced by the initial one.
    pub fn load_or_init(&self, doc_type: &str) -> ChunkResult<DocMeta> {
        match read_optional(&self.path)? {
            None => Ok(DocMeta::init(doc_type)),
            Some(text) => serde_json::from_str(&text).map_err(|e| ChunkError::CorruptMeta {
                path: self.path.clone(),
                reason: e.to_string(),
            }),
        }
    }

    pub fn save(&self, meta: &DocMeta) -> ChunkResult<()> {
        let data = serde_json::to_vec_pretty(meta)?;
        write_atomic(&self.path, &data, self.fsync)?;
        debug!(path = %self.path.display(), version = meta.version, "meta saved");
        Ok(())
    }
}
