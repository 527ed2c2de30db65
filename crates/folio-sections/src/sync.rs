use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;

use folio_types::layout::write_atomic;
use folio_types::DocLayout;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{SectionError, SectionResult};
use crate::model::SectionMeta;
use crate::parser::parse_document;
use crate::store::SectionStore;

/// Which representation is the source of a sync.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// Re-derive sections from `compiled.md`.
    FromCompiled,
    /// Regenerate `compiled.md` from the section files.
    ToCompiled,
}

impl SyncDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FromCompiled => "from_compiled",
            Self::ToCompiled => "to_compiled",
        }
    }
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncDirection {
    type Err = SectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "from_compiled" => Ok(Self::FromCompiled),
            "to_compiled" => Ok(Self::ToCompiled),
            other => Err(SectionError::InvalidDirection(other.to_string())),
        }
    }
}

/// Keeps `compiled.md` and the section files of one document in step.
pub struct SyncManager {
    layout: DocLayout,
    store: SectionStore,
}

impl SyncManager {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        Self {
            layout: DocLayout::new(base.clone()),
            store: SectionStore::new(base),
        }
    }

    pub fn store(&self) -> &SectionStore {
        &self.store
    }

    /// Rebuild the section tree from the compiled blob.
    ///
    /// The sections directory is recreated from scratch. The new metadata
    /// version is one past the stored version, so callers holding an older
    /// version see a mismatch.
    pub fn sync_from_compiled(&self) -> SectionResult<SectionMeta> {
        let compiled = fs::read_to_string(self.layout.compiled())?;
        let previous = match self.store.load_meta_optional() {
            Ok(meta) => meta.map_or(0, |m| m.version),
            Err(e) => {
                warn!(error = %e, "unreadable section meta; restarting version");
                0
            }
        };

        let parsed = parse_document(&compiled);
        let mut meta = parsed.meta;
        meta.version = previous + 1;
        meta.touch();

        self.store.clear_sections_dir()?;
        fs::create_dir_all(self.store.sections_dir())?;
        for (section, body) in meta.sections.iter().zip(&parsed.bodies) {
            self.store.write_section_file(section, body)?;
        }
        self.store.save_meta(&meta)?;

        info!(
            sections = meta.sections.len(),
            version = meta.version,
            compiled_size = compiled.len(),
            "sections derived from compiled"
        );
        Ok(meta)
    }

    /// Regenerate the compiled blob from `sections.json` and the section
    /// files. Returns the new compiled text.
    pub fn sync_to_compiled(&self) -> SectionResult<String> {
        let meta = self.store.load_meta()?;
        let compiled = self.store.compile(&meta)?;
        write_atomic(&self.layout.compiled(), compiled.as_bytes(), false)?;
        debug!(
            sections = meta.sections.len(),
            compiled_size = compiled.len(),
            "compiled regenerated from sections"
        );
        Ok(compiled)
    }

    /// Direction a sync should run in, judged by which files exist and
    /// which was modified last. `None` when the two agree.
    pub fn check_need_sync(&self) -> SectionResult<Option<SyncDirection>> {
        let compiled = modified(&self.layout.compiled())?;
        let sections = modified(&self.layout.sections_meta())?;
        Ok(match (compiled, sections) {
            (None, None) => None,
            (Some(_), None) => Some(SyncDirection::FromCompiled),
            (None, Some(_)) => Some(SyncDirection::ToCompiled),
            (Some(c), Some(s)) if c > s => Some(SyncDirection::FromCompiled),
            (Some(c), Some(s)) if s > c => Some(SyncDirection::ToCompiled),
            _ => None,
        })
    }

    pub fn force_sync(&self, direction: SyncDirection) -> SectionResult<()> {
        match direction {
            SyncDirection::FromCompiled => self.sync_from_compiled().map(|_| ()),
            SyncDirection::ToCompiled => self.sync_to_compiled().map(|_| ()),
        }
    }

    /// Run whichever sync [`check_need_sync`](Self::check_need_sync)
    /// reports. Modification times are coarse; explicit syncs are the
    /// primary path.
    pub fn auto_sync(&self) -> SectionResult<Option<SyncDirection>> {
        let direction = self.check_need_sync()?;
        if let Some(direction) = direction {
            debug!(%direction, "auto sync");
            self.force_sync(direction)?;
        }
        Ok(direction)
    }
}

fn modified(path: &Path) -> SectionResult<Option<SystemTime>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(meta.modified()?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn write_compiled(dir: &std::path::Path, text: &str) {
        fs::write(dir.join("compiled.md"), text).unwrap();
    }

    #[test]
    fn from_compiled_writes_files_and_meta() {
        let dir = tempfile::tempdir().unwrap();
        write_compiled(dir.path(), "# A\n\nalpha\n\n## B\n\nbeta");
        let sync = SyncManager::new(dir.path());

        let meta = sync.sync_from_compiled().unwrap();
        assert_eq!(meta.version, 1);
        assert_eq!(meta.sections.len(), 2);
        assert_eq!(
            fs::read_to_string(dir.path().join("sections/section_002.md")).unwrap(),
            "beta"
        );
        sync.store().validate(&meta).unwrap();

        let again = sync.sync_from_compiled().unwrap();
        assert_eq!(again.version, 2);
        assert_eq!(again.etag, meta.etag);
    }

    #[test]
    fn stale_section_files_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        write_compiled(dir.path(), "# A\na\n# B\nb\n# C\nc");
        let sync = SyncManager::new(dir.path());
        sync.sync_from_compiled().unwrap();

        write_compiled(dir.path(), "# A\na");
        sync.sync_from_compiled().unwrap();
        assert!(!dir.path().join("sections/section_003.md").exists());
    }

    #[test]
    fn roundtrip_preserves_text() {
        let dir = tempfile::tempdir().unwrap();
        let text = "# A\n\nalpha\n\n## B\n\nbeta\n\n```\n# code\n```\n\n# C\n\ngamma";
        write_compiled(dir.path(), text);
        let sync = SyncManager::new(dir.path());
        sync.sync_from_compiled().unwrap();
        assert_eq!(sync.sync_to_compiled().unwrap(), text);
        assert_eq!(fs::read_to_string(dir.path().join("compiled.md")).unwrap(), text);
    }

    #[test]
    fn need_sync_by_presence() {
        let dir = tempfile::tempdir().unwrap();
        let sync = SyncManager::new(dir.path());
        assert_eq!(sync.check_need_sync().unwrap(), None);
        assert_eq!(sync.auto_sync().unwrap(), None);

        write_compiled(dir.path(), "# A\nx");
        assert_eq!(sync.check_need_sync().unwrap(), Some(SyncDirection::FromCompiled));
        assert_eq!(sync.auto_sync().unwrap(), Some(SyncDirection::FromCompiled));
        assert!(dir.path().join("sections.json").exists());

        fs::remove_file(dir.path().join("compiled.md")).unwrap();
        assert_eq!(sync.check_need_sync().unwrap(), Some(SyncDirection::ToCompiled));
    }

    #[test]
    fn need_sync_by_mtime() {
        let dir = tempfile::tempdir().unwrap();
        write_compiled(dir.path(), "# A\nx");
        let sync = SyncManager::new(dir.path());
        sync.sync_from_compiled().unwrap();

        let later = SystemTime::now() + Duration::from_secs(60);
        let file = fs::File::options()
            .write(true)
            .open(dir.path().join("compiled.md"))
            .unwrap();
        file.set_modified(later).unwrap();
        assert_eq!(sync.check_need_sync().unwrap(), Some(SyncDirection::FromCompiled));
    }

    #[test]
    fn direction_parsing() {
        assert_eq!("to_compiled".parse::<SyncDirection>().unwrap(), SyncDirection::ToCompiled);
        assert!(matches!(
            "sideways".parse::<SyncDirection>(),
            Err(SectionError::InvalidDirection(_))
        ));
        assert_eq!(SyncDirection::FromCompiled.to_string(), "from_compiled");
    }
}
