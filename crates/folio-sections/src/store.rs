use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use folio_crypto::section_hash;
use folio_types::layout::{read_optional, write_atomic};
use folio_types::DocLayout;
use tracing::debug;

use crate::error::{SectionError, SectionResult};
use crate::model::{Section, SectionMeta};

/// Section files and `sections.json` of one document directory.
pub struct SectionStore {
    layout: DocLayout,
}

impl SectionStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            layout: DocLayout::new(base),
        }
    }

    pub fn layout(&self) -> &DocLayout {
        &self.layout
    }

    pub fn sections_dir(&self) -> PathBuf {
        self.layout.sections_dir()
    }

    fn file_path(&self, section: &Section) -> PathBuf {
        self.layout.sections_dir().join(&section.file)
    }

    pub fn write_section_file(&self, section: &Section, content: &str) -> SectionResult<()> {
        write_atomic(&self.file_path(section), content.as_bytes(), false)?;
        debug!(id = %section.id, len = content.len(), "section file written");
        Ok(())
    }

    pub fn read_section_file(&self, section: &Section) -> SectionResult<String> {
        read_optional(&self.file_path(section))?.ok_or_else(|| SectionError::MissingFile {
            id: section.id.clone(),
            file: section.file.clone(),
        })
    }

    /// Remove a section file. A file that is already gone is not an error.
    pub fn delete_section_file(&self, section: &Section) -> SectionResult<()> {
        match fs::remove_file(self.file_path(section)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove every section file.
    pub fn clear_sections_dir(&self) -> SectionResult<()> {
        match fs::remove_dir_all(self.sections_dir()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn meta_exists(&self) -> bool {
        self.layout.sections_meta().exists()
    }

    pub fn load_meta(&self) -> SectionResult<SectionMeta> {
        let path = self.layout.sections_meta();
        self.load_meta_optional()?
            .ok_or(SectionError::MissingMeta(path))
    }

    pub fn load_meta_optional(&self) -> SectionResult<Option<SectionMeta>> {
        let path = self.layout.sections_meta();
        let Some(text) = read_optional(&path)? else {
            return Ok(None);
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| SectionError::CorruptMeta {
                path,
                reason: e.to_string(),
            })
    }

    /// Overwrite `sections.json` with pretty-printed JSON.
    pub fn save_meta(&self, meta: &SectionMeta) -> SectionResult<()> {
        let data = serde_json::to_vec_pretty(meta)?;
        write_atomic(&self.layout.sections_meta(), &data, false)?;
        debug!(version = meta.version, sections = meta.sections.len(), "section meta saved");
        Ok(())
    }

    pub fn compile(&self, meta: &SectionMeta) -> SectionResult<String> {
        compile_sections(meta, &self.sections_dir())
    }

    /// Check that every section file exists and matches its recorded hash.
    pub fn validate(&self, meta: &SectionMeta) -> SectionResult<()> {
        for section in &meta.sections {
            let body = self.read_section_file(section)?;
            let actual = section_hash(&body);
            if actual != section.hash {
                return Err(SectionError::HashMismatch {
                    id: section.id.clone(),
                    expected: section.hash.clone(),
                    actual,
                });
            }
        }
        Ok(())
    }
}

/// Join sections in order: each title, a blank line, the body, a blank line.
///
/// Empty bodies contribute only their title. The result is trimmed.
pub fn compile_sections(meta: &SectionMeta, dir: &Path) -> SectionResult<String> {
    let mut out = String::new();
    for section in &meta.sections {
        let body = read_optional(&dir.join(&section.file))?.ok_or_else(|| {
            SectionError::MissingFile {
                id: section.id.clone(),
                file: section.file.clone(),
            }
        })?;
        out.push_str(&section.title);
        out.push_str("\n\n");
        let body = body.trim();
        if !body.is_empty() {
            out.push_str(body);
            out.push_str("\n\n");
        }
    }
    Ok(out.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;

    fn populated(dir: &Path, text: &str) -> (SectionStore, SectionMeta) {
        let store = SectionStore::new(dir);
        let parsed = parse_document(text);
        for (section, body) in parsed.meta.sections.iter().zip(&parsed.bodies) {
            store.write_section_file(section, body).unwrap();
        }
        store.save_meta(&parsed.meta).unwrap();
        (store, parsed.meta)
    }

    #[test]
    fn files_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let (store, meta) = populated(dir.path(), "# A\nalpha\n## B\nbeta");
        assert_eq!(store.read_section_file(&meta.sections[1]).unwrap(), "beta");
        assert_eq!(store.load_meta().unwrap(), meta);
        assert!(store.meta_exists());

        store.delete_section_file(&meta.sections[1]).unwrap();
        store.delete_section_file(&meta.sections[1]).unwrap();
        assert!(matches!(
            store.read_section_file(&meta.sections[1]),
            Err(SectionError::MissingFile { .. })
        ));
    }

    #[test]
    fn compile_joins_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let (store, meta) = populated(dir.path(), "# A\n\nalpha\n\n## B\n\nbeta\n\n# C");
        assert_eq!(store.compile(&meta).unwrap(), "# A\n\nalpha\n\n## B\n\nbeta\n\n# C");
    }

    #[test]
    fn validate_detects_drift() {
        let dir = tempfile::tempdir().unwrap();
        let (store, meta) = populated(dir.path(), "# A\nalpha\n# B\nbeta");
        store.validate(&meta).unwrap();

        fs::write(store.sections_dir().join("section_002.md"), "edited").unwrap();
        assert!(matches!(
            store.validate(&meta),
            Err(SectionError::HashMismatch { ref id, .. }) if id == "section_002"
        ));

        fs::remove_file(store.sections_dir().join("section_001.md")).unwrap();
        assert!(matches!(store.validate(&meta), Err(SectionError::MissingFile { .. })));
    }

    #[test]
    fn missing_and_corrupt_meta() {
        let dir = tempfile::tempdir().unwrap();
        let store = SectionStore::new(dir.path());
        assert!(store.load_meta_optional().unwrap().is_none());
        assert!(matches!(store.load_meta(), Err(SectionError::MissingMeta(_))));
        fs::write(dir.path().join("sections.json"), "[").unwrap();
        assert!(matches!(store.load_meta(), Err(SectionError::CorruptMeta { .. })));
    }
}
