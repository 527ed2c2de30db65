//! On-disk layout of one document directory.
//!
//! ```text
//! <base>/chunks.ndjson               append-only change log
//! <base>/chunks.ndjson.bak-<ts>      archived log after squash
//! <base>/meta.json                   document metadata
//! <base>/compiled.md                 flattened document text
//! <base>/sections.json               section metadata
//! <base>/sections/section_NNN.md     one body file per section
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const CHUNKS_FILE: &str = "chunks.ndjson";
pub const META_FILE: &str = "meta.json";
pub const COMPILED_FILE: &str = "compiled.md";
pub const SECTIONS_META_FILE: &str = "sections.json";
pub const SECTIONS_DIR: &str = "sections";

/// Paths of every file belonging to one document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocLayout {
    base: PathBuf,
}

impl DocLayout {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn chunks(&self) -> PathBuf {
        self.base.join(CHUNKS_FILE)
    }

    pub fn meta(&self) -> PathBuf {
        self.base.join(META_FILE)
    }

    pub fn compiled(&self) -> PathBuf {
        self.base.join(COMPILED_FILE)
    }

    pub fn sections_meta(&self) -> PathBuf {
        self.base.join(SECTIONS_META_FILE)
    }

    pub fn sections_dir(&self) -> PathBuf {
        self.base.join(SECTIONS_DIR)
    }

    /// Archive path for the change log, stamped with `stamp`.
    pub fn chunks_backup(&self, stamp: &str) -> PathBuf {
        self.base.join(format!("{CHUNKS_FILE}.bak-{stamp}"))
    }
}

/// Replace `path` with `data` via a sibling temp file and a rename.
///
/// Readers observe either the old or the new content, never a torn write.
/// With `fsync` the temp file is synced before the rename.
pub fn write_atomic(path: &Path, data: &[u8], fsync: bool) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(data)?;
        if fsync {
            file.sync_all()?;
        }
    }
    fs::rename(&tmp_path, path)
}

/// Read a UTF-8 file, mapping "not found" to `None`.
pub fn read_optional(path: &Path) -> io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
