use chrono::{DateTime, Utc};
use folio_crypto::section_set_etag;
use serde::{Deserialize, Serialize};

/// One heading-delimited unit of a document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// `section_NNN`.
    pub id: String,
    /// Raw heading line, e.g. `"## 1. Overview"`.
    pub title: String,
    /// Heading depth, 1-6.
    pub level: u8,
    /// 1-based position in the document.
    pub order: u32,
    pub parent_id: Option<String>,
    /// Body file name under `sections/`.
    pub file: String,
    #[serde(default)]
    pub children: Vec<String>,
    /// Digest of the body file (title excluded).
    pub hash: String,
}

impl Section {
    pub fn new(number: u32, title: impl Into<String>, level: u8, hash: impl Into<String>) -> Self {
        let id = section_id(number);
        Self {
            file: format!("{id}.md"),
            id,
            title: title.into(),
            level,
            order: number,
            parent_id: None,
            children: Vec::new(),
            hash: hash.into(),
        }
    }

    /// Numeric suffix of the id, if it has one.
    pub fn number(&self) -> Option<u32> {
        self.id.strip_prefix("section_")?.parse().ok()
    }
}

/// Id of the section numbered `n`.
pub fn section_id(n: u32) -> String {
    format!("section_{n:03}")
}

/// Contents of `sections.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionMeta {
    pub version: u64,
    pub updated_at: DateTime<Utc>,
    pub root_level: u8,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub etag: String,
}

impl SectionMeta {
    /// Metadata with no sections.
    pub fn empty(version: u64) -> Self {
        let mut meta = Self {
            version,
            updated_at: Utc::now(),
            root_level: 1,
            sections: Vec::new(),
            etag: String::new(),
        };
        meta.refresh_etag();
        meta
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Recompute the ETag over section ids and hashes, in order.
    pub fn refresh_etag(&mut self) {
        self.etag = section_set_etag(
            self.sections
                .iter()
                .map(|s| (s.id.as_str(), s.hash.as_str())),
        );
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A section with its body, optionally with its subtree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionContent {
    #[serde(flatten)]
    pub section: Section,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children_content: Vec<SectionContent>,
}
