use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The section-level edit that produced a `section_*_no_parse` chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SectionEdit {
    Update,
    Insert,
    Delete,
    /// Whole-subtree rewrite via `update_section_full`.
    Full,
}

impl SectionEdit {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Insert => "insert",
            Self::Delete => "delete",
            Self::Full => "full",
        }
    }

    fn parse(kind: &str) -> Option<Self> {
        match kind {
            "update" => Some(Self::Update),
            "insert" => Some(Self::Insert),
            "delete" => Some(Self::Delete),
            "full" => Some(Self::Full),
            _ => None,
        }
    }
}

/// Operation tag recorded on every change-log chunk.
///
/// The tag decides how a chunk folds into the compiled document:
///
/// | op                       | compiled blob | section re-derivation |
/// |--------------------------|---------------|-----------------------|
/// | `add_full`, any other    | appended      | no                    |
/// | `replace_full`           | overwritten   | yes                   |
/// | `section_<kind>_no_parse`| overwritten   | no                    |
///
/// Serialized as the plain string so the log stays readable with `jq`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChunkOp {
    AddFull,
    ReplaceFull,
    Section(SectionEdit),
    /// Unrecognized tag, kept verbatim and folded as an append.
    Other(String),
}

impl ChunkOp {
    /// Whether this op replaces the compiled blob instead of appending to it.
    ///
    /// During replay an overwriting chunk discards everything accumulated
    /// before it.
    pub fn overwrites(&self) -> bool {
        matches!(self, Self::ReplaceFull | Self::Section(_))
    }

    /// Whether the section tree must be re-derived after this op lands.
    pub fn requires_reparse(&self) -> bool {
        matches!(self, Self::ReplaceFull)
    }

    /// Whether empty content is acceptable (an explicit clear).
    pub fn allows_empty(&self) -> bool {
        matches!(self, Self::ReplaceFull)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::AddFull => "add_full",
            Self::ReplaceFull => "replace_full",
            Self::Section(SectionEdit::Update) => "section_update_no_parse",
            Self::Section(SectionEdit::Insert) => "section_insert_no_parse",
            Self::Section(SectionEdit::Delete) => "section_delete_no_parse",
            Self::Section(SectionEdit::Full) => "section_full_no_parse",
            Self::Other(s) => s,
        }
    }
}

impl Default for ChunkOp {
    fn default() -> Self {
        Self::AddFull
    }
}

impl From<&str> for ChunkOp {
    fn from(s: &str) -> Self {
        match s {
            "" | "add_full" => Self::AddFull,
            "replace_full" => Self::ReplaceFull,
            other => other
                .strip_prefix("section_")
                .and_then(|rest| rest.strip_suffix("_no_parse"))
                .and_then(SectionEdit::parse)
                .map(Self::Section)
                .unwrap_or_else(|| Self::Other(other.to_string())),
        }
    }
}

impl From<String> for ChunkOp {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<ChunkOp> for String {
    fn from(op: ChunkOp) -> Self {
        op.as_str().to_string()
    }
}

impl FromStr for ChunkOp {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for ChunkOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
