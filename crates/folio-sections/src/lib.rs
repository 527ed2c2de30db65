//! Section tree of a Folio document.
//!
//! The compiled text of a document is split at Markdown headings into
//! independently addressable sections. Each section body lives in its own
//! file under `sections/`, and `sections.json` records titles, levels,
//! order, the parent/child hierarchy and content hashes.
//!
//! # Key Types
//!
//! - [`SectionMeta`] - Ordered section list with version and ETag
//! - [`SectionStore`] - Section files and `sections.json` on disk
//! - [`SyncManager`] - Moves content between the compiled blob and sections
//! - [`parse_document`] - Derives sections and bodies from compiled text

pub mod error;
pub mod meta;
pub mod model;
pub mod parser;
pub mod splice;
pub mod store;
pub mod sync;

pub use error::{SectionError, SectionResult};
pub use model::{Section, SectionContent, SectionMeta};
pub use parser::{build_hierarchy, heading_level, parse_document, parse_sections, ParsedDocument};
pub use splice::replace_section_range;
pub use store::{compile_sections, SectionStore};
pub use sync::{SyncDirection, SyncManager};
