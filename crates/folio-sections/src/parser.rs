//! Markdown heading parser.
//!
//! A heading is a trimmed line of 1-6 `#` followed by a space or the end of
//! the line. Lines starting with a triple backtick toggle a code fence, and
//! nothing inside a fence is a heading. The first heading outside a fence
//! fixes the root level; headings shallower than it stay body text.

use folio_crypto::section_hash;
use tracing::{debug, warn};

use crate::model::{Section, SectionMeta};

const FENCE: &str = "```";

/// Depth of a Markdown heading line, `None` for any other line.
pub fn heading_level(line: &str) -> Option<u8> {
    let trimmed = line.trim();
    let hashes = trimmed.bytes().take_while(|&b| b == b'#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    match trimmed.as_bytes().get(hashes) {
        None | Some(b' ') => Some(hashes as u8),
        Some(_) => None,
    }
}

pub(crate) fn is_fence(line: &str) -> bool {
    line.trim().starts_with(FENCE)
}

/// Headings outside code fences, as `(line index, level)`.
pub(crate) fn headings(lines: &[&str]) -> Vec<(usize, u8)> {
    let mut in_fence = false;
    let mut found = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if is_fence(line) {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if let Some(level) = heading_level(line) {
            found.push((i, level));
        }
    }
    found
}

/// Level of the first heading outside a code fence, 1 when there is none.
pub fn detect_root_level(text: &str) -> u8 {
    let lines: Vec<&str> = text.lines().collect();
    headings(&lines).first().map_or(1, |&(_, level)| level)
}

/// Section metadata together with the body text of every section.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedDocument {
    pub meta: SectionMeta,
    /// Trimmed bodies, parallel to `meta.sections`.
    pub bodies: Vec<String>,
}

/// Split `text` into sections.
pub fn parse_document(text: &str) -> ParsedDocument {
    if text.trim().is_empty() {
        return ParsedDocument {
            meta: SectionMeta::empty(1),
            bodies: Vec::new(),
        };
    }

    let root_level = detect_root_level(text);
    let mut sections: Vec<Section> = Vec::new();
    let mut bodies: Vec<String> = Vec::new();
    let mut current: Option<(String, u8)> = None;
    let mut buffer: Vec<&str> = Vec::new();
    let mut dropped = 0usize;
    let mut in_fence = false;

    let mut finish = |current: Option<(String, u8)>, buffer: &mut Vec<&str>| {
        if let Some((title, level)) = current {
            let body = buffer.join("\n").trim().to_string();
            let number = sections.len() as u32 + 1;
            sections.push(Section::new(number, title, level, section_hash(&body)));
            bodies.push(body);
        }
        buffer.clear();
    };

    for line in text.lines() {
        let heading = if is_fence(line) {
            in_fence = !in_fence;
            None
        } else if in_fence {
            None
        } else {
            heading_level(line).filter(|&level| level >= root_level)
        };

        match heading {
            Some(level) => {
                finish(current.take(), &mut buffer);
                current = Some((line.trim().to_string(), level));
            }
            None if current.is_some() => buffer.push(line),
            None => {
                if !line.trim().is_empty() {
                    dropped += 1;
                }
            }
        }
    }
    finish(current.take(), &mut buffer);

    if dropped > 0 {
        warn!(lines = dropped, "text before the first heading dropped");
    }

    build_hierarchy(&mut sections);
    let mut meta = SectionMeta::empty(1);
    meta.root_level = root_level;
    meta.sections = sections;
    meta.refresh_etag();
    debug!(sections = meta.sections.len(), root_level, "document parsed");

    ParsedDocument { meta, bodies }
}

/// Section metadata of `text`, without the bodies.
pub fn parse_sections(text: &str) -> SectionMeta {
    parse_document(text).meta
}

/// Recompute `parent_id` and `children` from levels and order.
///
/// Each section's parent is the nearest preceding section with a smaller
/// level.
pub fn build_hierarchy(sections: &mut [Section]) {
    for section in sections.iter_mut() {
        section.parent_id = None;
        section.children.clear();
    }

    let mut stack: Vec<usize> = Vec::new();
    for i in 0..sections.len() {
        let level = sections[i].level;
        while let Some(&top) = stack.last() {
            if sections[top].level >= level {
                stack.pop();
            } else {
                break;
            }
        }
        if let Some(&parent) = stack.last() {
            let child_id = sections[i].id.clone();
            sections[i].parent_id = Some(sections[parent].id.clone());
            sections[parent].children.push(child_id);
        }
        stack.push(i);
    }
}
