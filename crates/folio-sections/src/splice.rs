//! Range replacement used when a section is edited together with its
//! subtree.

use crate::error::{SectionError, SectionResult};
use crate::model::Section;
use crate::parser::headings;

/// Replace `section` and everything below it in `compiled` with
/// `new_content`.
///
/// Only headings at `root_level` or deeper count, matching the parser;
/// shallower ones are body text. `occurrence` selects among sections
/// sharing the same title (0 is the first). The replaced range runs from
/// the title line to the next heading at the section's level or shallower.
/// When `new_content` itself carries such a heading (other than the title),
/// the range extends to the end of the document, since the caller edited
/// everything that followed.
pub fn replace_section_range(
    compiled: &str,
    section: &Section,
    root_level: u8,
    occurrence: usize,
    new_content: &str,
) -> SectionResult<String> {
    let lines: Vec<&str> = compiled.split('\n').collect();
    let marks = section_headings(&lines, root_level);

    let start = marks
        .iter()
        .filter(|&&(i, _)| lines[i].trim() == section.title)
        .nth(occurrence)
        .map(|&(i, _)| i)
        .ok_or_else(|| SectionError::TitleNotFound(section.title.clone()))?;

    let replacement = new_content.trim();
    let replacement_lines: Vec<&str> = replacement.lines().collect();
    let spans_rest = section_headings(&replacement_lines, root_level)
        .iter()
        .any(|&(i, level)| replacement_lines[i].trim() != section.title && level <= section.level);

    let end = if spans_rest {
        lines.len()
    } else {
        marks
            .iter()
            .find(|&&(i, level)| i > start && level <= section.level)
            .map_or(lines.len(), |&(i, _)| i)
    };

    let mut out = String::with_capacity(compiled.len() + replacement.len());
    for line in &lines[..start] {
        out.push_str(line);
        out.push('\n');
    }
    if !replacement.is_empty() {
        out.push_str(replacement);
        out.push_str("\n\n");
    }
    for line in &lines[end..] {
        out.push_str(line);
        out.push('\n');
    }
    Ok(out.trim().to_string())
}

fn section_headings(lines: &[&str], root_level: u8) -> Vec<(usize, u8)> {
    let mut marks = headings(lines);
    marks.retain(|&(_, level)| level >= root_level);
    marks
}
