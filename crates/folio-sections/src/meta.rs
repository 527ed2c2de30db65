//! In-memory edits of [`SectionMeta`].
//!
//! Every structural edit renumbers `order`, rebuilds the hierarchy, bumps
//! the version and refreshes the ETag. Callers persist the result.

use folio_crypto::section_hash;

use crate::error::{SectionError, SectionResult};
use crate::model::{Section, SectionMeta};
use crate::parser::{build_hierarchy, heading_level};

impl SectionMeta {
    pub fn get(&self, id: &str) -> SectionResult<&Section> {
        self.sections
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| SectionError::NotFound(id.to_string()))
    }

    pub fn position(&self, id: &str) -> SectionResult<usize> {
        self.sections
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| SectionError::NotFound(id.to_string()))
    }

    /// Replace the section with the same id.
    pub fn update_section(&mut self, section: Section) -> SectionResult<()> {
        let index = self.position(&section.id)?;
        self.sections[index] = section;
        self.mark_changed();
        Ok(())
    }

    /// Ids of every section below `id`, depth first.
    pub fn descendants(&self, id: &str) -> SectionResult<Vec<String>> {
        let mut out = Vec::new();
        let mut pending: Vec<String> = self.get(id)?.children.iter().rev().cloned().collect();
        while let Some(next) = pending.pop() {
            if let Ok(child) = self.get(&next) {
                pending.extend(child.children.iter().rev().cloned());
            }
            out.push(next);
        }
        Ok(out)
    }

    /// Number of earlier sections sharing the title of section `id`.
    pub fn title_occurrence(&self, id: &str) -> SectionResult<usize> {
        let index = self.position(id)?;
        let title = &self.sections[index].title;
        Ok(self.sections[..index]
            .iter()
            .filter(|s| &s.title == title)
            .count())
    }

    /// Insert a new section after `after`, or at the end.
    ///
    /// The new id takes the number after the highest id or order in use, so
    /// it never collides with an existing section file.
    pub fn insert_section(
        &mut self,
        title: &str,
        content: &str,
        after: Option<&str>,
    ) -> SectionResult<Section> {
        let title = title.trim();
        let level = heading_level(title)
            .ok_or_else(|| SectionError::InvalidTitle(title.to_string()))?;

        let index = match after {
            Some(after) => self.position(after)? + 1,
            None => self.sections.len(),
        };

        let number = self
            .sections
            .iter()
            .map(|s| s.number().unwrap_or(0).max(s.order))
            .max()
            .unwrap_or(0)
            + 1;
        let section = Section::new(number, title, level, section_hash(content.trim()));
        let id = section.id.clone();

        self.sections.insert(index, section);
        self.restructure();
        Ok(self.get(&id)?.clone())
    }

    /// Remove `id`, and with `cascade` its whole subtree.
    ///
    /// Returns the removed sections in document order.
    pub fn remove_section(&mut self, id: &str, cascade: bool) -> SectionResult<Vec<Section>> {
        let mut doomed = vec![id.to_string()];
        if cascade {
            doomed.extend(self.descendants(id)?);
        } else {
            self.get(id)?;
        }

        let (removed, kept): (Vec<Section>, Vec<Section>) = self
            .sections
            .drain(..)
            .partition(|s| doomed.contains(&s.id));
        self.sections = kept;
        for section in &mut self.sections {
            section.children.retain(|c| !doomed.contains(c));
        }
        self.restructure();
        Ok(removed)
    }

    /// Move `id` to just after `after`, or to the end.
    pub fn move_section(&mut self, id: &str, after: Option<&str>) -> SectionResult<()> {
        let from = self.position(id)?;
        if let Some(after) = after {
            self.position(after)?;
        }

        let section = self.sections.remove(from);
        let to = match after {
            Some(after) if after == id => from,
            Some(after) => self.position(after)? + 1,
            None => self.sections.len(),
        };
        self.sections.insert(to, section);
        self.restructure();
        Ok(())
    }

    fn restructure(&mut self) {
        for (i, section) in self.sections.iter_mut().enumerate() {
            section.order = i as u32 + 1;
        }
        build_hierarchy(&mut self.sections);
        self.mark_changed();
    }

    fn mark_changed(&mut self) {
        self.version += 1;
        self.refresh_etag();
        self.touch();
    }
}
