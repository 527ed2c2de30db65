use std::path::{Path, PathBuf};

use folio_types::DocKey;

use crate::error::EngineResult;

/// Maps a document key to its base directory.
pub trait DocResolver: Send + Sync {
    fn resolve(&self, key: &DocKey) -> EngineResult<PathBuf>;
}

/// Resolver for the standard storage layout:
///
/// ```text
/// task     <projects_root>/<project>/tasks/<task>/docs/<slot>
/// project  <projects_root>/<project>/docs/<slot>
/// meeting  <projects_root>/../meetings/<meeting>/docs/<slot>
/// path     <base>
/// ```
#[derive(Clone, Debug)]
pub struct LayoutResolver {
    projects_root: PathBuf,
}

impl LayoutResolver {
    pub fn new(projects_root: impl Into<PathBuf>) -> Self {
        Self {
            projects_root: projects_root.into(),
        }
    }

    pub fn projects_root(&self) -> &Path {
        &self.projects_root
    }

    fn meetings_root(&self) -> PathBuf {
        match self.projects_root.parent() {
            Some(parent) => parent.join("meetings"),
            None => self.projects_root.join("..").join("meetings"),
        }
    }
}

impl DocResolver for LayoutResolver {
    fn resolve(&self, key: &DocKey) -> EngineResult<PathBuf> {
        key.validate()?;
        let base = match key {
            DocKey::Task { project, task, slot } => self
                .projects_root
                .join(project)
                .join("tasks")
                .join(task)
                .join("docs")
                .join(slot),
            DocKey::Project { project, slot } => {
                self.projects_root.join(project).join("docs").join(slot)
            }
            DocKey::Meeting { meeting, slot } => {
                self.meetings_root().join(meeting).join("docs").join(slot)
            }
            DocKey::Path { base } => base.clone(),
        };
        Ok(normalize(&base))
    }
}

/// Lexically normalized path: `.` segments and trailing separators dropped.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    path.components().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_each_scope() {
        let r = LayoutResolver::new("/data/projects");
        assert_eq!(
            r.resolve(&DocKey::task("p1", "t1", "design").unwrap()).unwrap(),
            PathBuf::from("/data/projects/p1/tasks/t1/docs/design")
        );
        assert_eq!(
            r.resolve(&DocKey::project("p1", "feature_list").unwrap()).unwrap(),
            PathBuf::from("/data/projects/p1/docs/feature_list")
        );
        assert_eq!(
            r.resolve(&DocKey::meeting("m7", "summary").unwrap()).unwrap(),
            PathBuf::from("/data/meetings/m7/docs/summary")
        );
        assert_eq!(
            r.resolve(&DocKey::path("/x/./y/")).unwrap(),
            PathBuf::from("/x/y")
        );
    }

    #[test]
    fn path_and_logical_keys_meet() {
        let r = LayoutResolver::new("/data/projects");
        let logical = r.resolve(&DocKey::task("p", "t", "test").unwrap()).unwrap();
        let explicit = r
            .resolve(&DocKey::path("/data/projects/p/tasks/t/docs/test/"))
            .unwrap();
        assert_eq!(logical, explicit);
    }

    #[test]
    fn rejects_unvalidated_keys() {
        let r = LayoutResolver::new("/data/projects");
        let bad = DocKey::Task {
            project: "..".into(),
            task: "t".into(),
            slot: "design".into(),
        };
        assert!(r.resolve(&bad).is_err());
    }
}
