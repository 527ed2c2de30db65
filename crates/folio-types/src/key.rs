//! Document addressing.
//!
//! A document is either addressed logically (a scope, an owner id and a slot
//! name) or by an explicit base directory. Logical components end up as path
//! segments, so they are validated on construction:
//! - Must be non-empty
//! - Must not contain `/`, `\`, or control characters
//! - Must not be `.` or contain `..`

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Scope a logical document key lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocScope {
    Task,
    Project,
    Meeting,
}

impl DocScope {
    /// Slot names accepted for this scope.
    pub fn slots(&self) -> &'static [&'static str] {
        match self {
            Self::Task => &["requirements", "design", "test", "execution_plan"],
            Self::Project => &["feature_list", "architecture_design"],
            Self::Meeting => &["polish", "summary", "topic"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Project => "project",
            Self::Meeting => "meeting",
        }
    }

    fn check_slot(&self, slot: &str) -> Result<(), TypeError> {
        if self.slots().contains(&slot) {
            Ok(())
        } else {
            Err(TypeError::InvalidSlot {
                scope: self.as_str().to_string(),
                slot: slot.to_string(),
            })
        }
    }
}

impl fmt::Display for DocScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address of one document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum DocKey {
    Task {
        project: String,
        task: String,
        slot: String,
    },
    Project {
        project: String,
        slot: String,
    },
    Meeting {
        meeting: String,
        slot: String,
    },
    /// Explicit base directory; bypasses scope layout and slot validation.
    Path { base: PathBuf },
}

impl DocKey {
    pub fn task(
        project: impl Into<String>,
        task: impl Into<String>,
        slot: impl Into<String>,
    ) -> Result<Self, TypeError> {
        let key = Self::Task {
            project: project.into(),
            task: task.into(),
            slot: slot.into(),
        };
        key.validate()?;
        Ok(key)
    }

    pub fn project(project: impl Into<String>, slot: impl Into<String>) -> Result<Self, TypeError> {
        let key = Self::Project {
            project: project.into(),
            slot: slot.into(),
        };
        key.validate()?;
        Ok(key)
    }

    pub fn meeting(meeting: impl Into<String>, slot: impl Into<String>) -> Result<Self, TypeError> {
        let key = Self::Meeting {
            meeting: meeting.into(),
            slot: slot.into(),
        };
        key.validate()?;
        Ok(key)
    }

    pub fn path(base: impl Into<PathBuf>) -> Self {
        Self::Path { base: base.into() }
    }

    /// The scope of a logical key, `None` for path keys.
    pub fn scope(&self) -> Option<DocScope> {
        match self {
            Self::Task { .. } => Some(DocScope::Task),
            Self::Project { .. } => Some(DocScope::Project),
            Self::Meeting { .. } => Some(DocScope::Meeting),
            Self::Path { .. } => None,
        }
    }

    /// Document type recorded in the document metadata.
    pub fn doc_type(&self) -> String {
        match self {
            Self::Task { slot, .. } | Self::Project { slot, .. } | Self::Meeting { slot, .. } => {
                slot.clone()
            }
            Self::Path { base } => base
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }

    /// Check every component and the slot/scope combination.
    ///
    /// Keys deserialized from untrusted input must be validated before use.
    pub fn validate(&self) -> Result<(), TypeError> {
        match self {
            Self::Task { project, task, slot } => {
                validate_component(project)?;
                validate_component(task)?;
                validate_component(slot)?;
                DocScope::Task.check_slot(slot)
            }
            Self::Project { project, slot } => {
                validate_component(project)?;
                validate_component(slot)?;
                DocScope::Project.check_slot(slot)
            }
            Self::Meeting { meeting, slot } => {
                validate_component(meeting)?;
                validate_component(slot)?;
                DocScope::Meeting.check_slot(slot)
            }
            Self::Path { base } => {
                if base.as_os_str().is_empty() {
                    return Err(TypeError::InvalidKey {
                        component: String::new(),
                        reason: "base path must not be empty".into(),
                    });
                }
                Ok(())
            }
        }
    }

    /// The explicit base directory for path keys.
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Path { base } => Some(base),
            _ => None,
        }
    }
}

impl fmt::Display for DocKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Task { project, task, slot } => write!(f, "task:{project}/{task}/{slot}"),
            Self::Project { project, slot } => write!(f, "project:{project}/{slot}"),
            Self::Meeting { meeting, slot } => write!(f, "meeting:{meeting}/{slot}"),
            Self::Path { base } => write!(f, "path:{}", base.display()),
        }
    }
}

fn validate_component(component: &str) -> Result<(), TypeError> {
    let reject = |reason: &str| TypeError::InvalidKey {
        component: component.to_string(),
        reason: reason.to_string(),
    };

    if component.is_empty() {
        return Err(reject("must not be empty"));
    }
    if component == "." || component.contains("..") {
        return Err(reject("must not be '.' or contain '..'"));
    }
    if component.contains('/') || component.contains('\\') {
        return Err(reject("must not contain path separators"));
    }
    if component.chars().any(char::is_control) {
        return Err(reject("must not contain control characters"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_key_accepts_known_slot() {
        let key = DocKey::task("p1", "t-42", "design").unwrap();
        assert_eq!(key.scope(), Some(DocScope::Task));
        assert_eq!(key.doc_type(), "design");
        assert_eq!(key.to_string(), "task:p1/t-42/design");
    }

    #[test]
    fn unknown_slot_rejected() {
        let err = DocKey::project("p1", "design").unwrap_err();
        assert!(matches!(err, TypeError::InvalidSlot { .. }));
    }

    #[test]
    fn traversal_rejected() {
        assert!(DocKey::task("..", "t", "test").is_err());
        assert!(DocKey::task("p", "a/b", "test").is_err());
        assert!(DocKey::meeting("", "summary").is_err());
        assert!(DocKey::meeting("m\n1", "summary").is_err());
    }

    #[test]
    fn path_key_doc_type_is_last_component() {
        let key = DocKey::path("/data/notes/summary");
        assert_eq!(key.doc_type(), "summary");
        assert!(key.scope().is_none());
        assert!(key.validate().is_ok());
        assert!(DocKey::path("").validate().is_err());
    }

    proptest::proptest! {
        #[test]
        fn plain_identifiers_always_validate(project in "[a-z0-9_-]{1,24}", task in "[A-Za-z0-9]{1,24}") {
            proptest::prop_assert!(DocKey::task(project, task, "test").is_ok());
        }

        #[test]
        fn separators_never_validate(prefix in "[a-z]{0,8}", suffix in "[a-z]{0,8}") {
            let project = format!("{prefix}/{suffix}");
            proptest::prop_assert!(DocKey::project(project, "feature_list").is_err());
        }
    }

    #[test]
    fn serde_is_tagged_by_scope() {
        let key = DocKey::project("p9", "feature_list").unwrap();
        let json = serde_json::to_value(&key).unwrap();
        assert_eq!(json["scope"], "project");
        let back: DocKey = serde_json::from_value(json).unwrap();
        assert_eq!(back, key);
    }
}
