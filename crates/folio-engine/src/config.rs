use std::fs;
use std::path::{Path, PathBuf};

use folio_chunks::{StoreOptions, DEFAULT_HASH_WINDOW};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Engine settings, loadable from a TOML file.
///
/// ```toml
/// projects_root = "/srv/folio/projects"
/// hash_window = 10
/// default_source = "api"
/// fsync = true
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root of the project tree; meetings live beside it.
    pub projects_root: PathBuf,
    pub hash_window: usize,
    pub default_source: String,
    pub fsync: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let store = StoreOptions::default();
        Self {
            projects_root: PathBuf::from("projects"),
            hash_window: DEFAULT_HASH_WINDOW,
            default_source: store.default_source,
            fsync: store.fsync,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> EngineResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> EngineResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.hash_window == 0 {
            return Err(EngineError::Config("hash_window must be at least 1".into()));
        }
        if self.projects_root.as_os_str().is_empty() {
            return Err(EngineError::Config("projects_root must not be empty".into()));
        }
        Ok(())
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            hash_window: self.hash_window,
            fsync: self.fsync,
            default_source: self.default_source.clone(),
        }
    }
}
