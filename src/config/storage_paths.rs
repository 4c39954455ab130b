//! StorageConfig and catalog path resolution.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_catalog_path() -> PathBuf {
    PathBuf::from("items.db")
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Catalog location; relative paths resolve against the working directory
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,
}

impl StorageConfig {
    /// Resolve the catalog path against `base` when it is relative.
    pub fn resolve_catalog_path(&self, base: &Path) -> PathBuf {
        if self.catalog_path.is_absolute() {
            self.catalog_path.clone()
        } else {
            base.join(&self.catalog_path)
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            catalog_path: default_catalog_path(),
        }
    }
}
