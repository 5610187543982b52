//! Repository configuration
//!
//! Stored at `.twig/config.json`. Every field has a default, so a missing
//! file or a partial one is fine.

use crate::error::{Result, TwigError};
use crate::graph::MergeBaseStrategy;
use crate::storage::DEFAULT_COMMIT_CACHE_SIZE;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const CONFIG_FILE: &str = "config.json";

/// Repository configuration stored at `.twig/config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    /// Branch created by `init`.
    pub default_branch: String,
    /// Split-point selection used by `merge`.
    pub merge_base: MergeBaseStrategy,
    /// Number of decoded commits kept in memory.
    pub commit_cache_size: usize,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            default_branch: "master".to_string(),
            merge_base: MergeBaseStrategy::default(),
            commit_cache_size: DEFAULT_COMMIT_CACHE_SIZE,
        }
    }
}

impl RepoConfig {
    /// Load config from a repository directory.
    pub fn load(repo_dir: &Path) -> Result<Self> {
        let config_path = repo_dir.join(CONFIG_FILE);
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&config_path)?;
        serde_json::from_str(&data)
            .map_err(|e| TwigError::corrupt(format!("unreadable config {:?}: {}", config_path, e)))
    }

    /// Save config to a repository directory.
    pub fn save(&self, repo_dir: &Path) -> Result<()> {
        let config_path = repo_dir.join(CONFIG_FILE);
        let tmp_path = config_path.with_extension("tmp");
        let data = serde_json::to_string_pretty(self)?;
        fs::write(&tmp_path, &data)?;
        fs::rename(&tmp_path, &config_path)?;
        Ok(())
    }
}
