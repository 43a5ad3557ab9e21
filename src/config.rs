//! Runtime settings with environment overrides

use crate::error::{RepoqueryError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Effective configuration for sync and serving.
///
/// Defaults match the observed production values; every limit can be
/// overridden through the environment before falling back here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Remote repository in `owner/name` form
    pub repo: String,
    /// Branch to sync
    pub branch: String,
    /// Root directory of the blob store
    pub store_root: PathBuf,
    /// Hard cap on rows returned by a query
    pub row_limit: usize,
    /// Query execution budget in seconds
    pub query_timeout_secs: u64,
    /// Maximum file size `read_repo_file` will return
    pub max_read_bytes: u64,
    /// Number of leading rows sampled for type inference
    pub sample_window: usize,
    /// Generations retained after a successful publish
    pub keep_generations: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            repo: String::new(),
            branch: "main".to_string(),
            store_root: PathBuf::from(".repoquery"),
            row_limit: crate::DEFAULT_ROW_LIMIT,
            query_timeout_secs: crate::DEFAULT_QUERY_TIMEOUT_SECS,
            max_read_bytes: crate::DEFAULT_MAX_READ_BYTES,
            sample_window: crate::DEFAULT_SAMPLE_WINDOW,
            keep_generations: crate::DEFAULT_KEEP_GENERATIONS,
        }
    }
}

impl Settings {
    /// Build settings from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Ok(repo) = env::var("REPOQUERY_REPO") {
            settings.repo = repo;
        }
        if let Ok(branch) = env::var("REPOQUERY_BRANCH") {
            settings.branch = branch;
        }
        if let Ok(store) = env::var("REPOQUERY_STORE") {
            settings.store_root = PathBuf::from(store);
        }
        if let Some(limit) = env_usize("REPOQUERY_ROW_LIMIT") {
            settings.row_limit = limit;
        }
        if let Some(secs) = env_usize("REPOQUERY_QUERY_TIMEOUT_SECS") {
            settings.query_timeout_secs = secs as u64;
        }
        if let Some(bytes) = env_usize("REPOQUERY_MAX_READ_BYTES") {
            settings.max_read_bytes = bytes as u64;
        }

        settings
    }

    /// GitHub API token, if configured.
    pub fn github_token() -> Option<String> {
        env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty())
    }

    /// Validate settings before a sync run.
    pub fn validate_for_sync(&self) -> Result<()> {
        if self.repo.is_empty() {
            return Err(RepoqueryError::config(
                "no repository configured (set REPOQUERY_REPO or pass --repo)",
            ));
        }
        if !self.repo.contains('/') {
            return Err(RepoqueryError::config(format!(
                "repository must be in owner/name form: '{}'",
                self.repo
            )));
        }
        if self.keep_generations == 0 {
            return Err(RepoqueryError::config(
                "keep_generations must be at least 1",
            ));
        }
        Ok(())
    }
}

fn env_usize(key: &str) -> Option<usize> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}
