//! Generation-addressed blob store on the local filesystem
//!
//! Layout:
//! ```text
//! <root>/config.json                        effective limits, written once
//! <root>/sync.lock                          present while a sync runs
//! <root>/generations/<id>/repo/**           raw repository files
//! <root>/generations/<id>/snapshot.json     file manifest
//! <root>/generations/<id>/data.duckdb       queryable dataset
//! <root>/generations/<id>/catalog.json      table catalog
//! <root>/CURRENT                            pointer to the published generation
//! ```
//!
//! Readers resolve `CURRENT` on every call; the pointer is replaced via
//! temp-file + rename so a generation becomes visible all at once.

use crate::config::Settings;
use crate::error::{RepoqueryError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Contents of the `CURRENT` pointer file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentPointer {
    pub generation: String,
    pub published_at: DateTime<Utc>,
}

/// Paths belonging to a single generation
#[derive(Debug, Clone)]
pub struct GenerationPaths {
    pub id: String,
    pub dir: PathBuf,
    pub repo_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub db_path: PathBuf,
    pub catalog_path: PathBuf,
}

/// Manages the on-disk store of repository generations
#[derive(Debug, Clone)]
pub struct GenerationStore {
    pub root: PathBuf,
    pub generations_dir: PathBuf,
}

impl GenerationStore {
    /// Open a store, creating the directory skeleton if needed.
    pub fn open_or_create(root: &Path) -> Result<Self> {
        let store = Self {
            root: root.to_path_buf(),
            generations_dir: root.join("generations"),
        };
        fs::create_dir_all(&store.generations_dir)?;
        store.write_config_once()?;
        Ok(store)
    }

    fn write_config_once(&self) -> Result<()> {
        let config_path = self.root.join("config.json");
        if config_path.exists() {
            return Ok(());
        }
        let config = serde_json::json!({
            "format_version": crate::FORMAT_VERSION,
            "created": Utc::now(),
            "default_row_limit": crate::DEFAULT_ROW_LIMIT,
            "default_sample_window": crate::DEFAULT_SAMPLE_WINDOW,
        });
        fs::write(config_path, serde_json::to_string_pretty(&config)?)?;
        Ok(())
    }

    /// Allocate a fresh, unpublished generation directory.
    pub fn begin_generation(&self) -> Result<GenerationPaths> {
        let id = Uuid::new_v4().to_string();
        let paths = self.generation_paths(&id);
        fs::create_dir_all(&paths.repo_dir)?;
        log::debug!("Started generation {}", id);
        Ok(paths)
    }

    pub fn generation_paths(&self, id: &str) -> GenerationPaths {
        let dir = self.generations_dir.join(id);
        GenerationPaths {
            id: id.to_string(),
            repo_dir: dir.join("repo"),
            manifest_path: dir.join("snapshot.json"),
            db_path: dir.join("data.duckdb"),
            catalog_path: dir.join("catalog.json"),
            dir,
        }
    }

    /// Atomically point `CURRENT` at a fully written generation.
    pub fn publish(&self, generation: &GenerationPaths) -> Result<()> {
        for required in [
            &generation.manifest_path,
            &generation.db_path,
            &generation.catalog_path,
        ] {
            if !required.exists() {
                return Err(RepoqueryError::store(format!(
                    "refusing to publish incomplete generation {}: missing {}",
                    generation.id,
                    required.display()
                )));
            }
        }

        let pointer = CurrentPointer {
            generation: generation.id.clone(),
            published_at: Utc::now(),
        };
        let tmp_path = self.root.join("CURRENT.tmp");
        fs::write(&tmp_path, serde_json::to_string_pretty(&pointer)?)?;
        fs::rename(&tmp_path, self.root.join("CURRENT"))?;

        log::info!("Published generation {}", generation.id);
        Ok(())
    }

    /// Read the pointer, if any generation has been published yet.
    pub fn current(&self) -> Result<Option<CurrentPointer>> {
        let pointer_path = self.root.join("CURRENT");
        if !pointer_path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(pointer_path)?;
        let pointer: CurrentPointer = serde_json::from_str(&content)
            .map_err(|e| RepoqueryError::store(format!("corrupt CURRENT pointer: {}", e)))?;
        Ok(Some(pointer))
    }

    /// Resolve the published generation's paths, failing if none exists.
    pub fn current_paths(&self) -> Result<GenerationPaths> {
        let pointer = self
            .current()?
            .ok_or_else(|| RepoqueryError::store("no generation published yet (run sync first)"))?;
        let paths = self.generation_paths(&pointer.generation);
        if !paths.dir.exists() {
            return Err(RepoqueryError::store(format!(
                "CURRENT points at missing generation {}",
                pointer.generation
            )));
        }
        Ok(paths)
    }

    /// Take the sync lock; fails fast if another sync holds it.
    pub fn acquire_sync_lock(&self) -> Result<SyncLock> {
        let lock_path = self.root.join("sync.lock");
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(file) => {
                drop(file);
                Ok(SyncLock { path: lock_path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(RepoqueryError::SyncInProgress)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete all but the newest `keep_latest` generations.
    ///
    /// The published generation is always kept regardless of age.
    /// Failures here are surfaced to the caller but are safe to ignore;
    /// retention is not part of the publish path.
    pub fn cleanup(&self, keep_latest: usize) -> Result<usize> {
        let current_id = self.current()?.map(|p| p.generation);

        let mut generations = Vec::new();
        for entry in fs::read_dir(&self.generations_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let modified = entry.metadata()?.modified()?;
            generations.push((entry.file_name().to_string_lossy().to_string(), modified));
        }

        // Newest first
        generations.sort_by(|a, b| b.1.cmp(&a.1));

        let mut removed = 0;
        for (id, _) in generations.into_iter().skip(keep_latest) {
            if Some(&id) == current_id.as_ref() {
                continue;
            }
            fs::remove_dir_all(self.generations_dir.join(&id))?;
            log::info!("Removed stale generation {}", id);
            removed += 1;
        }
        Ok(removed)
    }
}

/// Helper to open a store from settings or an explicit override path.
pub fn open_store(settings: &Settings, override_root: Option<&Path>) -> Result<GenerationStore> {
    let root = override_root.unwrap_or(&settings.store_root);
    GenerationStore::open_or_create(root)
}

/// Held for the duration of a sync run; releases the lock file on drop.
#[derive(Debug)]
pub struct SyncLock {
    path: PathBuf,
}

impl Drop for SyncLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("Failed to remove sync lock {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn complete_generation(store: &GenerationStore) -> GenerationPaths {
        let generation = store.begin_generation().unwrap();
        fs::write(&generation.manifest_path, "{}").unwrap();
        fs::write(&generation.db_path, "db").unwrap();
        fs::write(&generation.catalog_path, "{}").unwrap();
        generation
    }

    #[test]
    fn test_store_creation() {
        let temp_dir = TempDir::new().unwrap();
        let store = GenerationStore::open_or_create(temp_dir.path()).unwrap();

        assert!(store.generations_dir.exists());
        assert!(store.root.join("config.json").exists());
        assert!(store.current().unwrap().is_none());
        assert!(store.current_paths().is_err());
    }

    #[test]
    fn test_publish_and_resolve() {
        let temp_dir = TempDir::new().unwrap();
        let store = GenerationStore::open_or_create(temp_dir.path()).unwrap();

        let generation = complete_generation(&store);
        store.publish(&generation).unwrap();

        let pointer = store.current().unwrap().unwrap();
        assert_eq!(pointer.generation, generation.id);
        assert_eq!(store.current_paths().unwrap().id, generation.id);
    }

    #[test]
    fn test_publish_rejects_incomplete_generation() {
        let temp_dir = TempDir::new().unwrap();
        let store = GenerationStore::open_or_create(temp_dir.path()).unwrap();

        let generation = store.begin_generation().unwrap();
        assert!(store.publish(&generation).is_err());
        assert!(store.current().unwrap().is_none());
    }

    #[test]
    fn test_sync_lock_exclusive() {
        let temp_dir = TempDir::new().unwrap();
        let store = GenerationStore::open_or_create(temp_dir.path()).unwrap();

        let lock = store.acquire_sync_lock().unwrap();
        assert!(matches!(
            store.acquire_sync_lock(),
            Err(RepoqueryError::SyncInProgress)
        ));
        drop(lock);
        assert!(store.acquire_sync_lock().is_ok());
    }

    #[test]
    fn test_cleanup_keeps_current() {
        let temp_dir = TempDir::new().unwrap();
        let store = GenerationStore::open_or_create(temp_dir.path()).unwrap();

        let first = complete_generation(&store);
        store.publish(&first).unwrap();
        let _second = complete_generation(&store);
        let _third = complete_generation(&store);

        let removed = store.cleanup(1).unwrap();
        assert!(removed >= 1);
        // The published generation survives even if it is not the newest
        assert!(store.generation_paths(&first.id).dir.exists());
        assert_eq!(store.current_paths().unwrap().id, first.id);
    }
}
