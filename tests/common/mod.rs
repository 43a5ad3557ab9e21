//! Common test utilities and helpers

use repoquery::fetcher::Source;
use repoquery::store::GenerationStore;
use repoquery::sync::{run_sync, SyncReport};
use repoquery::tools::ToolDispatcher;
use repoquery::{Result, Settings};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Test fixture with a source directory acting as the "remote"
/// repository and a generation store beside it.
pub struct TestFixture {
    pub temp_dir: TempDir,
    pub source_dir: PathBuf,
    pub store: GenerationStore,
    pub settings: Settings,
}

impl TestFixture {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let source_dir = temp_dir.path().join("remote");
        fs::create_dir_all(&source_dir)?;

        let store_root = temp_dir.path().join("store");
        let store = GenerationStore::open_or_create(&store_root)?;

        let mut settings = Settings::default();
        settings.store_root = store_root;

        Ok(Self {
            temp_dir,
            source_dir,
            store,
            settings,
        })
    }

    /// Write a file into the fake remote repository.
    pub fn create_file(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.source_dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Write a CSV built from rows of fields.
    pub fn create_csv(&self, name: &str, rows: &[Vec<&str>]) -> Result<PathBuf> {
        let mut content = String::new();
        for row in rows {
            content.push_str(&row.join(","));
            content.push('\n');
        }
        self.create_file(name, &content)
    }

    /// Run a full sync from the fake remote.
    pub fn sync(&self) -> Result<SyncReport> {
        run_sync(
            &self.store,
            &Source::LocalDir(self.source_dir.clone()),
            &self.settings,
        )
    }

    /// Dispatcher bound to this fixture's store.
    pub fn dispatcher(&self) -> ToolDispatcher {
        ToolDispatcher::new(self.store.clone(), self.settings.clone())
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }
}

/// A CSV with `n` data rows: header `id,amount` and predictable values.
pub fn numbered_csv(n: usize) -> String {
    let mut content = String::from("id,amount\n");
    for i in 0..n {
        content.push_str(&format!("{},{}\n", i, i * 10));
    }
    content
}
