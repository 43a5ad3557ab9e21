//! Repository fetching: remote tarball download and snapshot manifests

use crate::config::Settings;
use crate::error::{RepoqueryError, Result};
use crate::store::GenerationPaths;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

const USER_AGENT: &str = concat!("repoquery/", env!("CARGO_PKG_VERSION"));
const FETCH_TIMEOUT: Duration = Duration::from_secs(120);

/// One file captured in a repository snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Repository-relative path with forward slashes
    pub path: String,
    pub size: u64,
    pub content_hash: String,
    /// Whether the content is valid UTF-8 text
    pub is_text: bool,
}

/// Immutable manifest of one fetched repository state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoSnapshot {
    pub repo: String,
    pub branch: String,
    pub generation: String,
    pub fetched_at: DateTime<Utc>,
    /// Records sorted by path
    pub files: Vec<FileRecord>,
}

impl RepoSnapshot {
    pub fn file(&self, path: &str) -> Option<&FileRecord> {
        self.files
            .binary_search_by(|f| f.path.as_str().cmp(path))
            .ok()
            .map(|i| &self.files[i])
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| RepoqueryError::store(format!("failed to read snapshot manifest: {}", e)))?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Where a sync run gets its files from
#[derive(Debug, Clone)]
pub enum Source {
    /// GitHub repository in `owner/name` form
    GitHub { repo: String, branch: String },
    /// Local directory tree, mirroring the remote layout
    LocalDir(PathBuf),
}

impl Source {
    pub fn from_settings(settings: &Settings) -> Self {
        Self::GitHub {
            repo: settings.repo.clone(),
            branch: settings.branch.clone(),
        }
    }

    /// Materialize the source into the generation's `repo/` prefix and
    /// return the snapshot manifest. Nothing is published here; a
    /// partial fetch just leaves an orphaned generation directory.
    pub fn fetch(&self, generation: &GenerationPaths) -> Result<RepoSnapshot> {
        let mut snapshot = match self {
            Self::GitHub { repo, branch } => fetch_github(repo, branch, generation)?,
            Self::LocalDir(dir) => snapshot_from_dir(dir, generation)?,
        };
        snapshot.files.sort_by(|a, b| a.path.cmp(&b.path));
        snapshot.save(&generation.manifest_path)?;
        log::info!(
            "Fetched {} files from {}@{}",
            snapshot.files.len(),
            snapshot.repo,
            snapshot.branch
        );
        Ok(snapshot)
    }
}

fn fetch_github(repo: &str, branch: &str, generation: &GenerationPaths) -> Result<RepoSnapshot> {
    let url = format!("https://api.github.com/repos/{}/tarball/{}", repo, branch);
    log::info!("Downloading {}", url);

    let client = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(FETCH_TIMEOUT)
        .build()?;

    let mut request = client.get(&url);
    if let Some(token) = Settings::github_token() {
        request = request.bearer_auth(token);
    }

    let response = request.send()?;
    match response.status() {
        StatusCode::NOT_FOUND => {
            return Err(RepoqueryError::RepoNotFound {
                repo: repo.to_string(),
                branch: branch.to_string(),
            })
        }
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            return Err(RepoqueryError::rate_limited(format!(
                "GitHub returned {} for {}",
                response.status(),
                url
            )))
        }
        status if !status.is_success() => {
            return Err(RepoqueryError::network(format!(
                "GitHub returned {} for {}",
                status, url
            )))
        }
        _ => {}
    }

    let files = extract_tarball(response, &generation.repo_dir)?;
    Ok(RepoSnapshot {
        repo: repo.to_string(),
        branch: branch.to_string(),
        generation: generation.id.clone(),
        fetched_at: Utc::now(),
        files,
    })
}

/// Unpack a gzipped tarball, stripping the single top-level directory
/// GitHub puts in archive exports (`owner-repo-sha/`).
fn extract_tarball<R: std::io::Read>(reader: R, repo_dir: &Path) -> Result<Vec<FileRecord>> {
    let mut archive = tar::Archive::new(GzDecoder::new(reader));
    let mut files = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let entry_path = entry.path()?.into_owned();
        let Some(rel_path) = sanitize_entry_path(&entry_path) else {
            continue;
        };

        let dest = repo_dir.join(&rel_path);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = fs::File::create(&dest)?;
        std::io::copy(&mut entry, &mut out)?;

        files.push(record_file(&dest, rel_path)?);
    }

    Ok(files)
}

/// Strip the tarball's top-level directory and reject unsafe or hidden
/// entries. Returns the repo-relative path, or None to skip the entry.
fn sanitize_entry_path(entry_path: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in entry_path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?.to_string()),
            // Anything that could escape the destination is skipped
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            Component::CurDir => {}
        }
    }
    if parts.len() < 2 {
        return None; // top-level directory itself, or a bare file outside it
    }
    let rel: Vec<String> = parts.into_iter().skip(1).collect();
    if rel.iter().any(|p| p.starts_with('.')) {
        return None;
    }
    Some(rel.join("/"))
}

/// Build a snapshot by copying a local directory tree, applying the
/// same dotfile pruning as the tarball path.
fn snapshot_from_dir(source_dir: &Path, generation: &GenerationPaths) -> Result<RepoSnapshot> {
    if !source_dir.is_dir() {
        return Err(RepoqueryError::RepoNotFound {
            repo: source_dir.display().to_string(),
            branch: "local".to_string(),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(source_dir)
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel_path = entry
            .path()
            .strip_prefix(source_dir)
            .map_err(|e| RepoqueryError::store(format!("path outside source dir: {}", e)))?;
        let rel = rel_path
            .components()
            .filter_map(|c| match c {
                Component::Normal(p) => p.to_str(),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/");

        let dest = generation.repo_dir.join(rel_path);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(entry.path(), &dest)?;
        files.push(record_file(&dest, rel)?);
    }

    Ok(RepoSnapshot {
        repo: source_dir.display().to_string(),
        branch: "local".to_string(),
        generation: generation.id.clone(),
        fetched_at: Utc::now(),
        files,
    })
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

fn record_file(disk_path: &Path, rel_path: String) -> Result<FileRecord> {
    let content = fs::read(disk_path)?;
    Ok(FileRecord {
        path: rel_path,
        size: content.len() as u64,
        content_hash: blake3::hash(&content).to_hex().to_string(),
        is_text: std::str::from_utf8(&content).is_ok(),
    })
}
