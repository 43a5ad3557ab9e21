//! File browsing over a repository snapshot
//!
//! All lookups go through the snapshot manifest, never the raw
//! filesystem, so a path can only name something the fetcher stored.
//! Paths are normalized lexically and anything that would escape the
//! snapshot root is rejected outright.

use crate::error::{RepoqueryError, Result};
use crate::fetcher::RepoSnapshot;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// One entry returned by `list`
#[derive(Debug, Clone, Serialize)]
pub struct ListEntry {
    pub path: String,
    pub size: u64,
    pub is_directory: bool,
}

/// Read-only view over one generation's repository files
pub struct FileBrowser<'a> {
    snapshot: &'a RepoSnapshot,
    repo_dir: &'a Path,
    max_read_bytes: u64,
}

impl<'a> FileBrowser<'a> {
    pub fn new(snapshot: &'a RepoSnapshot, repo_dir: &'a Path, max_read_bytes: u64) -> Self {
        Self {
            snapshot,
            repo_dir,
            max_read_bytes,
        }
    }

    /// List the entries directly under a prefix: subdirectories first,
    /// then files, each sorted by name. An empty or missing prefix
    /// lists the repository root.
    pub fn list(&self, prefix: Option<&str>) -> Result<Vec<ListEntry>> {
        let prefix = normalize_path(prefix.unwrap_or(""))?;

        let mut directories = BTreeSet::new();
        let mut files = Vec::new();

        for file in &self.snapshot.files {
            let Some(remainder) = strip_dir_prefix(&file.path, &prefix) else {
                continue;
            };
            match remainder.split_once('/') {
                Some((child_dir, _)) => {
                    directories.insert(join_prefix(&prefix, child_dir));
                }
                None => files.push(ListEntry {
                    path: file.path.clone(),
                    size: file.size,
                    is_directory: false,
                }),
            }
        }

        let mut entries: Vec<ListEntry> = directories
            .into_iter()
            .map(|path| ListEntry {
                path,
                size: 0,
                is_directory: true,
            })
            .collect();
        entries.extend(files);
        Ok(entries)
    }

    /// Read a file's content as UTF-8 text, enforcing the size cap.
    pub fn read(&self, path: &str) -> Result<String> {
        let normalized = normalize_path(path)?;
        if normalized.is_empty() {
            return Err(RepoqueryError::InvalidPath {
                path: path.to_string(),
            });
        }

        let Some(record) = self.snapshot.file(&normalized) else {
            // Distinguish "is a directory" from "does not exist"
            if self
                .snapshot
                .files
                .iter()
                .any(|f| strip_dir_prefix(&f.path, &normalized).is_some())
            {
                return Err(RepoqueryError::NotAFile { path: normalized });
            }
            return Err(RepoqueryError::FileNotFound { path: normalized });
        };

        if record.size > self.max_read_bytes {
            return Err(RepoqueryError::TooLarge {
                path: normalized,
                size: record.size,
                limit: self.max_read_bytes,
            });
        }
        if !record.is_text {
            return Err(RepoqueryError::NotAFile { path: normalized });
        }

        let content = fs::read(self.repo_dir.join(&normalized))?;
        String::from_utf8(content).map_err(|_| RepoqueryError::NotAFile { path: normalized })
    }
}

/// Lexical normalization: collapses `.` and empty segments and rejects
/// anything that still points outside the root after resolution —
/// parent segments that underflow, absolute paths, drive prefixes.
pub fn normalize_path(input: &str) -> Result<String> {
    let invalid = || RepoqueryError::InvalidPath {
        path: input.to_string(),
    };

    let unified = input.replace('\\', "/");
    if unified.starts_with('/') || unified.contains(':') {
        return Err(invalid());
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(invalid());
                }
            }
            other => segments.push(other),
        }
    }
    Ok(segments.join("/"))
}

/// If `path` lives under directory `prefix`, return the remainder.
/// An empty prefix matches everything.
fn strip_dir_prefix<'p>(path: &'p str, prefix: &str) -> Option<&'p str> {
    if prefix.is_empty() {
        return Some(path);
    }
    path.strip_prefix(prefix)?.strip_prefix('/')
}

fn join_prefix(prefix: &str, child: &str) -> String {
    if prefix.is_empty() {
        child.to_string()
    } else {
        format!("{}/{}", prefix, child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::FileRecord;
    use chrono::Utc;
    use tempfile::TempDir;

    fn snapshot_with(files: &[(&str, &str)]) -> (TempDir, RepoSnapshot) {
        let temp_dir = TempDir::new().unwrap();
        let mut records = Vec::new();
        for (path, content) in files {
            let disk = temp_dir.path().join(path);
            fs::create_dir_all(disk.parent().unwrap()).unwrap();
            fs::write(&disk, content).unwrap();
            records.push(FileRecord {
                path: path.to_string(),
                size: content.len() as u64,
                content_hash: blake3::hash(content.as_bytes()).to_hex().to_string(),
                is_text: true,
            });
        }
        records.sort_by(|a, b| a.path.cmp(&b.path));
        let snapshot = RepoSnapshot {
            repo: "acme/data".to_string(),
            branch: "main".to_string(),
            generation: "gen-1".to_string(),
            fetched_at: Utc::now(),
            files: records,
        };
        (temp_dir, snapshot)
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("data/sales.csv").unwrap(), "data/sales.csv");
        assert_eq!(normalize_path("./data//sales.csv").unwrap(), "data/sales.csv");
        assert_eq!(normalize_path("a/b/../c").unwrap(), "a/c");
        assert_eq!(normalize_path("").unwrap(), "");

        assert!(normalize_path("../../etc/passwd").is_err());
        assert!(normalize_path("./a/../../b").is_err());
        assert!(normalize_path("/etc/passwd").is_err());
        assert!(normalize_path("c:/windows").is_err());
        assert!(normalize_path("..\\secrets").is_err());
    }

    #[test]
    fn test_list_root_and_subdir() {
        let (_tmp, snapshot) = snapshot_with(&[
            ("readme.md", "# hi"),
            ("data/sales.csv", "a,b\n1,2\n"),
            ("data/costs.csv", "a\n1\n"),
            ("data/raw/extra.csv", "x\n"),
        ]);
        let browser = FileBrowser::new(&snapshot, Path::new("/nonexistent"), 1024);

        let root = browser.list(None).unwrap();
        let shaped: Vec<(&str, bool)> = root
            .iter()
            .map(|e| (e.path.as_str(), e.is_directory))
            .collect();
        assert_eq!(shaped, vec![("data", true), ("readme.md", false)]);

        let data = browser.list(Some("data")).unwrap();
        let shaped: Vec<(&str, bool)> = data
            .iter()
            .map(|e| (e.path.as_str(), e.is_directory))
            .collect();
        assert_eq!(
            shaped,
            vec![
                ("data/raw", true),
                ("data/costs.csv", false),
                ("data/sales.csv", false)
            ]
        );

        assert!(browser.list(Some("nothing/here")).unwrap().is_empty());
    }

    #[test]
    fn test_read_ok() {
        let (tmp, snapshot) = snapshot_with(&[("data/sales.csv", "a,b\n1,2\n")]);
        let browser = FileBrowser::new(&snapshot, tmp.path(), 1024);
        assert_eq!(browser.read("data/sales.csv").unwrap(), "a,b\n1,2\n");
        // Normalization tricks that stay inside the root still resolve
        assert_eq!(browser.read("./data/./sales.csv").unwrap(), "a,b\n1,2\n");
    }

    #[test]
    fn test_read_containment() {
        let (tmp, snapshot) = snapshot_with(&[("data/sales.csv", "a,b\n1,2\n")]);
        let browser = FileBrowser::new(&snapshot, tmp.path(), 1024);

        for path in ["../../etc/passwd", "./a/../../b", "/etc/passwd", ""] {
            assert!(
                matches!(browser.read(path), Err(RepoqueryError::InvalidPath { .. })),
                "{} should be rejected",
                path
            );
        }
    }

    #[test]
    fn test_read_error_taxonomy() {
        let (tmp, snapshot) = snapshot_with(&[("data/sales.csv", "a,b\n1,2\n")]);
        let browser = FileBrowser::new(&snapshot, tmp.path(), 4);

        assert!(matches!(
            browser.read("data/missing.csv"),
            Err(RepoqueryError::FileNotFound { .. })
        ));
        assert!(matches!(
            browser.read("data"),
            Err(RepoqueryError::NotAFile { .. })
        ));
        // size 8 > cap 4
        assert!(matches!(
            browser.read("data/sales.csv"),
            Err(RepoqueryError::TooLarge { .. })
        ));
    }
}
