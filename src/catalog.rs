//! Catalog metadata: indexed tables and their schemas

use crate::error::{RepoqueryError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Semantic column type inferred from sampled values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Float,
    Boolean,
    Date,
    Text,
    /// Column had no non-null values in the sample window
    Unknown,
}

impl ColumnType {
    /// Storage type used when creating the DuckDB table.
    pub fn duckdb_type(&self) -> &'static str {
        match self {
            Self::Integer => "BIGINT",
            Self::Float => "DOUBLE",
            Self::Boolean => "BOOLEAN",
            Self::Date => "DATE",
            Self::Text | Self::Unknown => "VARCHAR",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Text => "text",
            Self::Unknown => "unknown",
        }
    }
}

/// One column of an indexed table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
}

/// One indexed table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableEntry {
    /// Logical table name, unique within the catalog
    pub name: String,
    /// Repository-relative path of the source file
    pub source_path: String,
    pub columns: Vec<ColumnDef>,
    pub row_count: u64,
    pub indexed_at: DateTime<Utc>,
}

/// The set of tables describing one generation's dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub generation: String,
    pub built_at: DateTime<Utc>,
    /// Entries sorted by table name
    pub tables: Vec<TableEntry>,
}

impl Catalog {
    pub fn new(generation: impl Into<String>) -> Self {
        Self {
            generation: generation.into(),
            built_at: Utc::now(),
            tables: Vec::new(),
        }
    }

    /// Add an entry, keeping the table list sorted by name.
    pub fn insert(&mut self, entry: TableEntry) {
        let pos = self
            .tables
            .binary_search_by(|t| t.name.cmp(&entry.name))
            .unwrap_or_else(|p| p);
        self.tables.insert(pos, entry);
    }

    pub fn get(&self, name: &str) -> Option<&TableEntry> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn require(&self, name: &str) -> Result<&TableEntry> {
        self.get(name).ok_or_else(|| RepoqueryError::TableNotFound {
            name: name.to_string(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| RepoqueryError::store(format!("failed to read catalog: {}", e)))?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Derive a SQL-friendly table name from a source file path.
///
/// Uses the file stem, lowercased, with every non-alphanumeric run
/// squashed to a single underscore. A leading digit gets a `t_` prefix
/// so the name never needs quoting in hand-written SQL.
pub fn table_name_from_path(source_path: &str) -> String {
    let stem = Path::new(source_path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("table");

    let mut name = String::with_capacity(stem.len());
    let mut last_was_sep = false;
    for c in stem.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            name.push(c);
            last_was_sep = false;
        } else if !last_was_sep && !name.is_empty() {
            name.push('_');
            last_was_sep = true;
        }
    }
    while name.ends_with('_') {
        name.pop();
    }
    if name.is_empty() {
        name = "table".to_string();
    }
    if name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        name = format!("t_{}", name);
    }
    name
}

/// Tracks assigned table names and resolves collisions with
/// deterministic numeric suffixes (`_2`, `_3`, ...).
#[derive(Debug, Default)]
pub struct NameRegistry {
    taken: BTreeSet<String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&mut self, source_path: &str) -> String {
        let base = table_name_from_path(source_path);
        let mut candidate = base.clone();
        let mut n = 1;
        while self.taken.contains(&candidate) {
            n += 1;
            candidate = format!("{}_{}", base, n);
        }
        self.taken.insert(candidate.clone());
        candidate
    }
}
