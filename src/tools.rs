//! Tool dispatch for the agent caller
//!
//! Each named tool maps to exactly one read operation. Arguments arrive
//! as loose JSON and are validated against the tool's expected shape
//! before anything touches the engine; results and errors both come
//! back as structured JSON so the caller can relay them verbatim.

use crate::browser::FileBrowser;
use crate::catalog::Catalog;
use crate::config::Settings;
use crate::error::{RepoqueryError, Result};
use crate::fetcher::RepoSnapshot;
use crate::query::{self, QueryEngine, QueryResult};
use crate::store::GenerationStore;
use serde_json::{json, Value};
use std::time::Duration;

/// Rows included in a `describe_table` sample
pub const DESCRIBE_SAMPLE_ROWS: usize = 5;

/// Stateless dispatcher over the current published generation.
///
/// Every call resolves the `CURRENT` pointer afresh, so a sync that
/// publishes mid-conversation is picked up by the next tool call as a
/// whole, never piecemeal.
pub struct ToolDispatcher {
    store: GenerationStore,
    settings: Settings,
}

impl ToolDispatcher {
    pub fn new(store: GenerationStore, settings: Settings) -> Self {
        Self { store, settings }
    }

    /// Dispatch a named tool call, always returning a response envelope.
    pub fn dispatch(&self, tool: &str, args: &Value) -> Value {
        match self.try_dispatch(tool, args) {
            Ok(payload) => payload,
            Err(e) => json!({
                "ok": false,
                "error": { "kind": e.kind(), "message": e.to_string() },
            }),
        }
    }

    fn try_dispatch(&self, tool: &str, args: &Value) -> Result<Value> {
        match tool {
            "list_tables" => self.list_tables(),
            "describe_table" => self.describe_table(&require_str(args, "table_name")?),
            "query_data" => self.query_data(&require_str(args, "sql")?),
            "list_repo_files" => self.list_repo_files(optional_str(args, "path_prefix")?),
            "read_repo_file" => self.read_repo_file(&require_str(args, "file_path")?),
            other => Err(RepoqueryError::invalid_argument(format!(
                "unknown tool: {}",
                other
            ))),
        }
    }

    pub fn list_tables(&self) -> Result<Value> {
        let catalog = self.current_catalog()?;
        let tables: Vec<Value> = catalog
            .tables
            .iter()
            .map(|t| {
                json!({
                    "table_name": t.name,
                    "row_count": t.row_count,
                    "source_path": t.source_path,
                })
            })
            .collect();
        Ok(json!({ "ok": true, "tables": tables }))
    }

    pub fn describe_table(&self, table_name: &str) -> Result<Value> {
        let generation = self.store.current_paths()?;
        let catalog = Catalog::load(&generation.catalog_path)?;
        let entry = catalog.require(table_name)?;

        let columns: Vec<Value> = entry
            .columns
            .iter()
            .map(|c| json!({ "name": c.name, "type": c.column_type.as_str() }))
            .collect();
        let sample_rows =
            query::sample_rows(&generation.db_path, &entry.name, DESCRIBE_SAMPLE_ROWS)?;

        Ok(json!({
            "ok": true,
            "table_name": entry.name,
            "source_path": entry.source_path,
            "row_count": entry.row_count,
            "columns": columns,
            "sample_rows": sample_rows,
        }))
    }

    pub fn query_data(&self, sql: &str) -> Result<Value> {
        let generation = self.store.current_paths()?;
        let engine = QueryEngine::new(
            &generation.db_path,
            self.settings.row_limit,
            Duration::from_secs(self.settings.query_timeout_secs),
        );
        let QueryResult {
            columns,
            rows,
            truncated,
        } = engine.execute(sql)?;
        Ok(json!({
            "ok": true,
            "columns": columns,
            "row_count": rows.len(),
            "rows": rows,
            "truncated": truncated,
        }))
    }

    pub fn list_repo_files(&self, path_prefix: Option<String>) -> Result<Value> {
        let generation = self.store.current_paths()?;
        let snapshot = RepoSnapshot::load(&generation.manifest_path)?;
        let browser = FileBrowser::new(
            &snapshot,
            &generation.repo_dir,
            self.settings.max_read_bytes,
        );
        let entries = browser.list(path_prefix.as_deref())?;
        let files: Vec<Value> = entries
            .iter()
            .map(|e| json!({ "path": e.path, "size": e.size, "is_directory": e.is_directory }))
            .collect();
        Ok(json!({ "ok": true, "files": files }))
    }

    pub fn read_repo_file(&self, file_path: &str) -> Result<Value> {
        let generation = self.store.current_paths()?;
        let snapshot = RepoSnapshot::load(&generation.manifest_path)?;
        let browser = FileBrowser::new(
            &snapshot,
            &generation.repo_dir,
            self.settings.max_read_bytes,
        );
        let content = browser.read(file_path)?;
        Ok(json!({ "ok": true, "path": file_path, "content": content }))
    }

    fn current_catalog(&self) -> Result<Catalog> {
        let generation = self.store.current_paths()?;
        Catalog::load(&generation.catalog_path)
    }
}

fn require_str(args: &Value, field: &str) -> Result<String> {
    match args.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(RepoqueryError::invalid_argument(format!(
            "'{}' must not be empty",
            field
        ))),
        Some(other) => Err(RepoqueryError::invalid_argument(format!(
            "'{}' must be a string, got {}",
            field,
            json_type_name(other)
        ))),
        None => Err(RepoqueryError::invalid_argument(format!(
            "missing required argument '{}'",
            field
        ))),
    }
}

fn optional_str(args: &Value, field: &str) -> Result<Option<String>> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(RepoqueryError::invalid_argument(format!(
            "'{}' must be a string, got {}",
            field,
            json_type_name(other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
