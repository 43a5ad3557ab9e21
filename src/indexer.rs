//! Table indexing: schema inference and dataset materialization
//!
//! Every `.csv` file in a repository snapshot becomes one DuckDB table
//! in the generation's database. Types are inferred from a fixed prefix
//! of rows so identical inputs always produce identical schemas. A file
//! that fails to parse is reported and skipped; it never aborts the run.

use crate::catalog::{Catalog, ColumnDef, ColumnType, NameRegistry, TableEntry};
use crate::error::Result;
use crate::fetcher::RepoSnapshot;
use crate::store::GenerationPaths;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use duckdb::Connection;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One table that could not be indexed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexFailure {
    pub table: String,
    pub source: String,
    pub cause: String,
}

/// Boolean literals recognized during inference. `0`/`1` are excluded
/// so numeric columns never infer as boolean.
const BOOLEAN_LITERALS: &[&str] = &["true", "false", "t", "f", "yes", "no"];

/// Build the generation's database and catalog from a snapshot.
///
/// Returns the catalog of successfully indexed tables plus the list of
/// per-file failures. Only an error opening the database itself is
/// fatal.
pub fn reindex(
    snapshot: &RepoSnapshot,
    generation: &GenerationPaths,
    sample_window: usize,
) -> Result<(Catalog, Vec<IndexFailure>)> {
    let connection = Connection::open(&generation.db_path)?;
    connection.execute("SET preserve_insertion_order=true", [])?;

    let mut catalog = Catalog::new(generation.id.clone());
    let mut failures = Vec::new();
    let mut names = NameRegistry::new();

    // Manifest order is path order, which keeps collision suffixes stable
    for file in snapshot.files.iter().filter(|f| is_tabular(&f.path)) {
        let table_name = names.claim(&file.path);
        let disk_path = generation.repo_dir.join(&file.path);

        match index_file(&connection, &table_name, &disk_path, sample_window) {
            Ok((columns, row_count)) => {
                log::info!(
                    "Indexed table '{}' from {} ({} rows)",
                    table_name,
                    file.path,
                    row_count
                );
                catalog.insert(TableEntry {
                    name: table_name,
                    source_path: file.path.clone(),
                    columns,
                    row_count,
                    indexed_at: Utc::now(),
                });
            }
            Err(e) => {
                log::warn!("Skipping {}: {}", file.path, e);
                // A half-created table must not leak into the dataset
                let _ = connection.execute(
                    &format!("DROP TABLE IF EXISTS {}", quote_ident(&table_name)),
                    [],
                );
                failures.push(IndexFailure {
                    table: table_name,
                    source: file.path.clone(),
                    cause: e.to_string(),
                });
            }
        }
    }

    catalog.save(&generation.catalog_path)?;
    Ok((catalog, failures))
}

/// The tabular-file selector: case-insensitive extension match.
pub fn is_tabular(path: &str) -> bool {
    std::path::Path::new(path)
        .extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

fn index_file(
    connection: &Connection,
    table_name: &str,
    disk_path: &std::path::Path,
    sample_window: usize,
) -> Result<(Vec<ColumnDef>, u64)> {
    let path_literal = escape_literal(&disk_path.to_string_lossy());

    // Pass 1: sample a fixed row prefix as raw strings
    let sampled = sample_file(connection, &path_literal, sample_window)?;

    let mut columns = Vec::with_capacity(sampled.len());
    let mut storage = Vec::with_capacity(sampled.len());
    for (name, values) in &sampled {
        let column_type = infer_column_type(values);
        storage.push(storage_type(column_type, values));
        columns.push(ColumnDef {
            name: name.clone(),
            column_type,
        });
    }

    // Pass 2: create the typed table with the inferred schema
    let column_spec = columns
        .iter()
        .zip(&storage)
        .map(|(col, ty)| format!("'{}': '{}'", escape_literal(&col.name), ty))
        .collect::<Vec<_>>()
        .join(", ");
    connection.execute(
        &format!(
            "CREATE TABLE {} AS SELECT * FROM read_csv('{}', header=true, columns={{{}}})",
            quote_ident(table_name),
            path_literal,
            column_spec
        ),
        [],
    )?;

    let row_count: u64 = connection
        .prepare(&format!(
            "SELECT COUNT(*) FROM {}",
            quote_ident(table_name)
        ))?
        .query_row([], |row| row.get(0))?;

    Ok((columns, row_count))
}

/// Read header names and up to `sample_window` rows of raw values,
/// keyed by column name in file order.
fn sample_file(
    connection: &Connection,
    path_literal: &str,
    sample_window: usize,
) -> Result<IndexMap<String, Vec<Option<String>>>> {
    let sql = format!(
        "SELECT * FROM read_csv('{}', header=true, all_varchar=true) LIMIT {}",
        path_literal, sample_window
    );
    let mut stmt = connection.prepare(&sql)?;
    let mut rows = stmt.query([])?;

    let names: Vec<String> = rows
        .as_ref()
        .map(|s| s.column_names().iter().map(|c| c.to_string()).collect())
        .unwrap_or_default();

    let mut sampled: IndexMap<String, Vec<Option<String>>> =
        names.into_iter().map(|n| (n, Vec::new())).collect();

    while let Some(row) = rows.next()? {
        for (i, (_, values)) in sampled.iter_mut().enumerate() {
            let value = match row.get_ref(i)? {
                duckdb::types::ValueRef::Null => None,
                duckdb::types::ValueRef::Text(s) => {
                    let text = String::from_utf8_lossy(s).to_string();
                    if text.is_empty() {
                        None
                    } else {
                        Some(text)
                    }
                }
                other => Some(format!("{:?}", other)),
            };
            values.push(value);
        }
    }

    Ok(sampled)
}

/// Type inference over sampled values: integer, then float, then
/// boolean, then date, else text. All-null columns are unknown.
pub fn infer_column_type(values: &[Option<String>]) -> ColumnType {
    let non_null: Vec<&str> = values
        .iter()
        .filter_map(|v| v.as_deref())
        .collect();

    if non_null.is_empty() {
        return ColumnType::Unknown;
    }
    if non_null.iter().all(|v| v.trim().parse::<i64>().is_ok()) {
        return ColumnType::Integer;
    }
    if non_null.iter().all(|v| v.trim().parse::<f64>().is_ok()) {
        return ColumnType::Float;
    }
    if non_null
        .iter()
        .all(|v| BOOLEAN_LITERALS.contains(&v.trim().to_lowercase().as_str()))
    {
        return ColumnType::Boolean;
    }
    if non_null.iter().all(|v| parse_date_like(v).is_some()) {
        return ColumnType::Date;
    }
    ColumnType::Text
}

/// Whether a value matches a recognized date/time pattern. Returns
/// true for the pure-date form so storage can stay DATE when no
/// sampled value carries a time component.
fn parse_date_like(value: &str) -> Option<bool> {
    let trimmed = value.trim();
    if NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").is_ok() {
        return Some(true);
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if NaiveDateTime::parse_from_str(trimmed, pattern).is_ok() {
            return Some(false);
        }
    }
    None
}

/// DuckDB storage type for a column. Date columns fall back to
/// TIMESTAMP when any sampled value has a time component.
fn storage_type(column_type: ColumnType, values: &[Option<String>]) -> &'static str {
    if column_type == ColumnType::Date {
        let all_pure_dates = values
            .iter()
            .filter_map(|v| v.as_deref())
            .all(|v| parse_date_like(v) == Some(true));
        if !all_pure_dates {
            return "TIMESTAMP";
        }
    }
    column_type.duckdb_type()
}

fn escape_literal(s: &str) -> String {
    s.replace('\'', "''")
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
