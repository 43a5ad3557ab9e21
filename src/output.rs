//! Output formatting utilities

use crate::browser::ListEntry;
use crate::catalog::{Catalog, TableEntry};
use crate::query::QueryResult;
use crate::sync::SyncReport;
use serde_json::Value;

/// Pretty printer for repoquery output
pub struct PrettyPrinter;

impl PrettyPrinter {
    /// Print the table list
    pub fn print_catalog(catalog: &Catalog) {
        if catalog.tables.is_empty() {
            println!("No tables have been indexed yet.");
            return;
        }

        println!("📚 Indexed tables (generation {}):", catalog.generation);
        for (i, table) in catalog.tables.iter().enumerate() {
            let prefix = if i == catalog.tables.len() - 1 {
                "└─"
            } else {
                "├─"
            };
            println!(
                "{} {}  ({} rows, source: {})",
                prefix, table.name, table.row_count, table.source_path
            );
        }
    }

    /// Print a table description with its sample rows
    pub fn print_description(table: &TableEntry, sample_rows: &[Vec<String>]) {
        println!("📋 Table: {}", table.name);
        println!("├─ Source: {}", table.source_path);
        println!("├─ Rows: {}", table.row_count);
        println!("└─ Columns:");
        for (i, column) in table.columns.iter().enumerate() {
            let prefix = if i == table.columns.len() - 1 {
                "   └─"
            } else {
                "   ├─"
            };
            println!("{} {}: {}", prefix, column.name, column.column_type.as_str());
        }

        if !sample_rows.is_empty() {
            let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
            println!("\nSample (first {} rows):", sample_rows.len());
            print_row_grid(&names, sample_rows);
        }
    }

    /// Print a query result as a simple grid
    pub fn print_query_result(result: &QueryResult) {
        if result.rows.is_empty() {
            println!("Query returned 0 rows.");
            println!("Columns: {}", result.columns.join(", "));
            return;
        }

        println!("Rows returned: {}\n", result.rows.len());
        let names: Vec<&str> = result.columns.iter().map(|c| c.as_str()).collect();
        print_row_grid(&names, &result.rows);

        if result.truncated {
            println!("\n... (truncated at {} rows)", result.rows.len());
        }
    }

    /// Print a file listing
    pub fn print_file_list(entries: &[ListEntry]) {
        if entries.is_empty() {
            println!("No files found.");
            return;
        }
        for entry in entries {
            if entry.is_directory {
                println!("  {}/", entry.path);
            } else {
                println!("  {}  ({})", entry.path, format_bytes(entry.size));
            }
        }
    }

    /// Print a sync report
    pub fn print_sync_report(report: &SyncReport) {
        println!("✅ Sync complete");
        println!("├─ Generation: {}", report.generation);
        println!("├─ Files synced: {}", report.files_synced);
        println!("├─ Tables indexed: {}", report.tables_indexed);
        println!("├─ Tables failed: {}", report.tables_failed);
        println!("└─ Duration: {}ms", report.duration_ms);

        for failure in &report.failures {
            println!("   ⚠️  {} ({}): {}", failure.table, failure.source, failure.cause);
        }
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn print(value: &Value) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Failed to serialize output: {}", e),
        }
    }
}

fn print_row_grid(columns: &[&str], rows: &[Vec<String>]) {
    println!("{}", columns.join(" | "));
    println!(
        "{}",
        columns.iter().map(|_| "---").collect::<Vec<_>>().join(" | ")
    );
    for row in rows {
        println!("{}", row.join(" | "));
    }
}

/// Format byte count in human-readable form
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}
