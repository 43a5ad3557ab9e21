//! Read-only SQL execution against the current dataset

use crate::error::{RepoqueryError, Result};
use duckdb::types::{TimeUnit, ValueRef};
use duckdb::Connection;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Result of one query, capped at the configured row limit
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// True when the result was cut off at the row limit
    pub truncated: bool,
}

/// Executes single read-only SELECT statements with a row cap and a
/// wall-clock time budget.
///
/// Each execution opens its own read-only connection, so concurrent
/// queries share nothing and a write can never succeed even if
/// statement validation were bypassed.
pub struct QueryEngine {
    db_path: PathBuf,
    row_limit: usize,
    timeout: Duration,
}

impl QueryEngine {
    pub fn new(db_path: &Path, row_limit: usize, timeout: Duration) -> Self {
        Self {
            db_path: db_path.to_path_buf(),
            row_limit,
            timeout,
        }
    }

    pub fn execute(&self, sql: &str) -> Result<QueryResult> {
        validate_single_select(sql)?;

        let (tx, rx) = mpsc::channel();
        let db_path = self.db_path.clone();
        let sql = sql.to_string();
        let fetch_limit = self.row_limit + 1;

        // The worker owns its connection; on timeout it is simply
        // abandoned and the connection closes when the thread exits.
        thread::spawn(move || {
            let result = run_readonly_query(&db_path, &sql, fetch_limit);
            let _ = tx.send(result);
        });

        let (columns, mut rows) = match rx.recv_timeout(self.timeout) {
            Ok(result) => result?,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                log::warn!("Query exceeded {}s budget, abandoning", self.timeout.as_secs());
                return Err(RepoqueryError::Timeout {
                    seconds: self.timeout.as_secs(),
                });
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(RepoqueryError::execution("query worker terminated"))
            }
        };

        let truncated = rows.len() > self.row_limit;
        rows.truncate(self.row_limit);
        Ok(QueryResult {
            columns,
            rows,
            truncated,
        })
    }
}

/// Structural statement check: the input must parse as exactly one
/// SELECT. DuckDB's SQL serializer refuses anything else, which covers
/// DML, DDL, and statements hidden behind comments or casing tricks
/// that a keyword blacklist would miss.
fn validate_single_select(sql: &str) -> Result<()> {
    let scratch = Connection::open_in_memory()?;
    let serialized: String = scratch
        .prepare("SELECT json_serialize_sql(?::VARCHAR)")?
        .query_row([sql], |row| row.get(0))?;

    let parsed: serde_json::Value = serde_json::from_str(&serialized)?;
    if parsed
        .get("error")
        .and_then(|e| e.as_bool())
        .unwrap_or(false)
    {
        let message = parsed
            .get("error_message")
            .and_then(|m| m.as_str())
            .unwrap_or("statement could not be parsed")
            .to_string();
        let error_type = parsed
            .get("error_type")
            .and_then(|t| t.as_str())
            .unwrap_or("");
        // The serializer parses everything but only serializes SELECT;
        // a parse failure is a syntax error, anything else is policy.
        return if error_type == "parser" {
            Err(RepoqueryError::sql_syntax(message))
        } else {
            Err(RepoqueryError::policy_violation(format!(
                "only a single read-only SELECT statement is allowed: {}",
                message
            )))
        };
    }

    let statement_count = parsed
        .get("statements")
        .and_then(|s| s.as_array())
        .map(|s| s.len())
        .unwrap_or(0);
    if statement_count != 1 {
        return Err(RepoqueryError::policy_violation(format!(
            "expected exactly one statement, found {}",
            statement_count
        )));
    }
    Ok(())
}

fn run_readonly_query(
    db_path: &Path,
    sql: &str,
    fetch_limit: usize,
) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let config = duckdb::Config::default().access_mode(duckdb::AccessMode::ReadOnly)?;
    let connection = Connection::open_with_flags(db_path, config)?;
    // User SQL must not reach the host filesystem (read_csv, COPY, ...)
    connection
        .execute("SET enable_external_access=false", [])
        .map_err(|e| RepoqueryError::execution(e.to_string()))?;

    let mut stmt = connection
        .prepare(sql)
        .map_err(|e| RepoqueryError::execution(e.to_string()))?;
    let mut rows = stmt
        .query([])
        .map_err(|e| RepoqueryError::execution(e.to_string()))?;

    let columns: Vec<String> = rows
        .as_ref()
        .map(|s| s.column_names().iter().map(|c| c.to_string()).collect())
        .unwrap_or_default();

    let mut out = Vec::new();
    while out.len() < fetch_limit {
        let Some(row) = rows
            .next()
            .map_err(|e| RepoqueryError::execution(e.to_string()))?
        else {
            break;
        };
        let mut rendered = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            let value = row
                .get_ref(i)
                .map_err(|e| RepoqueryError::execution(e.to_string()))?;
            rendered.push(value_ref_to_string(value));
        }
        out.push(rendered);
    }

    Ok((columns, out))
}

/// Fetch up to `limit` rows of a table for `describe_table` samples.
pub fn sample_rows(db_path: &Path, table: &str, limit: usize) -> Result<Vec<Vec<String>>> {
    let sql = format!(
        "SELECT * FROM \"{}\" LIMIT {}",
        table.replace('"', "\"\""),
        limit
    );
    let (_, rows) = run_readonly_query(db_path, &sql, limit)?;
    Ok(rows)
}

/// Render a DuckDB value for a tool response. NULL becomes the empty
/// string; temporal types get readable formatting.
pub fn value_ref_to_string(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Boolean(b) => b.to_string(),
        ValueRef::TinyInt(i) => i.to_string(),
        ValueRef::SmallInt(i) => i.to_string(),
        ValueRef::Int(i) => i.to_string(),
        ValueRef::BigInt(i) => i.to_string(),
        ValueRef::HugeInt(i) => i.to_string(),
        ValueRef::UTinyInt(i) => i.to_string(),
        ValueRef::USmallInt(i) => i.to_string(),
        ValueRef::UInt(i) => i.to_string(),
        ValueRef::UBigInt(i) => i.to_string(),
        ValueRef::Float(f) => f.to_string(),
        ValueRef::Double(f) => f.to_string(),
        ValueRef::Decimal(d) => d.to_string(),
        ValueRef::Text(s) => String::from_utf8_lossy(s).to_string(),
        ValueRef::Blob(b) => format!("<blob:{} bytes>", b.len()),
        ValueRef::Date32(days) => match chrono::NaiveDate::from_ymd_opt(1970, 1, 1)
            .and_then(|epoch| epoch.checked_add_signed(chrono::Duration::days(days as i64)))
        {
            Some(date) => date.format("%Y-%m-%d").to_string(),
            None => days.to_string(),
        },
        ValueRef::Timestamp(unit, raw) => {
            let micros = match unit {
                TimeUnit::Second => raw.saturating_mul(1_000_000),
                TimeUnit::Millisecond => raw.saturating_mul(1_000),
                TimeUnit::Microsecond => raw,
                TimeUnit::Nanosecond => raw / 1_000,
            };
            match chrono::DateTime::from_timestamp_micros(micros) {
                Some(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
                None => raw.to_string(),
            }
        }
        ValueRef::Time64(_, raw) => format!("{:?}", raw),
        _ => "<unknown>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_select() {
        assert!(validate_single_select("SELECT 1").is_ok());
        assert!(validate_single_select("select a, b from t where a > 3 order by b").is_ok());
        assert!(validate_single_select("WITH x AS (SELECT 1 AS n) SELECT * FROM x").is_ok());
    }

    #[test]
    fn test_validate_rejects_writes() {
        for sql in [
            "DELETE FROM sales",
            "DROP TABLE sales",
            "UPDATE sales SET amount = 0",
            "INSERT INTO sales VALUES (1)",
            "CREATE TABLE evil (a INT)",
            "/* sneaky */ dElEtE FROM sales",
        ] {
            match validate_single_select(sql) {
                Err(RepoqueryError::PolicyViolation { .. }) => {}
                other => panic!("{} should be a policy violation, got {:?}", sql, other.err()),
            }
        }
    }

    #[test]
    fn test_validate_rejects_multi_statement() {
        assert!(matches!(
            validate_single_select("SELECT 1; SELECT 2"),
            Err(RepoqueryError::PolicyViolation { .. })
        ));
        assert!(matches!(
            validate_single_select("SELECT 1; DROP TABLE sales"),
            Err(RepoqueryError::PolicyViolation { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_garbage() {
        assert!(matches!(
            validate_single_select("SELEC whoops"),
            Err(RepoqueryError::SqlSyntax { .. })
        ));
    }

    #[test]
    fn test_row_cap_and_truncation() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let db_path = temp_dir.path().join("data.duckdb");
        {
            let conn = Connection::open(&db_path).unwrap();
            conn.execute(
                "CREATE TABLE nums AS SELECT * FROM range(150) t(n)",
                [],
            )
            .unwrap();
        }

        let engine = QueryEngine::new(&db_path, 100, Duration::from_secs(30));

        let capped = engine.execute("SELECT n FROM nums ORDER BY n").unwrap();
        assert_eq!(capped.rows.len(), 100);
        assert!(capped.truncated);
        assert_eq!(capped.columns, vec!["n"]);
        assert_eq!(capped.rows[0], vec!["0"]);

        let full = engine
            .execute("SELECT n FROM nums WHERE n < 36 ORDER BY n")
            .unwrap();
        assert_eq!(full.rows.len(), 36);
        assert!(!full.truncated);
    }

    #[test]
    fn test_host_file_access_rejected() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let db_path = temp_dir.path().join("data.duckdb");
        Connection::open(&db_path).unwrap();

        // A file outside any dataset; the engine must not be able to touch it
        let outside = temp_dir.path().join("outside.csv");
        std::fs::write(&outside, "secret\nhunter2\n").unwrap();

        let engine = QueryEngine::new(&db_path, 100, Duration::from_secs(30));
        let sql = format!("SELECT * FROM read_csv('{}')", outside.display());
        assert!(matches!(
            engine.execute(&sql),
            Err(RepoqueryError::Execution { .. })
        ));
    }

    #[test]
    fn test_timeout_abandons_slow_query() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let db_path = temp_dir.path().join("data.duckdb");
        Connection::open(&db_path).unwrap();

        let engine = QueryEngine::new(&db_path, 100, Duration::from_millis(20));
        let result = engine.execute(
            "SELECT max(a.x * b.y) FROM range(1000000) a(x), range(1000000) b(y)",
        );
        assert!(matches!(result, Err(RepoqueryError::Timeout { .. })));
    }

    #[test]
    fn test_timestamp_rendering_respects_unit() {
        for (unit, raw) in [
            (TimeUnit::Second, 1_700_000_000_i64),
            (TimeUnit::Millisecond, 1_700_000_000_000),
            (TimeUnit::Microsecond, 1_700_000_000_000_000),
            (TimeUnit::Nanosecond, 1_700_000_000_000_000_000),
        ] {
            assert_eq!(
                value_ref_to_string(ValueRef::Timestamp(unit, raw)),
                "2023-11-14 22:13:20"
            );
        }
    }

    #[test]
    fn test_execution_error_for_unknown_table() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let db_path = temp_dir.path().join("data.duckdb");
        Connection::open(&db_path).unwrap();

        let engine = QueryEngine::new(&db_path, 100, Duration::from_secs(30));
        assert!(matches!(
            engine.execute("SELECT * FROM missing_table"),
            Err(RepoqueryError::Execution { .. })
        ));
    }
}
