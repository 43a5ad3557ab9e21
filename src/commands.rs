//! Command implementations for the repoquery CLI

use crate::browser::FileBrowser;
use crate::catalog::Catalog;
use crate::cli::{Commands, OutputFormat};
use crate::config::Settings;
use crate::error::{RepoqueryError, Result};
use crate::fetcher::{RepoSnapshot, Source};
use crate::output::{JsonFormatter, PrettyPrinter};
use crate::query::{self, QueryEngine};
use crate::store::{open_store, GenerationStore};
use crate::sync;
use crate::tools::{ToolDispatcher, DESCRIBE_SAMPLE_ROWS};
use std::path::Path;
use std::time::Duration;

/// Execute a command
pub fn execute_command(command: Commands, store_path: Option<&Path>) -> Result<()> {
    let settings = Settings::from_env();

    match command {
        Commands::Sync {
            repo,
            branch,
            from_dir,
            json,
        } => sync_command(settings, store_path, repo, branch, from_dir, json),
        Commands::Tables { format } => tables_command(settings, store_path, &format),
        Commands::Describe { table, format } => {
            describe_command(settings, store_path, &table, &format)
        }
        Commands::Query { sql, format } => query_command(settings, store_path, &sql, &format),
        Commands::Files { prefix } => files_command(settings, store_path, prefix.as_deref()),
        Commands::Read { path } => read_command(settings, store_path, &path),
        Commands::Call { tool, args } => call_command(settings, store_path, &tool, &args),
        Commands::Cleanup { keep } => cleanup_command(settings, store_path, keep),
    }
}

fn sync_command(
    mut settings: Settings,
    store_path: Option<&Path>,
    repo: Option<String>,
    branch: Option<String>,
    from_dir: Option<std::path::PathBuf>,
    json: bool,
) -> Result<()> {
    if let Some(repo) = repo {
        settings.repo = repo;
    }
    if let Some(branch) = branch {
        settings.branch = branch;
    }

    let source = match from_dir {
        Some(dir) => Source::LocalDir(dir),
        None => {
            settings.validate_for_sync()?;
            Source::from_settings(&settings)
        }
    };

    let store = open_store(&settings, store_path)?;
    let report = sync::run_sync(&store, &source, &settings)?;

    if json {
        JsonFormatter::print(&serde_json::to_value(&report)?);
    } else {
        PrettyPrinter::print_sync_report(&report);
    }
    Ok(())
}

fn tables_command(settings: Settings, store_path: Option<&Path>, format: &str) -> Result<()> {
    let format = parse_format(format)?;
    let store = open_store(&settings, store_path)?;
    let catalog = load_current_catalog(&store)?;

    match format {
        OutputFormat::Pretty => PrettyPrinter::print_catalog(&catalog),
        OutputFormat::Json => JsonFormatter::print(&serde_json::to_value(&catalog)?),
    }
    Ok(())
}

fn describe_command(
    settings: Settings,
    store_path: Option<&Path>,
    table: &str,
    format: &str,
) -> Result<()> {
    let format = parse_format(format)?;
    let store = open_store(&settings, store_path)?;
    let generation = store.current_paths()?;
    let catalog = Catalog::load(&generation.catalog_path)?;
    let entry = catalog.require(table)?;
    let sample_rows = query::sample_rows(&generation.db_path, &entry.name, DESCRIBE_SAMPLE_ROWS)?;

    match format {
        OutputFormat::Pretty => PrettyPrinter::print_description(entry, &sample_rows),
        OutputFormat::Json => JsonFormatter::print(&serde_json::json!({
            "table": entry,
            "sample_rows": sample_rows,
        })),
    }
    Ok(())
}

fn query_command(
    settings: Settings,
    store_path: Option<&Path>,
    sql: &str,
    format: &str,
) -> Result<()> {
    let format = parse_format(format)?;
    let store = open_store(&settings, store_path)?;
    let generation = store.current_paths()?;

    let engine = QueryEngine::new(
        &generation.db_path,
        settings.row_limit,
        Duration::from_secs(settings.query_timeout_secs),
    );
    let result = engine.execute(sql)?;

    match format {
        OutputFormat::Pretty => PrettyPrinter::print_query_result(&result),
        OutputFormat::Json => JsonFormatter::print(&serde_json::to_value(&result)?),
    }
    Ok(())
}

fn files_command(settings: Settings, store_path: Option<&Path>, prefix: Option<&str>) -> Result<()> {
    let store = open_store(&settings, store_path)?;
    let generation = store.current_paths()?;
    let snapshot = RepoSnapshot::load(&generation.manifest_path)?;
    let browser = FileBrowser::new(&snapshot, &generation.repo_dir, settings.max_read_bytes);

    PrettyPrinter::print_file_list(&browser.list(prefix)?);
    Ok(())
}

fn read_command(settings: Settings, store_path: Option<&Path>, path: &str) -> Result<()> {
    let store = open_store(&settings, store_path)?;
    let generation = store.current_paths()?;
    let snapshot = RepoSnapshot::load(&generation.manifest_path)?;
    let browser = FileBrowser::new(&snapshot, &generation.repo_dir, settings.max_read_bytes);

    print!("{}", browser.read(path)?);
    Ok(())
}

fn call_command(
    settings: Settings,
    store_path: Option<&Path>,
    tool: &str,
    args: &str,
) -> Result<()> {
    let args: serde_json::Value = serde_json::from_str(args)
        .map_err(|e| RepoqueryError::invalid_argument(format!("arguments must be JSON: {}", e)))?;

    let store = open_store(&settings, store_path)?;
    let dispatcher = ToolDispatcher::new(store, settings);
    JsonFormatter::print(&dispatcher.dispatch(tool, &args));
    Ok(())
}

fn cleanup_command(settings: Settings, store_path: Option<&Path>, keep: usize) -> Result<()> {
    let store = open_store(&settings, store_path)?;
    let removed = store.cleanup(keep)?;
    println!("Removed {} old generation(s).", removed);
    Ok(())
}

fn parse_format(format: &str) -> Result<OutputFormat> {
    OutputFormat::parse(format).map_err(RepoqueryError::invalid_argument)
}

fn load_current_catalog(store: &GenerationStore) -> Result<Catalog> {
    let generation = store.current_paths()?;
    Catalog::load(&generation.catalog_path)
}
