//! Command-line interface for repoquery

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "repoquery")]
#[command(about = "Index a repository's tabular files into DuckDB and query them")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override blob store location
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch the repository and rebuild the dataset
    Sync {
        /// Repository in owner/name form (defaults to REPOQUERY_REPO)
        #[arg(long)]
        repo: Option<String>,

        /// Branch to sync (defaults to REPOQUERY_BRANCH or "main")
        #[arg(long)]
        branch: Option<String>,

        /// Sync from a local directory instead of a remote repository
        #[arg(long, conflicts_with_all = ["repo", "branch"])]
        from_dir: Option<PathBuf>,

        /// Print the sync report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List indexed tables
    Tables {
        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty")]
        format: String,
    },

    /// Show a table's schema and a row sample
    Describe {
        /// Table name
        table: String,

        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty")]
        format: String,
    },

    /// Run a read-only SQL query against the dataset
    Query {
        /// A single SELECT statement
        sql: String,

        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty")]
        format: String,
    },

    /// List files in the synced repository
    Files {
        /// Optional path prefix to list under
        prefix: Option<String>,
    },

    /// Print the content of one repository file
    Read {
        /// Repository-relative file path
        path: String,
    },

    /// Invoke a tool exactly as the agent would
    Call {
        /// Tool name (list_tables, describe_table, query_data, ...)
        tool: String,

        /// Tool arguments as a JSON object
        #[arg(default_value = "{}")]
        args: String,
    },

    /// Remove old generations from the store
    Cleanup {
        /// Number of generations to keep
        #[arg(long, default_value = "3")]
        keep: usize,
    },
}

/// Parse output format string
#[derive(Debug, Clone)]
pub enum OutputFormat {
    Pretty,
    Json,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {}. Use 'pretty' or 'json'", s)),
        }
    }
}
