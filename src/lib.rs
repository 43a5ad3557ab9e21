//! # repoquery
//!
//! Periodically ingests tabular files (CSV) from a remote repository,
//! materializes them into a DuckDB dataset, and exposes a constrained
//! query and file-browsing tool surface for a conversational agent.

pub mod browser;
pub mod catalog;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod indexer;
pub mod output;
pub mod query;
pub mod store;
pub mod sync;
pub mod tools;

pub use config::Settings;
pub use error::{RepoqueryError, Result};
pub use store::GenerationStore;
pub use tools::ToolDispatcher;

/// Current format version for store metadata
pub const FORMAT_VERSION: &str = "1.0.0";

/// Default hard cap on rows returned by a query
pub const DEFAULT_ROW_LIMIT: usize = 100;

/// Default query execution budget in seconds
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// Default maximum file size returned by `read_repo_file`
pub const DEFAULT_MAX_READ_BYTES: u64 = 65_536;

/// Default number of leading rows sampled for type inference
pub const DEFAULT_SAMPLE_WINDOW: usize = 1000;

/// Default number of generations retained after publish
pub const DEFAULT_KEEP_GENERATIONS: usize = 3;
