//! Error types for repoquery operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RepoqueryError>;

#[derive(Error, Debug)]
pub enum RepoqueryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Walkdir error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Repository not found: {repo}@{branch}")]
    RepoNotFound { repo: String, branch: String },

    #[error("Rate limited by remote: {message}")]
    RateLimited { message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Table not found: {name}")]
    TableNotFound { name: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Not a readable file: {path}")]
    NotAFile { path: String },

    #[error("Invalid path: {path}")]
    InvalidPath { path: String },

    #[error("File too large: {path} is {size} bytes (limit {limit})")]
    TooLarge { path: String, size: u64, limit: u64 },

    #[error("SQL syntax error: {message}")]
    SqlSyntax { message: String },

    #[error("Disallowed statement: {message}")]
    PolicyViolation { message: String },

    #[error("Query execution error: {message}")]
    Execution { message: String },

    #[error("Query exceeded time budget of {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("A sync is already in progress")]
    SyncInProgress,

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl RepoqueryError {
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network {
            message: msg.into(),
        }
    }

    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited {
            message: msg.into(),
        }
    }

    pub fn sql_syntax(msg: impl Into<String>) -> Self {
        Self::SqlSyntax {
            message: msg.into(),
        }
    }

    pub fn policy_violation(msg: impl Into<String>) -> Self {
        Self::PolicyViolation {
            message: msg.into(),
        }
    }

    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution {
            message: msg.into(),
        }
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: msg.into(),
        }
    }

    /// Stable error kind used in structured tool responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RepoNotFound { .. } | Self::TableNotFound { .. } | Self::FileNotFound { .. } => {
                "not_found"
            }
            Self::NotAFile { .. } => "not_a_file",
            Self::InvalidPath { .. } => "invalid_path",
            Self::TooLarge { .. } => "too_large",
            Self::SqlSyntax { .. } => "syntax_error",
            Self::PolicyViolation { .. } => "policy_violation",
            Self::Execution { .. } | Self::DuckDb(_) => "execution_error",
            Self::Timeout { .. } => "timeout",
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::RateLimited { .. } => "rate_limited",
            Self::Network { .. } | Self::Http(_) => "network_error",
            Self::SyncInProgress => "sync_in_progress",
            _ => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            RepoqueryError::TableNotFound {
                name: "sales".to_string()
            }
            .kind(),
            "not_found"
        );
        assert_eq!(
            RepoqueryError::policy_violation("DELETE").kind(),
            "policy_violation"
        );
        assert_eq!(RepoqueryError::Timeout { seconds: 30 }.kind(), "timeout");
        assert_eq!(RepoqueryError::store("broken pointer").kind(), "internal");
    }
}
