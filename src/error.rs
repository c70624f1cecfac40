//! Crate-wide error type.

use crate::config::ConfigError;
use crate::oracle::OracleError;
use std::path::PathBuf;

/// Errors that abort an operation.
///
/// Per-item failures during execution and undo are reported through
/// [`crate::executor::ExecutionReport`] and [`crate::undo::UndoReport`]
/// instead.
#[derive(Debug, thiserror::Error)]
pub enum OrganizeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// The base directory path is invalid or doesn't exist.
    #[error("Invalid base path {}: {reason}", .path.display())]
    InvalidBasePath { path: PathBuf, reason: String },

    #[error("Failed to create directory {}: {source}", .path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", .path.display())]
    ArtifactWriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write operation log {}: {source}", .path.display())]
    HistoryWriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read operation log {}: {source}", .path.display())]
    HistoryReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid operation log {}: {reason}", .path.display())]
    InvalidHistoryFormat { path: PathBuf, reason: String },

    #[error("No previous organization found to undo in {}", .dir.display())]
    NoHistory { dir: PathBuf },

    /// The oracle's folder schema could not be used.
    #[error("Invalid folder schema: {reason}")]
    InvalidSchema { reason: String },

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Terminal interaction failed: {0}")]
    Prompt(std::io::Error),
}

/// Result type for organization operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_error_message() {
        let err = OrganizeError::Prompt(std::io::Error::other("not a terminal"));
        assert_eq!(err.to_string(), "Terminal interaction failed: not a terminal");
    }
}
