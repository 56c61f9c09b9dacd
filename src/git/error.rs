//! Git store error types.
//!
//! All errors that can occur in the git-backed store are defined here.

use thiserror::Error;

use crate::git::types::InvalidNameError;

/// Result type alias for git store operations.
pub type GitResult<T> = Result<T, GitError>;

/// The main error type for the git-backed store.
#[derive(Debug, Error)]
pub enum GitError {
    /// Error from the underlying git library, passed through unchanged.
    #[error(transparent)]
    Git(#[from] git2::Error),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid collection, key or branch name.
    #[error("invalid name: {0}")]
    InvalidName(#[from] InvalidNameError),

    /// The repository has no main branch.
    #[error("repository is empty: no main branch")]
    EmptyRepository,

    /// The branch/ref was not found.
    #[error("ref not found: {0}")]
    RefNotFound(String),

    /// The branch moved while a commit was being published.
    #[error("concurrent modification: branch {branch} was updated by another transaction")]
    ConcurrentModification { branch: String },

    /// Another transaction changed the same documents.
    #[error("transaction conflict on paths: {}", .paths.join(", "))]
    Conflict { paths: Vec<String> },

    /// The context expired before the transaction could begin.
    #[error("deadline exceeded before transaction began")]
    DeadlineExceeded,

    /// I/O error (filesystem level).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl GitError {
    /// Check if this error is a conflict with another writer.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            GitError::Conflict { .. } | GitError::ConcurrentModification { .. }
        )
    }

    /// Check if rerunning the whole transaction may succeed.
    pub fn is_retryable(&self) -> bool {
        self.is_conflict()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let conflict = GitError::Conflict {
            paths: vec!["accounts/1.json".to_string(), "accounts/2.json".to_string()],
        };
        assert!(conflict.is_conflict());
        assert!(conflict.is_retryable());
        assert_eq!(
            conflict.to_string(),
            "transaction conflict on paths: accounts/1.json, accounts/2.json"
        );

        assert!(!GitError::EmptyRepository.is_conflict());
        assert!(!GitError::DeadlineExceeded.is_retryable());
    }
}
