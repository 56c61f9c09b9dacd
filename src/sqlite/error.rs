//! SQLite adapter error types.

use thiserror::Error;

/// Result type for SQLite store operations.
pub type SqliteResult<T> = Result<T, SqliteError>;

/// Errors from the SQLite store.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// Error reported by SQLite, passed through unchanged.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// The context expired before the transaction could begin.
    #[error("deadline exceeded before transaction began")]
    DeadlineExceeded,

    /// I/O error while preparing the database location.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SqliteError {
    /// Check if the database was busy or locked by another connection.
    pub fn is_busy(&self) -> bool {
        match self {
            SqliteError::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_classification() {
        let busy = SqliteError::Sqlite(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        ));
        assert!(busy.is_busy());

        assert!(!SqliteError::DeadlineExceeded.is_busy());
        assert!(!SqliteError::Sqlite(rusqlite::Error::QueryReturnedNoRows).is_busy());
    }
}
