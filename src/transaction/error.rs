//! Transaction error types.

use thiserror::Error;

/// Result type for a unit of work run inside a transaction.
///
/// `E` is the work function's error, `S` the resource's error.
pub type TxResult<T, E, S> = Result<T, TxError<E, S>>;

/// Outcome of a failed `run_tx`.
///
/// Every variant keeps the original cause: a failed rollback never hides
/// the work error that triggered it.
#[derive(Debug, Error)]
pub enum TxError<E, S> {
    /// The resource could not start a transaction. Work never ran.
    #[error("tx: error beginning transaction: {0}")]
    Begin(#[source] S),

    /// The work failed and the transaction was rolled back.
    #[error(transparent)]
    Work(E),

    /// The work failed and rolling back failed too.
    #[error("tx: error rolling back transaction: {rollback}: {work}")]
    Rollback {
        #[source]
        work: E,
        rollback: S,
    },

    /// The work succeeded but the commit failed. Its result is discarded.
    #[error("tx: error committing transaction: {0}")]
    Commit(#[source] S),
}

impl<E, S> TxError<E, S> {
    /// Check if the work function failed (whether or not rollback did).
    pub fn is_work(&self) -> bool {
        matches!(self, TxError::Work(_) | TxError::Rollback { .. })
    }

    /// The work function's error, if it failed.
    pub fn work_error(&self) -> Option<&E> {
        match self {
            TxError::Work(e) | TxError::Rollback { work: e, .. } => Some(e),
            TxError::Begin(_) | TxError::Commit(_) => None,
        }
    }

    /// Consume and return the work function's error, if it failed.
    pub fn into_work_error(self) -> Option<E> {
        match self {
            TxError::Work(e) | TxError::Rollback { work: e, .. } => Some(e),
            TxError::Begin(_) | TxError::Commit(_) => None,
        }
    }

    /// The resource error from begin, commit or rollback, if any.
    pub fn resource_error(&self) -> Option<&S> {
        match self {
            TxError::Begin(s) | TxError::Commit(s) => Some(s),
            TxError::Rollback { rollback, .. } => Some(rollback),
            TxError::Work(_) => None,
        }
    }
}
