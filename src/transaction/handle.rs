//! Transaction handle.
//!
//! A [`Tx`] is the opaque carrier of one in-flight native transaction
//! (a SQLite connection inside `BEGIN`, a git transaction branch, ...).
//! The runner threads it through the work function and hands it back to
//! the owning resource for commit or rollback.

use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use ulid::Ulid;

/// Unique identifier of a transaction handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxId(String);

impl TxId {
    /// Generate a fresh, lowercase ULID-based id.
    pub fn generate() -> Self {
        Self(Ulid::new().to_string().to_lowercase())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TxId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Transaction handle wrapping a resource-specific transaction object.
///
/// The wrapped value is set once by [`Tx::wrap`]. Its own state may change
/// through [`Tx::native`] (a connection runs statements, a branch head
/// moves), but swapping in a different native object breaks the contract
/// with the resource that began it. The mutex only makes access safe from
/// several threads; the native object itself is usually not meant for
/// concurrent writers.
pub struct Tx<N> {
    id: TxId,
    started_at: DateTime<Utc>,
    native: Mutex<N>,
}

impl<N> Tx<N> {
    /// Wrap a native transaction object.
    pub fn wrap(native: N) -> Self {
        Self {
            id: TxId::generate(),
            started_at: Utc::now(),
            native: Mutex::new(native),
        }
    }

    /// Get the transaction id.
    pub fn id(&self) -> &TxId {
        &self.id
    }

    /// When the handle was created.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Access the wrapped native transaction.
    ///
    /// Blocks while another thread holds the guard. Callers mutate the
    /// native object in place and must not replace it.
    pub fn native(&self) -> MutexGuard<'_, N> {
        self.native.lock()
    }

    /// Consume the handle and return the native transaction.
    pub fn into_native(self) -> N {
        self.native.into_inner()
    }
}

impl<N> fmt::Debug for Tx<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tx")
            .field("id", &self.id)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}
