//! SQLite-backed transactional store.
//!
//! Every transaction runs on its own connection so that independent
//! `run_tx` calls from different threads do not share native state. The
//! store also keeps one connection for access outside a transaction (and,
//! for in-memory databases, to keep the shared database alive).

use std::fs;
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};
use ulid::Ulid;

use crate::sqlite::config::SqliteConfig;
use crate::sqlite::error::{SqliteError, SqliteResult};
use crate::transaction::{current, Context, Transactional, Tx};

/// Native transaction of a [`SqliteStore`]: a connection inside `BEGIN`.
///
/// Derefs to [`rusqlite::Connection`] for running statements.
pub struct SqliteTx {
    store_id: Ulid,
    conn: Connection,
}

impl SqliteTx {
    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Deref for SqliteTx {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl DerefMut for SqliteTx {
    fn deref_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

/// SQLite implementation of [`Transactional`].
///
/// Meant to be embedded in repositories: clone it into each one that shares
/// the database, and use [`SqliteStore::with_conn`] in data access methods
/// so they join an open transaction.
///
/// Thread-safe: can be shared across threads via Clone (uses Arc internally).
#[derive(Clone)]
pub struct SqliteStore {
    inner: Arc<SqliteStoreInner>,
}

struct SqliteStoreInner {
    /// Identifies transactions begun by this store.
    id: Ulid,
    config: SqliteConfig,
    /// Open target: file path or shared-cache memory URI.
    target: String,
    /// Connection for access outside a transaction.
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open a store with the given configuration.
    ///
    /// A config without a path opens a fresh in-memory database.
    pub fn open(config: SqliteConfig) -> SqliteResult<Self> {
        let id = Ulid::new();

        let target = match &config.path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)?;
                }
                path.to_string_lossy().into_owned()
            }
            None => format!(
                "file:txkit-{}?mode=memory&cache=shared",
                id.to_string().to_lowercase()
            ),
        };

        let conn = open_connection(&target)?;
        conn.busy_timeout(config.busy_timeout_duration())?;
        if config.path.is_some() && config.wal {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }

        info!(location = %target, behavior = %config.behavior, "sqlite store opened");

        Ok(Self {
            inner: Arc::new(SqliteStoreInner {
                id,
                config,
                target,
                conn: Mutex::new(conn),
            }),
        })
    }

    /// Open a store on a database file with default settings.
    pub fn open_path(path: impl AsRef<Path>) -> SqliteResult<Self> {
        Self::open(SqliteConfig::new(path.as_ref()))
    }

    /// Open a private in-memory store (for testing).
    pub fn in_memory() -> SqliteResult<Self> {
        Self::open(SqliteConfig::in_memory())
    }

    /// Get the store configuration.
    pub fn config(&self) -> &SqliteConfig {
        &self.inner.config
    }

    /// Run one or more statements outside any transaction (schema setup).
    pub fn execute_batch(&self, sql: &str) -> SqliteResult<()> {
        self.inner.conn.lock().execute_batch(sql)?;
        Ok(())
    }

    /// Execute a function with the store's own connection.
    pub fn with_connection<F, T>(&self, f: F) -> SqliteResult<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self.inner.conn.lock();
        Ok(f(&conn)?)
    }

    /// Execute a function with the connection of the transaction active in
    /// `ctx`, or with the store's own connection when there is none.
    ///
    /// Only transactions begun by this store (or a clone of it) are joined.
    /// The connection stays locked while `f` runs, so `f` must not call back
    /// into `with_conn` for the same context.
    pub fn with_conn<F, T>(&self, ctx: &Context, f: F) -> SqliteResult<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        if let Some(tx) = current::<SqliteTx>(ctx) {
            let native = tx.native();
            if native.store_id == self.inner.id {
                return Ok(f(&native.conn)?);
            }
        }
        self.with_connection(f)
    }

    /// Check if `ctx` carries a transaction begun by this store.
    pub fn in_transaction(&self, ctx: &Context) -> bool {
        current::<SqliteTx>(ctx)
            .map(|tx| tx.native().store_id == self.inner.id)
            .unwrap_or(false)
    }
}

impl Transactional for SqliteStore {
    type Native = SqliteTx;
    type Error = SqliteError;

    fn begin(&self, ctx: &Context) -> SqliteResult<SqliteTx> {
        if ctx.is_expired() {
            return Err(SqliteError::DeadlineExceeded);
        }

        let conn = open_connection(&self.inner.target)?;

        let mut timeout = self.inner.config.busy_timeout_duration();
        if let Some(remaining) = ctx.remaining() {
            timeout = timeout.min(remaining);
        }
        conn.busy_timeout(timeout)?;
        conn.execute_batch(self.inner.config.behavior.begin_sql())?;

        debug!(behavior = %self.inner.config.behavior, "sqlite: transaction begun");

        Ok(SqliteTx {
            store_id: self.inner.id,
            conn,
        })
    }

    fn commit(&self, tx: &Tx<SqliteTx>) -> SqliteResult<()> {
        tx.native().execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&self, tx: &Tx<SqliteTx>) -> SqliteResult<()> {
        tx.native().execute_batch("ROLLBACK")?;
        Ok(())
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("target", &self.inner.target)
            .field("behavior", &self.inner.config.behavior)
            .finish()
    }
}

fn open_connection(target: &str) -> SqliteResult<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    Ok(Connection::open_with_flags(target, flags)?)
}
