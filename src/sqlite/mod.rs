//! SQLite transactional store.
//!
//! [`SqliteStore`] is the ready-made [`Transactional`](crate::transaction::Transactional)
//! for SQL repositories. Repositories embed a clone of the store and run
//! their statements through [`SqliteStore::with_conn`], which picks the
//! connection of the active transaction when there is one.
//!
//! # Usage
//!
//! ```ignore
//! use txkit::sqlite::{SqliteConfig, SqliteStore};
//! use txkit::transaction::{Context, Transactional};
//!
//! let store = SqliteStore::open(SqliteConfig::new("ledger.db"))?;
//! store.run_tx(&Context::background(), |ctx| {
//!     store.with_conn(ctx, |conn| conn.execute("DELETE FROM accounts", []))?;
//!     Ok::<_, MyError>(())
//! })?;
//! ```

mod behavior;
mod config;
mod error;
mod store;

pub use behavior::TxBehavior;
pub use config::SqliteConfig;
pub use error::{SqliteError, SqliteResult};
pub use store::{SqliteStore, SqliteTx};
