//! SQLite transaction behaviors.
//!
//! SQLite offers three ways to start a transaction:
//! - Deferred: locks are taken lazily on first read/write
//! - Immediate: the write lock is taken at `BEGIN`
//! - Exclusive: like immediate, and readers are kept out too in rollback-journal mode

use std::fmt;

use serde::{Deserialize, Serialize};

/// How `BEGIN` acquires locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxBehavior {
    /// `BEGIN DEFERRED`.
    ///
    /// No lock until the first statement. Two deferred transactions that
    /// both read and then write can fail with `SQLITE_BUSY` at the upgrade.
    #[default]
    Deferred,

    /// `BEGIN IMMEDIATE`.
    ///
    /// Takes the write lock up front, so a read-modify-write unit of work
    /// waits at `BEGIN` (bounded by the busy timeout) instead of failing later.
    Immediate,

    /// `BEGIN EXCLUSIVE`.
    Exclusive,
}

impl TxBehavior {
    /// The statement that opens a transaction with this behavior.
    pub fn begin_sql(&self) -> &'static str {
        match self {
            TxBehavior::Deferred => "BEGIN DEFERRED",
            TxBehavior::Immediate => "BEGIN IMMEDIATE",
            TxBehavior::Exclusive => "BEGIN EXCLUSIVE",
        }
    }

    /// Check if the write lock is taken at `BEGIN`.
    pub fn locks_eagerly(&self) -> bool {
        !matches!(self, TxBehavior::Deferred)
    }
}

impl fmt::Display for TxBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxBehavior::Deferred => write!(f, "DEFERRED"),
            TxBehavior::Immediate => write!(f, "IMMEDIATE"),
            TxBehavior::Exclusive => write!(f, "EXCLUSIVE"),
        }
    }
}

impl std::str::FromStr for TxBehavior {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DEFERRED" => Ok(TxBehavior::Deferred),
            "IMMEDIATE" => Ok(TxBehavior::Immediate),
            "EXCLUSIVE" => Ok(TxBehavior::Exclusive),
            _ => Err(format!("unknown transaction behavior: {}", s)),
        }
    }
}
