//! SQLite store configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::sqlite::behavior::TxBehavior;

/// SQLite store configuration options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Path to the database file. `None` for a private in-memory database.
    pub path: Option<PathBuf>,
    /// How long a connection waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
    /// How `BEGIN` acquires locks.
    pub behavior: TxBehavior,
    /// Switch file databases to write-ahead logging.
    pub wal: bool,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 5_000,
            behavior: TxBehavior::default(),
            wal: true,
        }
    }
}

impl SqliteConfig {
    /// Create a new configuration for a database file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Create a configuration for an in-memory database.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Set the busy timeout.
    pub fn busy_timeout(mut self, value: Duration) -> Self {
        self.busy_timeout_ms = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the transaction behavior.
    pub fn behavior(mut self, value: TxBehavior) -> Self {
        self.behavior = value;
        self
    }

    /// Set the WAL flag.
    pub fn wal(mut self, value: bool) -> Self {
        self.wal = value;
        self
    }

    /// The busy timeout as a duration.
    pub fn busy_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}
