//! Configuration of the `txkit` binary.
//!
//! Loaded from an optional JSON file; command-line flags override it.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::LogFormat;
use crate::sqlite::{SqliteConfig, TxBehavior};

/// Errors loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Which store holds the accounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Sqlite,
    Git,
}

impl Backend {
    /// Store location used when none is configured.
    pub fn default_path(&self) -> PathBuf {
        match self {
            Backend::Sqlite => PathBuf::from("txkit.db"),
            Backend::Git => PathBuf::from("txkit-store"),
        }
    }
}

/// Configuration for the `txkit` binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Store backend.
    pub backend: Backend,
    /// Database file or repository directory.
    pub path: Option<PathBuf>,
    /// Log output format.
    pub log_format: LogFormat,
    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: Option<String>,
    /// SQLite tuning; its `path` is ignored in favor of `path`.
    pub sqlite: SqliteConfig,
}

impl Default for CliConfig {
    /// Transfers take the write lock up front so concurrent runs queue on
    /// the busy timeout instead of failing their lock upgrade.
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            path: None,
            log_format: LogFormat::default(),
            log_level: None,
            sqlite: SqliteConfig::default().behavior(TxBehavior::Immediate),
        }
    }
}

impl CliConfig {
    /// Read a JSON configuration file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Set the backend.
    pub fn backend(mut self, value: Backend) -> Self {
        self.backend = value;
        self
    }

    /// Set the store location.
    pub fn path(mut self, value: impl Into<PathBuf>) -> Self {
        self.path = Some(value.into());
        self
    }

    /// Set the log format.
    pub fn log_format(mut self, value: LogFormat) -> Self {
        self.log_format = value;
        self
    }

    /// The configured store location, or the backend default.
    pub fn store_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| self.backend.default_path())
    }

    /// The log filter to use without `RUST_LOG`.
    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    /// SQLite settings pointed at the store location.
    pub fn sqlite_config(&self) -> SqliteConfig {
        let mut config = self.sqlite.clone();
        config.path = Some(self.store_path());
        config
    }
}
