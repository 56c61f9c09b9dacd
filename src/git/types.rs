//! Type-safe wrappers around git primitives for the document store.

use std::fmt;

use git2::Oid;
use thiserror::Error;

/// A commit identifier.
///
/// Keeps commit ids apart from other object ids. The inner Oid is only
/// accessible within this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommitId(pub(crate) Oid);

impl CommitId {
    pub(crate) fn new(oid: Oid) -> Self {
        Self(oid)
    }

    pub(crate) fn raw(&self) -> Oid {
        self.0
    }

    /// Short form of the commit id.
    pub fn short(&self) -> String {
        self.0.to_string()[..7].to_string()
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated collection name or document key.
///
/// Names become directory and file names in the repository tree, so they
/// are restricted to 1-128 ASCII alphanumerics, underscores and hyphens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocName(String);

impl DocName {
    const MAX_LEN: usize = 128;

    /// Create a new DocName, validating the input.
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidNameError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), InvalidNameError> {
        if name.is_empty() {
            return Err(InvalidNameError::Empty);
        }

        if name.len() > Self::MAX_LEN {
            return Err(InvalidNameError::TooLong(name.len()));
        }

        for (i, c) in name.chars().enumerate() {
            if !c.is_ascii_alphanumeric() && c != '_' && c != '-' {
                return Err(InvalidNameError::InvalidCharacter { char: c, position: i });
            }
        }

        Ok(())
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of a document with this key.
    pub(crate) fn file_name(&self) -> String {
        format!("{}.json", self.0)
    }
}

impl fmt::Display for DocName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for DocName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A branch name, with special handling for transaction branches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BranchName(String);

impl BranchName {
    /// The main branch name.
    pub const MAIN: &'static str = "main";

    /// Prefix for transaction branches.
    pub const TX_PREFIX: &'static str = "tx/";

    /// Create a new BranchName.
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidNameError> {
        let name = name.into();
        if name.is_empty() {
            return Err(InvalidNameError::Empty);
        }
        if name.contains("..") || name.ends_with('/') || name.starts_with('/') {
            return Err(InvalidNameError::InvalidPath(name));
        }
        Ok(Self(name))
    }

    /// The main branch.
    pub fn main() -> Self {
        Self(Self::MAIN.to_string())
    }

    /// The branch of a transaction.
    pub fn for_transaction(tx_id: &str) -> Self {
        Self(format!("{}{}", Self::TX_PREFIX, tx_id))
    }

    /// Check if this is a transaction branch.
    pub fn is_transaction_branch(&self) -> bool {
        self.0.starts_with(Self::TX_PREFIX)
    }

    /// Extract the transaction id if this is a transaction branch.
    pub fn transaction_id(&self) -> Option<&str> {
        self.0.strip_prefix(Self::TX_PREFIX)
    }

    /// Full ref path (e.g. `refs/heads/main`).
    pub fn as_ref_path(&self) -> String {
        format!("refs/heads/{}", self.0)
    }

    /// Short name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error for invalid names (collections, keys, branches).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidNameError {
    #[error("name cannot be empty")]
    Empty,
    #[error("name too long: {0} characters")]
    TooLong(usize),
    #[error("invalid character '{char}' at position {position}")]
    InvalidCharacter { char: char, position: usize },
    #[error("invalid path: '{0}'")]
    InvalidPath(String),
}
