//! Git-backed transactional document store.
//!
//! A tiny document database on top of a git repository, with
//! branch-per-transaction isolation:
//!
//! ```text
//! main:      A ─── B ──────────── M
//!             \                  /
//! tx/01j...:   └── put ── put ──┘
//! ```
//!
//! * `begin` forks `tx/{id}` from the tip of `main`.
//! * Writes inside the transaction become commits on that branch.
//! * `commit` fast-forwards `main`, or merges when `main` moved and the two
//!   sides touched different documents. Touching the same document is a
//!   [`GitError::Conflict`].
//! * `rollback` deletes the branch; `main` never sees the writes.

mod error;
mod refs;
mod store;
mod types;

pub use error::{GitError, GitResult};
pub use store::{GitStore, GitTx};
pub use types::{BranchName, CommitId, DocName, InvalidNameError};
