//! Money transfers between accounts.
//!
//! The service only knows the [`AccountRepository`] contract and runs each
//! transfer through `run_tx`; the repositories decide which store the
//! transaction lives in.

mod account;
mod git;
mod service;
mod sqlite;

pub use account::{Account, LedgerError, LedgerResult};
pub use git::GitAccounts;
pub use service::{AccountRepository, AccountService, TransferError, TransferRequest};
pub use sqlite::SqliteAccounts;
