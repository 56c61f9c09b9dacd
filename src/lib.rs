//! txkit - resource-agnostic transactions
//!
//! Repositories and services run a unit of work "inside a transaction"
//! without the calling code knowing which resource provides it. The core
//! lives in [`transaction`]; [`sqlite`] and [`git`] are two ready-made
//! resources, and [`ledger`] is a money-transfer service built on top.
//!
//! # Example
//!
//! ```no_run
//! use txkit::ledger::{AccountService, SqliteAccounts, TransferRequest};
//! use txkit::sqlite::{SqliteConfig, SqliteStore};
//! use txkit::transaction::Context;
//!
//! let accounts = SqliteAccounts::new(SqliteStore::open(SqliteConfig::new("ledger.db")).unwrap());
//! accounts.migrate().unwrap();
//!
//! let svc = AccountService::new(accounts);
//! svc.transfer_money(&Context::background(), &TransferRequest::new(456, 123, 3000))
//!     .unwrap();
//! ```

pub mod config;
pub mod git;
pub mod ledger;
pub mod logging;
pub mod sqlite;
pub mod transaction;
