//! Resource-agnostic transactions.
//!
//! This module lets repositories and services run a unit of work inside a
//! transaction without knowing which resource backs it. A resource owner
//! implements [`Transactional`]; callers hand a closure to
//! [`Transactional::run_tx`] and get a commit on `Ok` and a rollback on `Err`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Transactional::run_tx                      │
//! │        (begin native tx, wrap it, delegate to run)          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                           run                               │
//! │   (derive context, call work, commit xor rollback once)     │
//! └─────────────────────────────────────────────────────────────┘
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!  ┌─────────────┐       ┌─────────────┐       ┌─────────────┐
//!  │    Tx<N>    │       │   Context   │       │   TxError   │
//!  │  (handle)   │       │  (current)  │       │ (outcomes)  │
//!  └─────────────┘       └─────────────┘       └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use txkit::transaction::{current, Context, Transactional};
//!
//! store.run_tx(&Context::background(), |ctx| {
//!     // Data access code joins the transaction through the context.
//!     let tx = current::<SqliteTx>(ctx).expect("inside run_tx");
//!     tx.native().execute("UPDATE accounts SET balance = 0", [])?;
//!     Ok::<_, MyError>(())
//! })?;
//! ```

mod context;
mod error;
mod handle;
mod runner;

pub use context::{current, Context};
pub use error::{TxError, TxResult};
pub use handle::{Tx, TxId};
pub use runner::{run, Transactional};
