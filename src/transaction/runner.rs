//! The transactional capability and the run protocol.
//!
//! [`Transactional`] is implemented by anything that owns a transactional
//! resource. Its provided [`Transactional::run_tx`] begins a native
//! transaction, wraps it in a [`Tx`] and hands over to [`run`], which decides
//! between commit and rollback exactly once.

use std::sync::Arc;

use tracing::{debug, debug_span, warn};

use crate::transaction::context::{self, Context};
use crate::transaction::error::{TxError, TxResult};
use crate::transaction::handle::Tx;

/// A resource owner that can begin, commit and roll back transactions.
///
/// `commit` and `rollback` are driven by [`run`]; client code calls
/// [`Transactional::run_tx`] and never invokes them directly.
pub trait Transactional {
    /// The resource's native transaction object.
    type Native: Send + 'static;

    /// The resource's error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Begin a new native transaction.
    fn begin(&self, ctx: &Context) -> Result<Self::Native, Self::Error>;

    /// Commit the native transaction wrapped by `tx`.
    fn commit(&self, tx: &Tx<Self::Native>) -> Result<(), Self::Error>;

    /// Roll back the native transaction wrapped by `tx`.
    fn rollback(&self, tx: &Tx<Self::Native>) -> Result<(), Self::Error>;

    /// Run `work` in a new transaction.
    ///
    /// `work` must use the context it is given: that context carries the
    /// handle that data access code finds with [`context::current`]. A nested
    /// `run_tx` starts a second, independent transaction.
    fn run_tx<F, R, E>(&self, ctx: &Context, work: F) -> TxResult<R, E, Self::Error>
    where
        F: FnOnce(&Context) -> Result<R, E>,
    {
        let native = self.begin(ctx).map_err(|e| {
            warn!(error = %e, "tx: begin failed");
            TxError::Begin(e)
        })?;
        run(ctx, self, Tx::wrap(native), work)
    }
}

impl<T> Transactional for &T
where
    T: Transactional + ?Sized,
{
    type Native = T::Native;
    type Error = T::Error;

    fn begin(&self, ctx: &Context) -> Result<Self::Native, Self::Error> {
        (**self).begin(ctx)
    }

    fn commit(&self, tx: &Tx<Self::Native>) -> Result<(), Self::Error> {
        (**self).commit(tx)
    }

    fn rollback(&self, tx: &Tx<Self::Native>) -> Result<(), Self::Error> {
        (**self).rollback(tx)
    }

    fn run_tx<F, R, E>(&self, ctx: &Context, work: F) -> TxResult<R, E, Self::Error>
    where
        F: FnOnce(&Context) -> Result<R, E>,
    {
        (**self).run_tx(ctx, work)
    }
}

impl<T> Transactional for Arc<T>
where
    T: Transactional + ?Sized,
{
    type Native = T::Native;
    type Error = T::Error;

    fn begin(&self, ctx: &Context) -> Result<Self::Native, Self::Error> {
        (**self).begin(ctx)
    }

    fn commit(&self, tx: &Tx<Self::Native>) -> Result<(), Self::Error> {
        (**self).commit(tx)
    }

    fn rollback(&self, tx: &Tx<Self::Native>) -> Result<(), Self::Error> {
        (**self).rollback(tx)
    }

    fn run_tx<F, R, E>(&self, ctx: &Context, work: F) -> TxResult<R, E, Self::Error>
    where
        F: FnOnce(&Context) -> Result<R, E>,
    {
        (**self).run_tx(ctx, work)
    }
}

/// Rolls back if the work function unwinds.
struct UnwindGuard<'a, T: Transactional + ?Sized> {
    owner: &'a T,
    tx: &'a Tx<T::Native>,
    armed: bool,
}

impl<T: Transactional + ?Sized> Drop for UnwindGuard<'_, T> {
    fn drop(&mut self) {
        if self.armed && std::thread::panicking() {
            match self.owner.rollback(self.tx) {
                Ok(()) => warn!(tx_id = %self.tx.id(), "tx: rolled back after panic"),
                Err(e) => warn!(
                    tx_id = %self.tx.id(),
                    error = %e,
                    "tx: rollback after panic failed"
                ),
            }
        }
    }
}

/// Run `work` inside the transaction `tx` owned by `owner`.
///
/// An `Ok` from `work` commits, an `Err` rolls back. Exactly one of the two
/// is called. A rollback failure is reported together with the work error,
/// a commit failure replaces the work result. If `work` panics the
/// transaction is rolled back and the panic continues.
pub fn run<T, F, R, E>(
    ctx: &Context,
    owner: &T,
    tx: Tx<T::Native>,
    work: F,
) -> TxResult<R, E, T::Error>
where
    T: Transactional + ?Sized,
    F: FnOnce(&Context) -> Result<R, E>,
{
    let tx = Arc::new(tx);
    let span = debug_span!("tx", tx_id = %tx.id());
    let _enter = span.enter();

    let outcome = {
        let mut guard = UnwindGuard {
            owner,
            tx: &*tx,
            armed: true,
        };
        let scoped = context::with_tx(ctx, Arc::clone(&tx));
        let outcome = work(&scoped);
        guard.armed = false;
        outcome
    };

    match outcome {
        Ok(value) => match owner.commit(&tx) {
            Ok(()) => {
                debug!("tx: committed");
                Ok(value)
            }
            Err(e) => {
                warn!(error = %e, "tx: commit failed");
                Err(TxError::Commit(e))
            }
        },
        Err(work_err) => match owner.rollback(&tx) {
            Ok(()) => {
                debug!("tx: rolled back");
                Err(TxError::Work(work_err))
            }
            Err(e) => {
                warn!(error = %e, "tx: rollback failed");
                Err(TxError::Rollback {
                    work: work_err,
                    rollback: e,
                })
            }
        },
    }
}
