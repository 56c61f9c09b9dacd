//! Account repository contract and the transfer service.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ledger::account::{Account, LedgerError, LedgerResult};
use crate::transaction::{Context, Transactional, Tx, TxError, TxResult};

/// Errors of [`AccountService::transfer_money`], generic over the store error.
pub type TransferError<S> = TxError<LedgerError, S>;

/// Storage of accounts.
///
/// Implementations are also the transactional resource: data access methods
/// must run inside the transaction carried by `ctx` when there is one.
pub trait AccountRepository: Transactional {
    /// Load an account, failing with [`LedgerError::NotFound`].
    fn by_id(&self, ctx: &Context, id: i64) -> LedgerResult<Account>;

    /// Insert or update an account.
    fn save(&self, ctx: &Context, account: &Account) -> LedgerResult<()>;

    /// All accounts ordered by id.
    fn all(&self, ctx: &Context) -> LedgerResult<Vec<Account>>;
}

/// A request to move `amount` from one account to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub src_id: i64,
    pub dest_id: i64,
    pub amount: i64,
}

impl TransferRequest {
    pub fn new(src_id: i64, dest_id: i64, amount: i64) -> Self {
        Self {
            src_id,
            dest_id,
            amount,
        }
    }

    fn validate(&self) -> LedgerResult<()> {
        if self.src_id == self.dest_id {
            return Err(LedgerError::SameAccount(self.src_id));
        }
        if self.amount <= 0 {
            return Err(LedgerError::InvalidAmount(self.amount));
        }
        Ok(())
    }
}

/// Account application service.
///
/// Also [`Transactional`] itself, delegating to the repository, so callers
/// can group several service calls in one `run_tx`.
#[derive(Debug, Clone)]
pub struct AccountService<R> {
    accounts: R,
}

impl<R: AccountRepository> AccountService<R> {
    pub fn new(accounts: R) -> Self {
        Self { accounts }
    }

    /// The underlying repository.
    pub fn accounts(&self) -> &R {
        &self.accounts
    }

    /// Move money between two accounts atomically.
    ///
    /// Either both balances change or neither does.
    pub fn transfer_money(
        &self,
        ctx: &Context,
        req: &TransferRequest,
    ) -> Result<(), TransferError<R::Error>> {
        if let Err(e) = req.validate() {
            return Err(TxError::Work(e));
        }

        self.accounts.run_tx(ctx, |ctx| -> LedgerResult<()> {
            let mut src = self.accounts.by_id(ctx, req.src_id)?;
            let mut dest = self.accounts.by_id(ctx, req.dest_id)?;

            src.withdraw(req.amount)?;
            dest.deposit(req.amount)?;

            self.accounts.save(ctx, &src)?;
            self.accounts.save(ctx, &dest)?;
            Ok(())
        })?;

        info!(
            src = req.src_id,
            dest = req.dest_id,
            amount = req.amount,
            "transfer completed"
        );
        Ok(())
    }

    /// Create accounts `1..=count`, each owned by the user with the same id
    /// and holding `balance`. Existing accounts are overwritten.
    pub fn open_accounts(
        &self,
        ctx: &Context,
        count: i64,
        balance: i64,
    ) -> TxResult<Vec<Account>, LedgerError, R::Error> {
        if balance < 0 {
            return Err(TxError::Work(LedgerError::InvalidAmount(balance)));
        }

        self.accounts.run_tx(ctx, |ctx| {
            let mut opened = Vec::new();
            for id in 1..=count {
                let account = Account::new(id, id, balance);
                self.accounts.save(ctx, &account)?;
                opened.push(account);
            }
            Ok(opened)
        })
    }

    /// Look up one account.
    pub fn balance(&self, ctx: &Context, id: i64) -> LedgerResult<Account> {
        self.accounts.by_id(ctx, id)
    }

    /// List all accounts.
    pub fn balances(&self, ctx: &Context) -> LedgerResult<Vec<Account>> {
        self.accounts.all(ctx)
    }
}

impl<R: AccountRepository> Transactional for AccountService<R> {
    type Native = R::Native;
    type Error = R::Error;

    fn begin(&self, ctx: &Context) -> Result<Self::Native, Self::Error> {
        self.accounts.begin(ctx)
    }

    fn commit(&self, tx: &Tx<Self::Native>) -> Result<(), Self::Error> {
        self.accounts.commit(tx)
    }

    fn rollback(&self, tx: &Tx<Self::Native>) -> Result<(), Self::Error> {
        self.accounts.rollback(tx)
    }
}
