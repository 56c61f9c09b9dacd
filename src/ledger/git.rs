//! Git account repository.

use crate::git::{GitError, GitResult, GitStore, GitTx};
use crate::ledger::account::{Account, LedgerError, LedgerResult};
use crate::ledger::service::AccountRepository;
use crate::transaction::{Context, Transactional, Tx};

/// Accounts stored as `accounts/<id>.json` documents.
#[derive(Debug, Clone)]
pub struct GitAccounts {
    store: GitStore,
}

impl GitAccounts {
    pub const COLLECTION: &'static str = "accounts";

    pub fn new(store: GitStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &GitStore {
        &self.store
    }
}

impl AccountRepository for GitAccounts {
    fn by_id(&self, ctx: &Context, id: i64) -> LedgerResult<Account> {
        self.store
            .get(ctx, Self::COLLECTION, &id.to_string())
            .map_err(LedgerError::storage)?
            .ok_or(LedgerError::NotFound(id))
    }

    fn save(&self, ctx: &Context, account: &Account) -> LedgerResult<()> {
        self.store
            .put(ctx, Self::COLLECTION, &account.id.to_string(), account)
            .map_err(LedgerError::storage)
    }

    fn all(&self, ctx: &Context) -> LedgerResult<Vec<Account>> {
        let keys = self
            .store
            .keys(ctx, Self::COLLECTION)
            .map_err(LedgerError::storage)?;

        let mut accounts = Vec::with_capacity(keys.len());
        for key in keys {
            let account: Option<Account> = self
                .store
                .get(ctx, Self::COLLECTION, key.as_str())
                .map_err(LedgerError::storage)?;
            accounts.extend(account);
        }
        accounts.sort_by_key(|a| a.id);
        Ok(accounts)
    }
}

impl Transactional for GitAccounts {
    type Native = GitTx;
    type Error = GitError;

    fn begin(&self, ctx: &Context) -> GitResult<GitTx> {
        self.store.begin(ctx)
    }

    fn commit(&self, tx: &Tx<GitTx>) -> GitResult<()> {
        self.store.commit(tx)
    }

    fn rollback(&self, tx: &Tx<GitTx>) -> GitResult<()> {
        self.store.rollback(tx)
    }
}
