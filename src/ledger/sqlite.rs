//! SQLite account repository.

use rusqlite::{params, OptionalExtension, Row};

use crate::ledger::account::{Account, LedgerError, LedgerResult};
use crate::ledger::service::AccountRepository;
use crate::sqlite::{SqliteError, SqliteResult, SqliteStore, SqliteTx};
use crate::transaction::{Context, Transactional, Tx};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL,
    balance INTEGER NOT NULL
);";

/// Accounts stored in the `accounts` table.
#[derive(Debug, Clone)]
pub struct SqliteAccounts {
    store: SqliteStore,
}

impl SqliteAccounts {
    pub fn new(store: SqliteStore) -> Self {
        Self { store }
    }

    /// Create the `accounts` table if it does not exist.
    pub fn migrate(&self) -> SqliteResult<()> {
        self.store.execute_batch(SCHEMA)
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        user_id: row.get(1)?,
        balance: row.get(2)?,
    })
}

impl AccountRepository for SqliteAccounts {
    fn by_id(&self, ctx: &Context, id: i64) -> LedgerResult<Account> {
        self.store
            .with_conn(ctx, |conn| {
                conn.query_row(
                    "SELECT id, user_id, balance FROM accounts WHERE id = ?1",
                    [id],
                    account_from_row,
                )
                .optional()
            })
            .map_err(LedgerError::storage)?
            .ok_or(LedgerError::NotFound(id))
    }

    fn save(&self, ctx: &Context, account: &Account) -> LedgerResult<()> {
        self.store
            .with_conn(ctx, |conn| {
                conn.execute(
                    "INSERT INTO accounts (id, user_id, balance) VALUES (?1, ?2, ?3)
                     ON CONFLICT(id) DO UPDATE SET user_id = excluded.user_id, balance = excluded.balance",
                    params![account.id, account.user_id, account.balance],
                )
            })
            .map_err(LedgerError::storage)?;
        Ok(())
    }

    fn all(&self, ctx: &Context) -> LedgerResult<Vec<Account>> {
        self.store
            .with_conn(ctx, |conn| {
                let mut stmt =
                    conn.prepare("SELECT id, user_id, balance FROM accounts ORDER BY id")?;
                let rows = stmt.query_map([], account_from_row)?;
                rows.collect()
            })
            .map_err(LedgerError::storage)
    }
}

impl Transactional for SqliteAccounts {
    type Native = SqliteTx;
    type Error = SqliteError;

    fn begin(&self, ctx: &Context) -> SqliteResult<SqliteTx> {
        self.store.begin(ctx)
    }

    fn commit(&self, tx: &Tx<SqliteTx>) -> SqliteResult<()> {
        self.store.commit(tx)
    }

    fn rollback(&self, tx: &Tx<SqliteTx>) -> SqliteResult<()> {
        self.store.rollback(tx)
    }
}
