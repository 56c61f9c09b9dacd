//! Account entity and ledger errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors raised by the ledger domain and its repositories.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("cannot transfer from account {0} to itself")]
    SameAccount(i64),

    #[error("invalid amount: {0}")]
    InvalidAmount(i64),

    #[error("balance of account {0} would overflow")]
    BalanceOverflow(i64),

    #[error("account not found: {0}")]
    NotFound(i64),

    /// Failure of the store behind a repository.
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl LedgerError {
    /// Wrap a store error.
    pub fn storage(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        LedgerError::Storage(err.into())
    }
}

/// A money account. Balances are in minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub user_id: i64,
    pub balance: i64,
}

impl Account {
    pub fn new(id: i64, user_id: i64, balance: i64) -> Self {
        Self {
            id,
            user_id,
            balance,
        }
    }

    /// Withdraw `amount` if the balance covers it.
    pub fn withdraw(&mut self, amount: i64) -> LedgerResult<()> {
        if amount > self.balance {
            return Err(LedgerError::InsufficientFunds);
        }
        self.balance -= amount;
        Ok(())
    }

    /// Deposit `amount`, failing if the balance would overflow.
    pub fn deposit(&mut self, amount: i64) -> LedgerResult<()> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow(self.id))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_withdraw() {
        let mut account = Account::new(1, 10, 100);
        account.withdraw(40).unwrap();
        assert_eq!(account.balance, 60);

        account.withdraw(60).unwrap();
        assert_eq!(account.balance, 0);
    }

    #[test]
    fn test_withdraw_insufficient_funds() {
        let mut account = Account::new(1, 10, 100);
        let err = account.withdraw(101).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds));
        assert_eq!(err.to_string(), "insufficient funds");
        assert_eq!(account.balance, 100);
    }

    #[test]
    fn test_deposit() {
        let mut account = Account::new(1, 10, 0);
        account.deposit(25).unwrap();
        assert_eq!(account.balance, 25);
    }

    #[test]
    fn test_deposit_overflow() {
        let mut account = Account::new(2, 10, i64::MAX);
        let err = account.deposit(1).unwrap_err();
        assert!(matches!(err, LedgerError::BalanceOverflow(2)));
        assert_eq!(account.balance, i64::MAX);
    }

    #[test]
    fn test_serde() {
        let account = Account::new(7, 3, 500);
        let json = serde_json::to_string(&account).unwrap();
        assert_eq!(json, r#"{"id":7,"user_id":3,"balance":500}"#);
        let back: Account = serde_json::from_str(&json).unwrap();
        assert_eq!(back, account);
    }

    #[test]
    fn test_storage_error_message() {
        let err = LedgerError::storage(std::io::Error::other("disk full"));
        assert_eq!(err.to_string(), "storage error: disk full");
    }
}
