//! Transfers over both stores, end to end.

use std::sync::Arc;
use std::thread;

use tempfile::TempDir;

use txkit::git::{GitError, GitStore};
use txkit::ledger::{
    Account, AccountRepository, AccountService, GitAccounts, LedgerError, SqliteAccounts,
    TransferRequest,
};
use txkit::sqlite::{SqliteConfig, SqliteStore, TxBehavior};
use txkit::transaction::{current, Context, Transactional, TxError};

fn sqlite_service(dir: &TempDir) -> AccountService<SqliteAccounts> {
    let config = SqliteConfig::new(dir.path().join("ledger.db")).behavior(TxBehavior::Immediate);
    let accounts = SqliteAccounts::new(SqliteStore::open(config).unwrap());
    accounts.migrate().unwrap();
    AccountService::new(accounts)
}

fn git_service(dir: &TempDir) -> AccountService<GitAccounts> {
    AccountService::new(GitAccounts::new(
        GitStore::open_or_init(dir.path().join("store")).unwrap(),
    ))
}

fn total<R: AccountRepository>(svc: &AccountService<R>) -> i64 {
    svc.balances(&Context::background())
        .unwrap()
        .iter()
        .map(|a| a.balance)
        .sum()
}

#[test]
fn test_sqlite_transfer_persists() {
    let dir = TempDir::new().unwrap();
    let ctx = Context::background();
    {
        let svc = sqlite_service(&dir);
        svc.open_accounts(&ctx, 2, 1000).unwrap();
        svc.transfer_money(&ctx, &TransferRequest::new(1, 2, 300))
            .unwrap();
    }

    let svc = sqlite_service(&dir);
    assert_eq!(svc.balance(&ctx, 1).unwrap().balance, 700);
    assert_eq!(svc.balance(&ctx, 2).unwrap().balance, 1300);
}

#[test]
fn test_sqlite_failed_transfer_leaves_balances() {
    let dir = TempDir::new().unwrap();
    let svc = sqlite_service(&dir);
    let ctx = Context::background();
    svc.open_accounts(&ctx, 2, 100).unwrap();

    let err = svc
        .transfer_money(&ctx, &TransferRequest::new(1, 2, 101))
        .unwrap_err();

    assert!(matches!(err, TxError::Work(LedgerError::InsufficientFunds)));
    assert_eq!(err.to_string(), "insufficient funds");
    assert_eq!(svc.balance(&ctx, 1).unwrap().balance, 100);
    assert_eq!(svc.balance(&ctx, 2).unwrap().balance, 100);
}

#[test]
fn test_sqlite_concurrent_transfers() {
    let dir = TempDir::new().unwrap();
    let svc = Arc::new(sqlite_service(&dir));
    svc.open_accounts(&Context::background(), 2, 1000).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let svc = Arc::clone(&svc);
            thread::spawn(move || {
                for _ in 0..10 {
                    svc.transfer_money(&Context::background(), &TransferRequest::new(1, 2, 5))
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let ctx = Context::background();
    assert_eq!(svc.balance(&ctx, 1).unwrap().balance, 800);
    assert_eq!(svc.balance(&ctx, 2).unwrap().balance, 1200);
    assert_eq!(total(&svc), 2000);
}

#[test]
fn test_git_transfer_and_history() {
    let dir = TempDir::new().unwrap();
    let svc = git_service(&dir);
    let ctx = Context::background();
    svc.open_accounts(&ctx, 3, 500).unwrap();
    let before = svc.accounts().store().head().unwrap();

    svc.transfer_money(&ctx, &TransferRequest::new(3, 1, 200))
        .unwrap();

    assert_ne!(svc.accounts().store().head().unwrap(), before);
    assert_eq!(svc.balance(&ctx, 3).unwrap().balance, 300);
    assert_eq!(svc.balance(&ctx, 1).unwrap().balance, 700);
    assert_eq!(total(&svc), 1500);
    assert_eq!(svc.accounts().store().active_count(), 0);
}

#[test]
fn test_git_conflicting_transfer_is_rejected() {
    let dir = TempDir::new().unwrap();
    let svc = git_service(&dir);
    let ctx = Context::background();
    svc.open_accounts(&ctx, 2, 1000).unwrap();

    let result: Result<(), TxError<LedgerError, GitError>> = svc.run_tx(&ctx, |tx_ctx| {
        let mut src = svc.accounts().by_id(tx_ctx, 1)?;

        // An independent transfer touching the same account commits first.
        svc.transfer_money(&Context::background(), &TransferRequest::new(1, 2, 100))
            .map_err(LedgerError::storage)?;

        src.withdraw(50)?;
        svc.accounts().save(tx_ctx, &src)?;
        Ok(())
    });

    match result {
        Err(TxError::Commit(GitError::Conflict { paths })) => {
            assert_eq!(paths, vec!["accounts/1.json"]);
        }
        other => panic!("expected a commit conflict, got {:?}", other),
    }
    assert_eq!(svc.balance(&ctx, 1).unwrap().balance, 900);
    assert_eq!(svc.balance(&ctx, 2).unwrap().balance, 1100);
    assert!(svc.accounts().store().transaction_branches().unwrap().is_empty());
}

#[test]
fn test_git_disjoint_concurrent_transfers() {
    let dir = TempDir::new().unwrap();
    let svc = Arc::new(git_service(&dir));
    svc.open_accounts(&Context::background(), 4, 100).unwrap();

    let pairs = [(1, 2), (3, 4)];
    let handles: Vec<_> = pairs
        .into_iter()
        .map(|(src, dest)| {
            let svc = Arc::clone(&svc);
            thread::spawn(move || {
                for _ in 0..5 {
                    svc.transfer_money(&Context::background(), &TransferRequest::new(src, dest, 10))
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let balances: Vec<i64> = svc
        .balances(&Context::background())
        .unwrap()
        .iter()
        .map(|a: &Account| a.balance)
        .collect();
    assert_eq!(balances, vec![50, 150, 50, 150]);
}

#[test]
fn test_stores_do_not_join_each_other() {
    let dir = TempDir::new().unwrap();
    let sqlite = sqlite_service(&dir);
    let git = git_service(&dir);
    let ctx = Context::background();
    git.open_accounts(&ctx, 1, 10).unwrap();

    let result: Result<(), TxError<LedgerError, _>> = sqlite.run_tx(&ctx, |tx_ctx| {
        assert!(current::<txkit::sqlite::SqliteTx>(tx_ctx).is_some());
        assert!(current::<txkit::git::GitTx>(tx_ctx).is_none());
        assert!(!git.accounts().store().in_transaction(tx_ctx));

        // Git writes outside its own transaction go straight to main.
        git.accounts().save(tx_ctx, &Account::new(1, 1, 20))?;
        Err(LedgerError::InsufficientFunds)
    });

    assert!(result.is_err());
    assert_eq!(git.balance(&ctx, 1).unwrap().balance, 20);
}
