//! txkit - account transfers inside transactions
//!
//! Command-line front end for the ledger service over the SQLite or Git
//! store.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing::info;

use txkit::config::{Backend, CliConfig, ConfigError};
use txkit::git::{GitError, GitStore};
use txkit::ledger::{
    Account, AccountRepository, AccountService, GitAccounts, LedgerError, SqliteAccounts,
    TransferRequest,
};
use txkit::logging::{init_logging, LogFormat};
use txkit::sqlite::{SqliteError, SqliteStore};
use txkit::transaction::Context;

/// Run account transfers inside transactions.
#[derive(Parser)]
#[command(name = "txkit", version, about, long_about = None)]
struct Cli {
    /// Store backend
    #[arg(long, value_enum, env = "TXKIT_BACKEND")]
    backend: Option<Backend>,

    /// Database file (sqlite) or repository directory (git)
    #[arg(long, env = "TXKIT_PATH")]
    path: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long, env = "TXKIT_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, env = "TXKIT_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Give up on transactions that cannot begin within this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create accounts 1..=N with the same opening balance
    Init {
        /// Number of accounts
        #[arg(long, default_value_t = 2)]
        accounts: i64,

        /// Opening balance of each account
        #[arg(long, default_value_t = 10_000)]
        balance: i64,
    },
    /// Move money from one account to another
    Transfer {
        /// Source account id
        #[arg(long)]
        from: i64,

        /// Destination account id
        #[arg(long)]
        to: i64,

        /// Amount to move
        #[arg(long)]
        amount: i64,
    },
    /// Print balances
    Balance {
        /// Only this account
        id: Option<i64>,

        /// Print JSON instead of a table
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Delete transaction branches left behind by crashed processes (git only)
    Cleanup {
        /// Only branches of transactions begun at least this many seconds ago
        #[arg(long, default_value_t = 3600)]
        older_than_secs: u64,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("sqlite store: {0}")]
    Sqlite(#[from] SqliteError),

    #[error("git store: {0}")]
    Git(#[from] GitError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A failed transaction, whatever the store.
    #[error("{0}")]
    Transaction(Box<dyn std::error::Error + Send + Sync>),

    #[error("the {0} command needs the git backend")]
    Unsupported(&'static str),

    #[error("cannot encode output: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    fn transaction(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        CliError::Transaction(Box::new(err))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(config.log_format, config.log_level()) {
        eprintln!("Warning: logging disabled: {}", e);
    }

    let mut ctx = Context::background();
    if let Some(ms) = cli.timeout_ms {
        ctx = ctx.with_timeout(Duration::from_millis(ms));
    }

    match run(&ctx, &config, &cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Merge the config file with command-line flags. Flags win.
fn load_config(cli: &Cli) -> Result<CliConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => CliConfig::from_file(path)?,
        None => CliConfig::default(),
    };

    if let Some(backend) = cli.backend {
        config = config.backend(backend);
    }
    if let Some(path) = &cli.path {
        config = config.path(path);
    }
    if let Some(format) = cli.log_format {
        config = config.log_format(format);
    }
    Ok(config)
}

fn run(ctx: &Context, config: &CliConfig, command: &Command) -> Result<(), CliError> {
    match config.backend {
        Backend::Sqlite => {
            let accounts = SqliteAccounts::new(SqliteStore::open(config.sqlite_config())?);
            accounts.migrate()?;
            execute(ctx, &AccountService::new(accounts), command)
        }
        Backend::Git => {
            let store = GitStore::open_or_init(config.store_path())?;
            if let Command::Cleanup { older_than_secs } = command {
                let cleaned = store.cleanup_abandoned(Duration::from_secs(*older_than_secs))?;
                info!(cleaned, "removed abandoned transaction branches");
                println!("{} abandoned branch(es) removed", cleaned);
                return Ok(());
            }
            execute(ctx, &AccountService::new(GitAccounts::new(store)), command)
        }
    }
}

fn execute<R: AccountRepository>(
    ctx: &Context,
    svc: &AccountService<R>,
    command: &Command,
) -> Result<(), CliError> {
    match command {
        Command::Init { accounts, balance } => {
            let opened = svc
                .open_accounts(ctx, *accounts, *balance)
                .map_err(CliError::transaction)?;
            println!("{} account(s) opened with balance {}", opened.len(), balance);
        }
        Command::Transfer { from, to, amount } => {
            svc.transfer_money(ctx, &TransferRequest::new(*from, *to, *amount))
                .map_err(CliError::transaction)?;
            println!("Transferred {} from {} to {}", amount, from, to);
        }
        Command::Balance { id, json } => {
            let accounts = match id {
                Some(id) => vec![svc.balance(ctx, *id)?],
                None => svc.balances(ctx)?,
            };
            if *json {
                println!("{}", serde_json::to_string_pretty(&accounts)?);
            } else {
                print_accounts(&accounts);
            }
        }
        Command::Cleanup { .. } => return Err(CliError::Unsupported("cleanup")),
    }
    Ok(())
}

fn print_accounts(accounts: &[Account]) {
    if accounts.is_empty() {
        println!("(0 accounts)");
        return;
    }

    println!("id\tuser\tbalance");
    for account in accounts {
        println!("{}\t{}\t{}", account.id, account.user_id, account.balance);
    }
    println!("({} accounts)", accounts.len());
}
