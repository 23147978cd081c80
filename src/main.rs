//! Coin Wallet CLI
//!
//! Command-line interface for replaying wallet operation logs from CSV files.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- operations.csv > accounts.csv
//! cargo run -- --strategy async --batch-size 2000 --max-concurrent 8 operations.csv
//! cargo run -- --database wallet.db --catalog items.csv operations.csv
//! cargo run -- --log-level debug operations.csv
//! ```
//!
//! The program reads operations from the input CSV file, executes them through
//! the wallet engine using the selected processing strategy, and writes the
//! final account balances to stdout. Logs go to stderr.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (file not found, database cannot be opened, invalid catalog, etc.)

use coin_wallet::cli::{self, CliArgs};
use coin_wallet::core::{Catalog, MemoryStore, SqliteStore, WalletEngine, WalletStore};
use coin_wallet::strategy;
use coin_wallet::types::WalletError;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_logging(args: &CliArgs) {
    let filter = match &args.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn replay<S: WalletStore + 'static>(
    args: &CliArgs,
    store: S,
    catalog: Catalog,
) -> Result<(), WalletError> {
    let engine = WalletEngine::new(Arc::new(store), Arc::new(catalog), args.to_wallet_config());

    let config = if matches!(args.strategy, cli::StrategyType::Async) {
        Some(args.to_batch_config())
    } else {
        None
    };
    let strategy = strategy::create_strategy(args.strategy, engine, config);

    let mut output = std::io::stdout();
    strategy.process(&args.input_file, &mut output)
}

fn run(args: &CliArgs) -> Result<(), WalletError> {
    let catalog = match &args.catalog {
        Some(path) => Catalog::from_csv(path)?,
        None => Catalog::default(),
    };

    match &args.database {
        Some(path) => {
            tracing::info!(path = %path.display(), "using sqlite store");
            let store = SqliteStore::open(path, args.busy_timeout())?;
            replay(args, store, catalog)
        }
        None => replay(args, MemoryStore::new(), catalog),
    }
}

fn main() {
    let args = cli::parse_args();
    init_logging(&args);

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
