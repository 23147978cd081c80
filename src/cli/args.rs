use crate::core::WalletConfig;
use crate::strategy::BatchConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Replay a coin wallet operation log and print the resulting balances
#[derive(Parser, Debug)]
#[command(name = "coin-wallet")]
#[command(about = "Replay coin wallet operations and print account balances", long_about = None)]
pub struct CliArgs {
    /// Input CSV file path containing operations
    #[arg(value_name = "INPUT", help = "Path to the input CSV file (op,user,target,amount)")]
    pub input_file: PathBuf,

    /// Processing strategy to use for replay
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "sync",
        help = "Processing strategy: 'sync' for file order or 'async' for concurrent batches"
    )]
    pub strategy: StrategyType,

    /// SQLite database file; the in-memory store is used when absent
    #[arg(
        long = "database",
        value_name = "PATH",
        help = "SQLite database file (created if missing). Without it state lives in memory"
    )]
    pub database: Option<PathBuf>,

    /// Catalog CSV with columns name,price
    #[arg(
        long = "catalog",
        value_name = "PATH",
        help = "Catalog CSV (name,price). Defaults to the built-in merch catalog"
    )]
    pub catalog: Option<PathBuf>,

    /// Balance granted to newly registered accounts
    #[arg(
        long = "starting-balance",
        value_name = "COINS",
        default_value_t = 1000,
        help = "Balance of newly registered accounts"
    )]
    pub starting_balance: i64,

    /// How long a SQLite write waits on a lock held elsewhere
    #[arg(
        long = "busy-timeout-ms",
        value_name = "MILLIS",
        default_value_t = 5000,
        help = "SQLite busy timeout in milliseconds"
    )]
    pub busy_timeout_ms: u64,

    /// Number of operations per batch (async mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of operations per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Maximum number of concurrently executing partitions (async mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Maximum number of partitions executing concurrently (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,

    /// Log filter; RUST_LOG is used when absent
    #[arg(
        long = "log-level",
        value_name = "LEVEL",
        help = "Log level or filter directive, e.g. 'info' or 'coin_wallet=debug' (default: warn)"
    )]
    pub log_level: Option<String>,
}

/// Available processing strategies for replay
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

impl CliArgs {
    /// Create a BatchConfig from CLI arguments
    ///
    /// Missing values fall back to the defaults; zero values are replaced by
    /// the defaults with a warning.
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_concurrent_batches.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent_batches
                    .unwrap_or(default.max_concurrent_batches),
            )
        } else {
            BatchConfig::default()
        }
    }

    pub fn to_wallet_config(&self) -> WalletConfig {
        WalletConfig {
            starting_balance: self.starting_balance,
        }
    }

    /// Busy timeout for opening the SQLite store
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}
