//! Coin Wallet Library
//! # Overview
//!
//! This library provides the balance-consistency core of a virtual-coin
//! wallet: accounts with non-negative integer balances, peer-to-peer
//! transfers, catalog purchases and deposits, plus the read-side history and
//! inventory projections.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Account, LedgerEntry, PurchaseRecord, etc.)
//! - [`cli`] - CLI arguments parsing
//! - [`core`] - Business logic components:
//!   - [`core::engine`] - Transfer, purchase and deposit orchestration
//!   - [`core::store`] - In-memory and SQLite account stores
//!   - [`core::catalog`] - Item price table
//!   - [`core::ledger`] / [`core::inventory`] - Read-side projections
//! - [`io`] - Operation log parsing and account output
//! - [`strategy`] - Sync and async replay pipelines
//!
//! # Operations
//!
//! - **Transfer**: Move coins between two accounts; writes one ledger entry
//! - **PurchaseItem**: Buy a catalog item at its catalog price; writes one purchase record
//! - **Deposit**: Credit coins to an account
//!
//! # Invariants
//!
//! Every money-moving operation runs as one store transaction, so:
//! - No balance is ever negative, even under concurrent debits
//! - Every ledger entry matches exactly one debit and one credit of its amount
//! - A failed operation leaves no trace

pub mod cli;
pub mod core;
pub mod io;
pub mod strategy;
pub mod types;

pub use core::{Catalog, MemoryStore, SqliteStore, WalletConfig, WalletEngine, WalletStore};
pub use io::write_accounts_csv;
pub use types::{
    Account, AccountId, AccountInfo, CatalogItem, Coins, InventoryLine, LedgerEntry,
    PurchaseRecord, WalletError, WalletOperation,
};
