//! Core business logic module
//!
//! This module contains the balance-consistency components:
//! - `traits` - Store and transaction abstractions for interchangeable backends
//! - `store` - In-memory and SQLite store implementations
//! - `engine` - Transfer, purchase and deposit orchestration
//! - `catalog` - Item price table
//! - `ledger` - History ordering
//! - `inventory` - Owned-item projection from purchase records
//! - `batch_processor` - Concurrent batch replay partitioned into groups of connected users

pub mod batch_processor;
pub mod catalog;
pub mod engine;
pub mod inventory;
pub mod ledger;
pub mod store;
pub mod traits;

pub use batch_processor::BatchProcessor;
pub use catalog::Catalog;
pub use engine::{WalletConfig, WalletEngine};
pub use store::{MemoryStore, SqliteStore};
pub use traits::{StoreTransaction, WalletStore};
