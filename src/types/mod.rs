//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `account`: Account identity, balance, and the combined info view
//! - `ledger`: Immutable transfer and purchase records
//! - `item`: Catalog items and derived inventory lines
//! - `operation`: Validated intents submitted to the engine
//! - `error`: Error types for the wallet

pub mod account;
pub mod error;
pub mod item;
pub mod ledger;
pub mod operation;

pub use account::{Account, AccountId, AccountInfo, Coins};
pub use error::WalletError;
pub use item::{CatalogItem, InventoryLine};
pub use ledger::{EntryId, LedgerEntry, PurchaseRecord};
pub use operation::{OperationKind, WalletOperation};
