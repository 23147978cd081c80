//! Immutable records written by the balance engine
//!
//! A [`LedgerEntry`] is created only by a committed transfer and a
//! [`PurchaseRecord`] only by a committed purchase. Neither is ever updated.

use super::account::{AccountId, Coins};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Identifier of a ledger entry or purchase record
pub type EntryId = i64;

/// A completed transfer between two accounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    /// Store-assigned identifier, increasing in commit order
    pub id: EntryId,

    /// Account that was debited
    pub from_account: AccountId,

    /// Account that was credited
    pub to_account: AccountId,

    /// Amount moved (always positive)
    pub amount: Coins,

    /// Commit time
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Whether the given account took part in this transfer
    pub fn involves(&self, account: AccountId) -> bool {
        self.from_account == account || self.to_account == account
    }
}

/// A completed catalog purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseRecord {
    pub id: EntryId,
    pub account: AccountId,
    pub item_name: String,
    /// Catalog price at the time of purchase
    pub unit_price: Coins,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}
