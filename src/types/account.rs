//! Account-related types for the coin wallet
//!
//! This module defines the Account structure and the aggregated view
//! returned to callers asking for "everything about my wallet".

use super::item::InventoryLine;
use super::ledger::LedgerEntry;
use serde::Serialize;

/// Account identifier
///
/// Positive, assigned in creation order starting at 1.
pub type AccountId = i64;

/// Coin amount
///
/// Signed so that caller-supplied amounts can be validated rather than
/// silently wrapped. Stored balances are never negative.
pub type Coins = i64;

/// A user's identity and coin balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    /// Unique account identifier
    pub id: AccountId,

    /// Unique login name the identity provider resolves to this account
    pub username: String,

    /// Current coin balance
    ///
    /// Invariant: `balance >= 0` between completed operations. Mutated only
    /// by the engine through a store transaction (or a deposit credit).
    pub balance: Coins,
}

impl Account {
    /// Create a new account record
    ///
    /// # Arguments
    ///
    /// * `id` - The identifier assigned by the store
    /// * `username` - The unique login name
    /// * `balance` - The starting balance
    pub fn new(id: AccountId, username: impl Into<String>, balance: Coins) -> Self {
        Account {
            id,
            username: username.into(),
            balance,
        }
    }
}

/// Balance, inventory and transfer history for one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountInfo {
    pub balance: Coins,
    pub inventory: Vec<InventoryLine>,
    pub history: Vec<LedgerEntry>,
}
