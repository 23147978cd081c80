//! Operation intents for the coin wallet
//!
//! A [`WalletOperation`] is one caller request, already parsed, naming the
//! users involved by username. The engine resolves usernames to account ids
//! when the operation is executed.

use super::account::Coins;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operation kinds accepted by the replay tooling
///
/// Each variant corresponds to one engine entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Create an account with the configured starting balance
    Register,

    /// Credit coins to an account
    Deposit,

    /// Move coins from one account to another
    ///
    /// Debits the initiator, credits the target and appends one ledger entry,
    /// all in one store transaction.
    Transfer,

    /// Buy a catalog item
    ///
    /// Debits the initiator by catalog price times quantity and appends one
    /// purchase record, all in one store transaction.
    Buy,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Register => "register",
            OperationKind::Deposit => "deposit",
            OperationKind::Transfer => "transfer",
            OperationKind::Buy => "buy",
        };
        f.write_str(name)
    }
}

/// A single caller intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletOperation {
    Register {
        username: String,
    },
    Deposit {
        username: String,
        amount: Coins,
    },
    Transfer {
        from: String,
        to: String,
        amount: Coins,
    },
    Purchase {
        username: String,
        item: String,
        quantity: i64,
    },
}

impl WalletOperation {
    /// The user on whose behalf the operation runs
    ///
    /// For transfers this is the sender.
    pub fn initiator(&self) -> &str {
        match self {
            WalletOperation::Register { username }
            | WalletOperation::Deposit { username, .. }
            | WalletOperation::Purchase { username, .. } => username,
            WalletOperation::Transfer { from, .. } => from,
        }
    }

    /// Every user whose balance the operation may change
    ///
    /// A transfer names two users; everything else names one.
    pub fn participants(&self) -> Vec<&str> {
        match self {
            WalletOperation::Transfer { from, to, .. } => vec![from.as_str(), to.as_str()],
            other => vec![other.initiator()],
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            WalletOperation::Register { .. } => OperationKind::Register,
            WalletOperation::Deposit { .. } => OperationKind::Deposit,
            WalletOperation::Transfer { .. } => OperationKind::Transfer,
            WalletOperation::Purchase { .. } => OperationKind::Buy,
        }
    }
}
