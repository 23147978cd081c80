//! Error types for the coin wallet
//!
//! This module defines all error types that can occur while executing wallet
//! operations or replaying an operation log.
//!
//! # Error Categories
//!
//! - **Validation Errors**: Invalid amount or quantity, self-transfer. Detected
//!   before any store access, so they never leave partial state.
//! - **Domain Errors**: Insufficient funds, unknown account or item, duplicate
//!   username. Detected inside the store transaction, which is rolled back.
//! - **Store Errors**: Persistence failures. The operation is rolled back.
//!   Only a lock timeout (SQLite busy or locked) is retryable by the caller.
//! - **Replay Errors**: File not found, CSV parsing, malformed operations.

use crate::types::{AccountId, Coins};
use thiserror::Error;

/// Main error type for the wallet
///
/// Each variant includes relevant context to help diagnose the failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    /// Transfer or deposit amount is zero or negative
    #[error("Invalid amount {amount}: must be positive")]
    InvalidAmount {
        /// The rejected amount
        amount: Coins,
    },

    /// Purchase quantity is zero or negative
    #[error("Invalid quantity {quantity}: must be positive")]
    InvalidQuantity {
        /// The rejected quantity
        quantity: i64,
    },

    /// Sender and recipient are the same account
    #[error("Account {account} cannot transfer to itself")]
    SelfTransfer {
        /// The account that tried to pay itself
        account: AccountId,
    },

    /// Balance is lower than the amount being debited
    ///
    /// Detected inside the store transaction; the whole operation is rolled back.
    #[error("Insufficient funds for account {account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// Account being debited
        account: AccountId,
        /// Balance at the time of the check
        balance: Coins,
        /// Amount that was requested
        requested: Coins,
    },

    /// Account id does not exist
    #[error("Account {account} not found")]
    AccountNotFound {
        /// The missing account id
        account: AccountId,
    },

    /// Username does not resolve to an account
    #[error("User '{username}' not found")]
    UserNotFound {
        /// The unknown username
        username: String,
    },

    /// Item is not in the catalog
    #[error("Item '{item}' not found in catalog")]
    ItemNotFound {
        /// The unknown item name
        item: String,
    },

    /// Username is already registered
    #[error("Account for user '{username}' already exists")]
    AccountExists {
        /// The duplicate username
        username: String,
    },

    /// Arithmetic overflow would occur
    ///
    /// The operation is rejected to maintain account integrity.
    #[error("Arithmetic overflow in {operation} for account {account}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
        /// Account involved
        account: AccountId,
    },

    /// Underlying persistence failure
    ///
    /// The operation was rolled back.
    #[error("Store failure: {message}")]
    StoreFailure {
        /// Description of the store error
        message: String,
        /// Whether the failure was a lock timeout that may clear on retry
        retryable: bool,
    },

    /// A transaction touched an account it was not opened for
    #[error("Account {account} is not part of this transaction")]
    AccountNotInTransaction {
        /// The account outside the transaction
        account: AccountId,
    },

    /// A replay worker task panicked or was cancelled
    ///
    /// Every operation assigned to that task is reported with this error.
    #[error("Replay task failed: {message}")]
    TaskFailed {
        /// Description of the join error
        message: String,
    },

    /// File not found at the specified path
    #[error("File not found: {path}")]
    FileNotFound {
        /// The path that was not found
        path: String,
    },

    /// I/O error occurred while reading or writing files
    #[error("I/O error: {message}")]
    IoError {
        /// Description of the I/O error
        message: String,
    },

    /// CSV parsing error occurred
    ///
    /// The malformed record is skipped and replay continues.
    #[error(
        "CSV parse error{}: {message}",
        line.map(|l| format!(" at line {}", l)).unwrap_or_default()
    )]
    ParseError {
        /// Line number where the error occurred (if available)
        line: Option<u64>,
        /// Description of the parsing error
        message: String,
    },

    /// Operation row could not be turned into a wallet operation
    #[error("Invalid {op} operation: {reason}")]
    InvalidOperation {
        /// Operation name as written in the input
        op: String,
        /// Why the row was rejected
        reason: String,
    },
}

impl WalletError {
    /// Whether the caller may retry the same operation unchanged
    ///
    /// Only store lock timeouts qualify; every other failure repeats.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WalletError::StoreFailure { retryable: true, .. })
    }
}

// Conversion from rusqlite::Error to WalletError
impl From<rusqlite::Error> for WalletError {
    fn from(error: rusqlite::Error) -> Self {
        let retryable = matches!(
            &error,
            rusqlite::Error::SqliteFailure(e, _)
                if matches!(
                    e.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                )
        );

        WalletError::StoreFailure {
            message: error.to_string(),
            retryable,
        }
    }
}

// Conversion from tokio::task::JoinError to WalletError
impl From<tokio::task::JoinError> for WalletError {
    fn from(error: tokio::task::JoinError) -> Self {
        WalletError::TaskFailed {
            message: error.to_string(),
        }
    }
}

// Conversion from io::Error to WalletError
impl From<std::io::Error> for WalletError {
    fn from(error: std::io::Error) -> Self {
        WalletError::IoError {
            message: error.to_string(),
        }
    }
}

// Conversion from csv::Error to WalletError
impl From<csv::Error> for WalletError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        WalletError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl WalletError {
    /// Create an InvalidAmount error
    pub fn invalid_amount(amount: Coins) -> Self {
        WalletError::InvalidAmount { amount }
    }

    /// Create an InvalidQuantity error
    pub fn invalid_quantity(quantity: i64) -> Self {
        WalletError::InvalidQuantity { quantity }
    }

    /// Create a SelfTransfer error
    pub fn self_transfer(account: AccountId) -> Self {
        WalletError::SelfTransfer { account }
    }

    /// Create an InsufficientFunds error
    pub fn insufficient_funds(account: AccountId, balance: Coins, requested: Coins) -> Self {
        WalletError::InsufficientFunds {
            account,
            balance,
            requested,
        }
    }

    /// Create an AccountNotFound error
    pub fn account_not_found(account: AccountId) -> Self {
        WalletError::AccountNotFound { account }
    }

    /// Create a UserNotFound error
    pub fn user_not_found(username: &str) -> Self {
        WalletError::UserNotFound {
            username: username.to_string(),
        }
    }

    /// Create an ItemNotFound error
    pub fn item_not_found(item: &str) -> Self {
        WalletError::ItemNotFound {
            item: item.to_string(),
        }
    }

    /// Create an AccountExists error
    pub fn account_exists(username: &str) -> Self {
        WalletError::AccountExists {
            username: username.to_string(),
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str, account: AccountId) -> Self {
        WalletError::ArithmeticOverflow {
            operation: operation.to_string(),
            account,
        }
    }

    /// Create a non-retryable StoreFailure error
    pub fn store_failure(message: impl Into<String>) -> Self {
        WalletError::StoreFailure {
            message: message.into(),
            retryable: false,
        }
    }

    /// Create an AccountNotInTransaction error
    pub fn account_not_in_transaction(account: AccountId) -> Self {
        WalletError::AccountNotInTransaction { account }
    }

    /// Create an InvalidOperation error
    pub fn invalid_operation(op: impl ToString, reason: impl Into<String>) -> Self {
        WalletError::InvalidOperation {
            op: op.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::invalid_amount(
        WalletError::InvalidAmount { amount: -5 },
        "Invalid amount -5: must be positive"
    )]
    #[case::invalid_quantity(
        WalletError::InvalidQuantity { quantity: 0 },
        "Invalid quantity 0: must be positive"
    )]
    #[case::self_transfer(
        WalletError::SelfTransfer { account: 3 },
        "Account 3 cannot transfer to itself"
    )]
    #[case::insufficient_funds(
        WalletError::InsufficientFunds { account: 1, balance: 40, requested: 60 },
        "Insufficient funds for account 1: balance 40, requested 60"
    )]
    #[case::account_not_found(
        WalletError::AccountNotFound { account: 42 },
        "Account 42 not found"
    )]
    #[case::item_not_found(
        WalletError::ItemNotFound { item: "yacht".to_string() },
        "Item 'yacht' not found in catalog"
    )]
    #[case::store_failure(
        WalletError::StoreFailure { message: "database is locked".to_string(), retryable: true },
        "Store failure: database is locked"
    )]
    #[case::account_not_in_transaction(
        WalletError::AccountNotInTransaction { account: 4 },
        "Account 4 is not part of this transaction"
    )]
    #[case::parse_error_with_line(
        WalletError::ParseError { line: Some(42), message: "Invalid field".to_string() },
        "CSV parse error at line 42: Invalid field"
    )]
    #[case::parse_error_without_line(
        WalletError::ParseError { line: None, message: "Invalid field".to_string() },
        "CSV parse error: Invalid field"
    )]
    fn test_error_display(#[case] error: WalletError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[rstest]
    #[case::insufficient_funds(
        WalletError::insufficient_funds(1, 40, 60),
        WalletError::InsufficientFunds { account: 1, balance: 40, requested: 60 }
    )]
    #[case::item_not_found(
        WalletError::item_not_found("yacht"),
        WalletError::ItemNotFound { item: "yacht".to_string() }
    )]
    #[case::arithmetic_overflow(
        WalletError::arithmetic_overflow("purchase", 7),
        WalletError::ArithmeticOverflow { operation: "purchase".to_string(), account: 7 }
    )]
    fn test_helper_functions(#[case] result: WalletError, #[case] expected: WalletError) {
        assert_eq!(result, expected);
    }

    #[rstest]
    #[case::store_busy(
        WalletError::StoreFailure { message: "database is locked".to_string(), retryable: true },
        true
    )]
    #[case::store_permanent(WalletError::store_failure("disk I/O error"), false)]
    #[case::misuse(WalletError::account_not_in_transaction(2), false)]
    #[case::funds(WalletError::insufficient_funds(1, 0, 1), false)]
    #[case::validation(WalletError::invalid_amount(0), false)]
    fn test_is_retryable(#[case] error: WalletError, #[case] retryable: bool) {
        assert_eq!(error.is_retryable(), retryable);
    }

    #[tokio::test]
    async fn test_join_error_conversion() {
        let join_error = tokio::task::spawn(async { panic!("worker blew up") })
            .await
            .unwrap_err();
        let error: WalletError = join_error.into();

        assert!(matches!(error, WalletError::TaskFailed { .. }));
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Permission denied");
        let error: WalletError = io_error.into();
        assert!(matches!(error, WalletError::IoError { .. }));
        assert_eq!(error.to_string(), "I/O error: Permission denied");
    }

    #[rstest]
    #[case::busy(rusqlite::ffi::SQLITE_BUSY, true)]
    #[case::locked(rusqlite::ffi::SQLITE_LOCKED, true)]
    #[case::constraint(rusqlite::ffi::SQLITE_CONSTRAINT, false)]
    fn test_sqlite_error_retryable_only_when_busy(#[case] code: i32, #[case] retryable: bool) {
        let error: WalletError =
            rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(code), None).into();

        assert!(matches!(error, WalletError::StoreFailure { .. }));
        assert_eq!(error.is_retryable(), retryable);
    }

    #[test]
    fn test_sqlite_non_failure_error_is_not_retryable() {
        let error: WalletError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(!error.is_retryable());
    }
}
