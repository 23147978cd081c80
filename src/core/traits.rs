//! Core traits for wallet storage
//!
//! This module defines the store capability the engine is written against, so
//! the in-memory and SQLite backends can be used interchangeably.
//!
//! Every balance mutation apart from a deposit credit goes through a
//! [`StoreTransaction`]: the engine opens one with [`WalletStore::begin`],
//! naming every account it will touch, reads and adjusts balances, appends
//! the ledger or purchase row, and commits. A transaction that is dropped
//! without `commit` leaves no trace.

use crate::types::{
    Account, AccountId, Coins, LedgerEntry, PurchaseRecord, WalletError,
};

/// One atomic, isolated unit of work against a store
///
/// While the transaction is alive it has exclusive access to the accounts it
/// was opened for, so a balance read followed by a conditional adjustment
/// cannot interleave with another debit of the same account.
pub trait StoreTransaction {
    /// Current balance of a locked account, including adjustments staged so far
    fn balance(&mut self, account: AccountId) -> Result<Coins, WalletError>;

    /// Stage a signed balance change on a locked account
    ///
    /// Fails with `InsufficientFunds` if the resulting balance would be
    /// negative and with `ArithmeticOverflow` if it does not fit.
    fn adjust_balance(&mut self, account: AccountId, delta: Coins) -> Result<(), WalletError>;

    /// Stage a ledger entry for a transfer
    fn append_ledger_entry(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: Coins,
    ) -> Result<(), WalletError>;

    /// Stage a purchase record
    fn append_purchase_record(
        &mut self,
        account: AccountId,
        item_name: &str,
        unit_price: Coins,
        quantity: i64,
    ) -> Result<(), WalletError>;

    /// Apply every staged change at once and release the accounts
    fn commit(self) -> Result<(), WalletError>;

    /// Discard every staged change and release the accounts
    fn rollback(self) -> Result<(), WalletError>;
}

/// Storage backend for accounts, ledger entries and purchase records
///
/// Implementations must be shareable across threads; the engine holds one
/// behind an `Arc` and calls it from many workers at once.
pub trait WalletStore: Send + Sync {
    /// Transaction type handed out by [`WalletStore::begin`]
    type Tx<'a>: StoreTransaction
    where
        Self: 'a;

    /// Open a transaction with exclusive access to `accounts`
    ///
    /// Duplicate ids are allowed and collapse to one. Fails with
    /// `AccountNotFound` if any account does not exist.
    fn begin(&self, accounts: &[AccountId]) -> Result<Self::Tx<'_>, WalletError>;

    /// Create an account with a starting balance
    ///
    /// Fails with `AccountExists` if the username is taken.
    fn create_account(
        &self,
        username: &str,
        starting_balance: Coins,
    ) -> Result<AccountId, WalletError>;

    /// Look up an account by username
    fn find_account(&self, username: &str) -> Result<Option<Account>, WalletError>;

    /// Current balance of an account
    fn balance_of(&self, account: AccountId) -> Result<Coins, WalletError>;

    /// Add a positive amount to an account in a single atomic step
    fn credit_balance(&self, account: AccountId, amount: Coins) -> Result<(), WalletError>;

    /// Every ledger entry the account took part in, in no particular order
    fn ledger_entries_for(&self, account: AccountId) -> Result<Vec<LedgerEntry>, WalletError>;

    /// Every purchase record of the account, in no particular order
    fn purchase_records_for(&self, account: AccountId)
        -> Result<Vec<PurchaseRecord>, WalletError>;

    /// Snapshot of all accounts sorted by id
    fn accounts(&self) -> Result<Vec<Account>, WalletError>;
}
