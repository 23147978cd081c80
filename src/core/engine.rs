//! Balance transaction engine
//!
//! This module provides the `WalletEngine` that executes every money-moving
//! operation against a [`WalletStore`].
//!
//! The engine enforces business rules such as:
//! - Amount and quantity validation before any store access
//! - No transfers from an account to itself
//! - Catalog pricing for purchases (the caller never supplies a price)
//! - Sufficiency checks inside the store transaction, so that check and
//!   debit form one serialized unit per account
//!
//! Each transfer or purchase is one store transaction: begin, validate,
//! mutate, commit. Any failure on the way rolls the whole unit back.

use crate::core::catalog::Catalog;
use crate::core::traits::{StoreTransaction, WalletStore};
use crate::core::{inventory, ledger};
use crate::types::{
    Account, AccountId, AccountInfo, Coins, InventoryLine, LedgerEntry, WalletError,
    WalletOperation,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Engine configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalletConfig {
    /// Balance of a freshly registered account
    pub starting_balance: Coins,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            starting_balance: 1000,
        }
    }
}

/// Balance transaction engine
///
/// Cloning is cheap: clones share the same store and catalog, so an engine can
/// be handed to every worker thread.
pub struct WalletEngine<S: WalletStore> {
    store: Arc<S>,
    catalog: Arc<Catalog>,
    config: WalletConfig,
}

impl<S: WalletStore> Clone for WalletEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            catalog: Arc::clone(&self.catalog),
            config: self.config.clone(),
        }
    }
}

/// Commit on success, roll back on failure
fn finish<T, R>(tx: T, outcome: Result<R, WalletError>, operation: &str) -> Result<R, WalletError>
where
    T: StoreTransaction,
{
    match outcome {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback_error) = tx.rollback() {
                warn!(operation, error = %rollback_error, "rollback failed");
            }
            warn!(operation, error = %error, "rolled back");
            Err(error)
        }
    }
}

fn apply_transfer<T: StoreTransaction>(
    tx: &mut T,
    from: AccountId,
    to: AccountId,
    amount: Coins,
) -> Result<(), WalletError> {
    let balance = tx.balance(from)?;
    if balance < amount {
        return Err(WalletError::insufficient_funds(from, balance, amount));
    }

    tx.adjust_balance(from, -amount)?;
    tx.adjust_balance(to, amount)?;
    tx.append_ledger_entry(from, to, amount)
}

fn apply_purchase<T: StoreTransaction>(
    tx: &mut T,
    account: AccountId,
    item_name: &str,
    unit_price: Coins,
    quantity: i64,
    total_cost: Coins,
) -> Result<(), WalletError> {
    let balance = tx.balance(account)?;
    if balance < total_cost {
        return Err(WalletError::insufficient_funds(account, balance, total_cost));
    }

    tx.adjust_balance(account, -total_cost)?;
    tx.append_purchase_record(account, item_name, unit_price, quantity)
}

impl<S: WalletStore> WalletEngine<S> {
    /// Create a new engine
    ///
    /// # Arguments
    ///
    /// * `store` - Shared storage backend
    /// * `catalog` - Item price table
    /// * `config` - Starting balance and timeouts
    pub fn new(store: Arc<S>, catalog: Arc<Catalog>, config: WalletConfig) -> Self {
        Self {
            store,
            catalog,
            config,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    /// Register a new account with the configured starting balance
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The username is empty
    /// - The username is already registered
    pub fn register(&self, username: &str) -> Result<AccountId, WalletError> {
        if username.trim().is_empty() {
            return Err(WalletError::invalid_operation(
                "register",
                "username must not be empty",
            ));
        }

        let id = self
            .store
            .create_account(username, self.config.starting_balance)?;
        info!(account = id, username, "account registered");
        Ok(id)
    }

    /// Resolve a username to its account id
    pub fn resolve(&self, username: &str) -> Result<AccountId, WalletError> {
        self.store
            .find_account(username)?
            .map(|account| account.id)
            .ok_or_else(|| WalletError::user_not_found(username))
    }

    /// Move coins from one account to another
    ///
    /// Debits `from`, credits `to` and appends one ledger entry in a single
    /// store transaction. Either all three are observed or none.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `amount` is not positive (`InvalidAmount`)
    /// - `from == to` (`SelfTransfer`)
    /// - Either account does not exist (`AccountNotFound`)
    /// - `from` holds less than `amount` (`InsufficientFunds`)
    /// - The store fails (`StoreFailure`)
    pub fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Coins,
    ) -> Result<(), WalletError> {
        if amount <= 0 {
            return Err(WalletError::invalid_amount(amount));
        }
        if from == to {
            return Err(WalletError::self_transfer(from));
        }

        let mut tx = self.store.begin(&[from, to])?;
        debug!(from, to, amount, "transfer started");

        let outcome = apply_transfer(&mut tx, from, to, amount);
        finish(tx, outcome, "transfer")?;

        info!(from, to, amount, "transfer committed");
        Ok(())
    }

    /// Buy `quantity` units of a catalog item
    ///
    /// The unit price is the catalog's current price. Debits the account by
    /// price times quantity and appends one purchase record in a single
    /// store transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `quantity` is not positive (`InvalidQuantity`)
    /// - The item is not in the catalog (`ItemNotFound`)
    /// - The total cost overflows (`ArithmeticOverflow`)
    /// - The account does not exist (`AccountNotFound`)
    /// - The balance is below the total cost (`InsufficientFunds`)
    pub fn purchase_item(
        &self,
        account: AccountId,
        item_name: &str,
        quantity: i64,
    ) -> Result<(), WalletError> {
        if quantity <= 0 {
            return Err(WalletError::invalid_quantity(quantity));
        }

        let unit_price = self.catalog.price_of(item_name)?;
        let total_cost = unit_price
            .checked_mul(quantity)
            .ok_or_else(|| WalletError::arithmetic_overflow("purchase", account))?;

        let mut tx = self.store.begin(&[account])?;
        debug!(
            account,
            item = item_name,
            quantity,
            total_cost,
            "purchase started"
        );

        let outcome = apply_purchase(
            &mut tx,
            account,
            item_name,
            unit_price,
            quantity,
            total_cost,
        );
        finish(tx, outcome, "purchase")?;

        info!(
            account,
            item = item_name,
            quantity,
            total_cost,
            "purchase committed"
        );
        Ok(())
    }

    /// Credit coins to an account
    ///
    /// A single atomic credit; no ledger entry is written.
    pub fn deposit(&self, account: AccountId, amount: Coins) -> Result<(), WalletError> {
        if amount <= 0 {
            return Err(WalletError::invalid_amount(amount));
        }

        self.store.credit_balance(account, amount)?;
        info!(account, amount, "deposit committed");
        Ok(())
    }

    pub fn get_balance(&self, account: AccountId) -> Result<Coins, WalletError> {
        self.store.balance_of(account)
    }

    /// Transfers the account took part in, newest first
    pub fn history(&self, account: AccountId) -> Result<Vec<LedgerEntry>, WalletError> {
        Ok(ledger::newest_first(self.store.ledger_entries_for(account)?))
    }

    /// Items the account owns, grouped by name and price
    pub fn inventory(&self, account: AccountId) -> Result<Vec<InventoryLine>, WalletError> {
        let records = self.store.purchase_records_for(account)?;
        inventory::project(&records)
    }

    /// Balance, inventory and history in one call
    pub fn info(&self, account: AccountId) -> Result<AccountInfo, WalletError> {
        Ok(AccountInfo {
            balance: self.get_balance(account)?,
            inventory: self.inventory(account)?,
            history: self.history(account)?,
        })
    }

    /// All accounts sorted by id
    pub fn accounts(&self) -> Result<Vec<Account>, WalletError> {
        self.store.accounts()
    }

    /// Execute an operation that names users by username
    ///
    /// Usernames are resolved at execution time, so an operation can refer to
    /// a user registered earlier in the same replay.
    pub fn execute(&self, operation: &WalletOperation) -> Result<(), WalletError> {
        match operation {
            WalletOperation::Register { username } => self.register(username).map(|_| ()),
            WalletOperation::Deposit { username, amount } => {
                self.deposit(self.resolve(username)?, *amount)
            }
            WalletOperation::Transfer { from, to, amount } => {
                let from = self.resolve(from)?;
                let to = self.resolve(to)?;
                self.transfer(from, to, *amount)
            }
            WalletOperation::Purchase {
                username,
                item,
                quantity,
            } => self.purchase_item(self.resolve(username)?, item, *quantity),
        }
    }
}
