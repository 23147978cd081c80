//! Thread-safe in-process wallet store
//!
//! This module provides the `MemoryStore` struct, which holds accounts, the
//! transfer ledger and purchase records in memory.
//!
//! # Design
//!
//! Accounts are indexed in a `DashMap`, but each account row sits behind its
//! own `Arc<Mutex<_>>`. A [`MemoryTransaction`] clones the `Arc`s of every
//! account it needs out of the map and then locks them in ascending id order,
//! holding the owned guards until it commits or is dropped. This gives:
//!
//! - Per-account serialization of check-then-debit sequences
//! - No global lock: transactions on disjoint accounts run in parallel
//! - Deadlock freedom, since every transaction acquires locks in the same order
//!
//! Changes are staged inside the transaction and applied in `commit` while all
//! account locks are still held, so no other thread can observe a debit
//! without its matching credit and ledger entry.

use crate::core::traits::{StoreTransaction, WalletStore};
use crate::types::{
    Account, AccountId, Coins, EntryId, LedgerEntry, PurchaseRecord, WalletError,
};
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Mutable part of an account, guarded per account
#[derive(Debug)]
struct AccountRow {
    username: String,
    balance: Coins,
}

type RowGuard = ArcMutexGuard<RawMutex, AccountRow>;

/// Thread-safe in-memory wallet store
///
/// All methods are safe to call from multiple threads concurrently.
#[derive(Debug)]
pub struct MemoryStore {
    /// Account rows by id
    accounts: DashMap<AccountId, Arc<Mutex<AccountRow>>>,

    /// Username index, the uniqueness constraint for registration
    usernames: DashMap<String, AccountId>,

    /// Append-only transfer ledger in commit order
    ledger: RwLock<Vec<LedgerEntry>>,

    /// Append-only purchase records in commit order
    purchases: RwLock<Vec<PurchaseRecord>>,

    next_account_id: AtomicI64,
    next_entry_id: AtomicI64,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            usernames: DashMap::new(),
            ledger: RwLock::new(Vec::new()),
            purchases: RwLock::new(Vec::new()),
            next_account_id: AtomicI64::new(1),
            next_entry_id: AtomicI64::new(1),
        }
    }

    /// Clone the row handle out of the index without keeping the shard locked
    fn row(&self, account: AccountId) -> Result<Arc<Mutex<AccountRow>>, WalletError> {
        self.accounts
            .get(&account)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| WalletError::account_not_found(account))
    }

    fn next_entry_id(&self) -> EntryId {
        self.next_entry_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WalletStore for MemoryStore {
    type Tx<'a> = MemoryTransaction<'a>;

    fn begin(&self, accounts: &[AccountId]) -> Result<MemoryTransaction<'_>, WalletError> {
        let mut ids = accounts.to_vec();
        ids.sort_unstable();
        ids.dedup();

        // Resolve every handle before locking anything
        let handles = ids
            .iter()
            .map(|&id| self.row(id).map(|row| (id, row)))
            .collect::<Result<Vec<_>, _>>()?;

        // Ascending id order
        let rows = handles
            .into_iter()
            .map(|(id, row)| (id, row.lock_arc()))
            .collect();

        Ok(MemoryTransaction {
            store: self,
            rows,
            pending_balances: HashMap::new(),
            pending_ledger: Vec::new(),
            pending_purchases: Vec::new(),
        })
    }

    fn create_account(
        &self,
        username: &str,
        starting_balance: Coins,
    ) -> Result<AccountId, WalletError> {
        if starting_balance < 0 {
            return Err(WalletError::invalid_amount(starting_balance));
        }

        match self.usernames.entry(username.to_string()) {
            Entry::Occupied(_) => Err(WalletError::account_exists(username)),
            Entry::Vacant(vacant) => {
                let id = self.next_account_id.fetch_add(1, Ordering::Relaxed);
                self.accounts.insert(
                    id,
                    Arc::new(Mutex::new(AccountRow {
                        username: username.to_string(),
                        balance: starting_balance,
                    })),
                );
                vacant.insert(id);
                Ok(id)
            }
        }
    }

    fn find_account(&self, username: &str) -> Result<Option<Account>, WalletError> {
        let id = match self.usernames.get(username) {
            Some(entry) => *entry.value(),
            None => return Ok(None),
        };
        let row = self.row(id)?;
        let row = row.lock();
        Ok(Some(Account::new(id, row.username.clone(), row.balance)))
    }

    fn balance_of(&self, account: AccountId) -> Result<Coins, WalletError> {
        let row = self.row(account)?;
        let balance = row.lock().balance;
        Ok(balance)
    }

    fn credit_balance(&self, account: AccountId, amount: Coins) -> Result<(), WalletError> {
        if amount <= 0 {
            return Err(WalletError::invalid_amount(amount));
        }

        let row = self.row(account)?;
        let mut row = row.lock();
        row.balance = row
            .balance
            .checked_add(amount)
            .ok_or_else(|| WalletError::arithmetic_overflow("deposit", account))?;
        Ok(())
    }

    fn ledger_entries_for(&self, account: AccountId) -> Result<Vec<LedgerEntry>, WalletError> {
        Ok(self
            .ledger
            .read()
            .iter()
            .filter(|entry| entry.involves(account))
            .cloned()
            .collect())
    }

    fn purchase_records_for(
        &self,
        account: AccountId,
    ) -> Result<Vec<PurchaseRecord>, WalletError> {
        Ok(self
            .purchases
            .read()
            .iter()
            .filter(|record| record.account == account)
            .cloned()
            .collect())
    }

    fn accounts(&self) -> Result<Vec<Account>, WalletError> {
        let mut handles: Vec<(AccountId, Arc<Mutex<AccountRow>>)> = self
            .accounts
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();
        handles.sort_by_key(|(id, _)| *id);

        Ok(handles
            .into_iter()
            .map(|(id, row)| {
                let row = row.lock();
                Account::new(id, row.username.clone(), row.balance)
            })
            .collect())
    }
}

/// Pending purchase awaiting commit
#[derive(Debug)]
struct PendingPurchase {
    account: AccountId,
    item_name: String,
    unit_price: Coins,
    quantity: i64,
}

/// Transaction over a set of locked accounts in a [`MemoryStore`]
///
/// Dropping it without calling `commit` discards every staged change.
pub struct MemoryTransaction<'a> {
    store: &'a MemoryStore,

    /// Owned guards, sorted by account id
    rows: Vec<(AccountId, RowGuard)>,

    pending_balances: HashMap<AccountId, Coins>,
    pending_ledger: Vec<(AccountId, AccountId, Coins)>,
    pending_purchases: Vec<PendingPurchase>,
}

impl MemoryTransaction<'_> {
    fn ensure_locked(&self, account: AccountId) -> Result<(), WalletError> {
        if self.rows.iter().any(|(id, _)| *id == account) {
            Ok(())
        } else {
            Err(WalletError::account_not_in_transaction(account))
        }
    }
}

impl StoreTransaction for MemoryTransaction<'_> {
    fn balance(&mut self, account: AccountId) -> Result<Coins, WalletError> {
        if let Some(balance) = self.pending_balances.get(&account) {
            return Ok(*balance);
        }

        self.rows
            .iter()
            .find(|(id, _)| *id == account)
            .map(|(_, row)| row.balance)
            .ok_or_else(|| WalletError::account_not_in_transaction(account))
    }

    fn adjust_balance(&mut self, account: AccountId, delta: Coins) -> Result<(), WalletError> {
        let current = self.balance(account)?;

        let updated = current
            .checked_add(delta)
            .ok_or_else(|| WalletError::arithmetic_overflow("adjust_balance", account))?;

        if updated < 0 {
            return Err(WalletError::insufficient_funds(
                account,
                current,
                delta.saturating_neg(),
            ));
        }

        self.pending_balances.insert(account, updated);
        Ok(())
    }

    fn append_ledger_entry(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: Coins,
    ) -> Result<(), WalletError> {
        self.ensure_locked(from)?;
        self.ensure_locked(to)?;
        self.pending_ledger.push((from, to, amount));
        Ok(())
    }

    fn append_purchase_record(
        &mut self,
        account: AccountId,
        item_name: &str,
        unit_price: Coins,
        quantity: i64,
    ) -> Result<(), WalletError> {
        self.ensure_locked(account)?;
        self.pending_purchases.push(PendingPurchase {
            account,
            item_name: item_name.to_string(),
            unit_price,
            quantity,
        });
        Ok(())
    }

    fn commit(self) -> Result<(), WalletError> {
        let MemoryTransaction {
            store,
            mut rows,
            pending_balances,
            pending_ledger,
            pending_purchases,
        } = self;

        let now = Utc::now();

        for (id, row) in rows.iter_mut() {
            if let Some(balance) = pending_balances.get(&*id) {
                row.balance = *balance;
            }
        }

        if !pending_ledger.is_empty() {
            let mut ledger = store.ledger.write();
            for (from_account, to_account, amount) in pending_ledger {
                ledger.push(LedgerEntry {
                    id: store.next_entry_id(),
                    from_account,
                    to_account,
                    amount,
                    created_at: now,
                });
            }
        }

        if !pending_purchases.is_empty() {
            let mut purchases = store.purchases.write();
            for pending in pending_purchases {
                purchases.push(PurchaseRecord {
                    id: store.next_entry_id(),
                    account: pending.account,
                    item_name: pending.item_name,
                    unit_price: pending.unit_price,
                    quantity: pending.quantity,
                    created_at: now,
                });
            }
        }

        // Account locks are released here, after the ledger is written
        drop(rows);
        Ok(())
    }

    fn rollback(self) -> Result<(), WalletError> {
        Ok(())
    }
}
