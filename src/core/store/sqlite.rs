//! SQLite-backed wallet store
//!
//! Persists accounts, ledger entries and purchase records in a single SQLite
//! database through `rusqlite`.
//!
//! A [`SqliteTransaction`] runs `BEGIN IMMEDIATE`, which takes the database
//! write lock up front, so the balance read and the conditional debit inside
//! one engine operation can never interleave with another writer. The
//! connection is shared behind a mutex; the busy timeout bounds how long a
//! writer waits on a lock held by another process before the operation fails
//! with a retryable `StoreFailure`.

use crate::core::traits::{StoreTransaction, WalletStore};
use crate::types::{
    Account, AccountId, Coins, LedgerEntry, PurchaseRecord, WalletError,
};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::time::Duration;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS accounts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        balance INTEGER NOT NULL CHECK (balance >= 0),
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS ledger_entries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        from_account INTEGER NOT NULL REFERENCES accounts(id),
        to_account INTEGER NOT NULL REFERENCES accounts(id),
        amount INTEGER NOT NULL CHECK (amount > 0),
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS purchase_records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        account INTEGER NOT NULL REFERENCES accounts(id),
        item_name TEXT NOT NULL,
        unit_price INTEGER NOT NULL CHECK (unit_price > 0),
        quantity INTEGER NOT NULL CHECK (quantity > 0),
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_ledger_from ON ledger_entries(from_account);
    CREATE INDEX IF NOT EXISTS idx_ledger_to ON ledger_entries(to_account);
    CREATE INDEX IF NOT EXISTS idx_purchases_account ON purchase_records(account);
";

/// Fixed-width RFC 3339 so that text ordering matches time ordering
fn timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(column: usize, text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

fn ledger_entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LedgerEntry> {
    let created_at: String = row.get(4)?;
    Ok(LedgerEntry {
        id: row.get(0)?,
        from_account: row.get(1)?,
        to_account: row.get(2)?,
        amount: row.get(3)?,
        created_at: parse_timestamp(4, &created_at)?,
    })
}

fn purchase_record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PurchaseRecord> {
    let created_at: String = row.get(5)?;
    Ok(PurchaseRecord {
        id: row.get(0)?,
        account: row.get(1)?,
        item_name: row.get(2)?,
        unit_price: row.get(3)?,
        quantity: row.get(4)?,
        created_at: parse_timestamp(5, &created_at)?,
    })
}

/// Wallet store persisted in SQLite
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Busy timeout used when the caller does not pick one
    pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

    /// Open (or create) a database file and apply the schema
    ///
    /// # Arguments
    ///
    /// * `path` - Database file path
    /// * `busy_timeout` - How long a write waits for a lock held elsewhere
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self, WalletError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::with_connection(conn, busy_timeout)
    }

    /// Open a private in-memory database, mostly useful for tests
    pub fn open_in_memory() -> Result<Self, WalletError> {
        Self::with_connection(Connection::open_in_memory()?, Self::DEFAULT_BUSY_TIMEOUT)
    }

    fn with_connection(conn: Connection, busy_timeout: Duration) -> Result<Self, WalletError> {
        conn.busy_timeout(busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;

        tracing::debug!("sqlite schema ready");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn account_exists(conn: &Connection, account: AccountId) -> Result<bool, WalletError> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM accounts WHERE id = ?1",
            params![account],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

impl WalletStore for SqliteStore {
    type Tx<'a> = SqliteTransaction<'a>;

    fn begin(&self, accounts: &[AccountId]) -> Result<SqliteTransaction<'_>, WalletError> {
        let conn = self.conn.lock();
        conn.execute_batch("BEGIN IMMEDIATE")?;

        // From here on, dropping `tx` rolls back
        let mut tx = SqliteTransaction {
            conn,
            accounts: Vec::with_capacity(accounts.len()),
            open: true,
        };

        for &account in accounts {
            if !account_exists(&tx.conn, account)? {
                return Err(WalletError::account_not_found(account));
            }
            if !tx.accounts.contains(&account) {
                tx.accounts.push(account);
            }
        }

        Ok(tx)
    }

    fn create_account(
        &self,
        username: &str,
        starting_balance: Coins,
    ) -> Result<AccountId, WalletError> {
        if starting_balance < 0 {
            return Err(WalletError::invalid_amount(starting_balance));
        }

        let conn = self.conn.lock();
        let inserted = conn.execute(
            "INSERT INTO accounts (username, balance, created_at) VALUES (?1, ?2, ?3)",
            params![username, starting_balance, timestamp(Utc::now())],
        );

        match inserted {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Err(WalletError::account_exists(username))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn find_account(&self, username: &str) -> Result<Option<Account>, WalletError> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row(
                "SELECT id, username, balance FROM accounts WHERE username = ?1",
                params![username],
                |row| Ok(Account::new(row.get(0)?, row.get::<_, String>(1)?, row.get(2)?)),
            )
            .optional()?)
    }

    fn balance_of(&self, account: AccountId) -> Result<Coins, WalletError> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT balance FROM accounts WHERE id = ?1",
            params![account],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| WalletError::account_not_found(account))
    }

    fn credit_balance(&self, account: AccountId, amount: Coins) -> Result<(), WalletError> {
        if amount <= 0 {
            return Err(WalletError::invalid_amount(amount));
        }

        // SQLite turns integer overflow into a REAL, so bound it up front
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE accounts SET balance = balance + ?1 WHERE id = ?2 AND balance <= ?3",
            params![amount, account, Coins::MAX - amount],
        )?;

        if changed == 0 {
            return if account_exists(&conn, account)? {
                Err(WalletError::arithmetic_overflow("deposit", account))
            } else {
                Err(WalletError::account_not_found(account))
            };
        }
        Ok(())
    }

    fn ledger_entries_for(&self, account: AccountId) -> Result<Vec<LedgerEntry>, WalletError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, from_account, to_account, amount, created_at
             FROM ledger_entries
             WHERE from_account = ?1 OR to_account = ?1
             ORDER BY created_at DESC, id DESC",
        )?;
        let entries = stmt
            .query_map(params![account], ledger_entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn purchase_records_for(
        &self,
        account: AccountId,
    ) -> Result<Vec<PurchaseRecord>, WalletError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, account, item_name, unit_price, quantity, created_at
             FROM purchase_records
             WHERE account = ?1",
        )?;
        let records = stmt
            .query_map(params![account], purchase_record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn accounts(&self) -> Result<Vec<Account>, WalletError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id, username, balance FROM accounts ORDER BY id")?;
        let accounts = stmt
            .query_map([], |row| {
                Ok(Account::new(row.get(0)?, row.get::<_, String>(1)?, row.get(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(accounts)
    }
}

/// Open `BEGIN IMMEDIATE` transaction on the shared connection
///
/// Holds the connection mutex for its whole lifetime. Dropping it without a
/// successful `commit` issues `ROLLBACK`.
pub struct SqliteTransaction<'a> {
    conn: MutexGuard<'a, Connection>,
    accounts: Vec<AccountId>,
    open: bool,
}

impl SqliteTransaction<'_> {
    /// Run the statement that ends the transaction
    ///
    /// The transaction only counts as closed once the statement succeeds, so
    /// a failed end still gets a `ROLLBACK` on drop.
    fn finish(&mut self, statement: &str) -> Result<(), WalletError> {
        self.conn.execute_batch(statement)?;
        self.open = false;
        Ok(())
    }

    fn ensure_locked(&self, account: AccountId) -> Result<(), WalletError> {
        if self.accounts.contains(&account) {
            Ok(())
        } else {
            Err(WalletError::account_not_in_transaction(account))
        }
    }
}

impl StoreTransaction for SqliteTransaction<'_> {
    fn balance(&mut self, account: AccountId) -> Result<Coins, WalletError> {
        self.ensure_locked(account)?;
        self.conn
            .query_row(
                "SELECT balance FROM accounts WHERE id = ?1",
                params![account],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| WalletError::account_not_found(account))
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

        self.conn.execute(
            "UPDATE accounts SET balance = ?1 WHERE id = ?2",
            params![updated, account],
        )?;
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
        self.conn.execute(
            "INSERT INTO ledger_entries (from_account, to_account, amount, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![from, to, amount, timestamp(Utc::now())],
        )?;
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
        self.conn.execute(
            "INSERT INTO purchase_records (account, item_name, unit_price, quantity, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![account, item_name, unit_price, quantity, timestamp(Utc::now())],
        )?;
        Ok(())
    }

    fn commit(mut self) -> Result<(), WalletError> {
        self.finish("COMMIT")
    }

    fn rollback(mut self) -> Result<(), WalletError> {
        self.finish("ROLLBACK")
    }
}

impl Drop for SqliteTransaction<'_> {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::warn!(error = %e, "rollback on drop failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn test_create_and_find_account() {
        let store = SqliteStore::open_in_memory().unwrap();

        let id = store.create_account("alice", 1000).unwrap();

        let found = store.find_account("alice").unwrap().unwrap();
        assert_eq!(found, Account::new(id, "alice", 1000));
        assert!(store.find_account("bob").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_username_is_account_exists() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.create_account("alice", 1000).unwrap();

        assert_eq!(
            store.create_account("alice", 5),
            Err(WalletError::account_exists("alice"))
        );
    }

    #[test]
    fn test_credit_unknown_account() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(
            store.credit_balance(3, 10),
            Err(WalletError::account_not_found(3))
        );
    }

    #[test]
    fn test_commit_persists_all_rows() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = store.create_account("alice", 100).unwrap();
        let b = store.create_account("bob", 100).unwrap();

        let mut tx = store.begin(&[a, b]).unwrap();
        tx.adjust_balance(a, -25).unwrap();
        tx.adjust_balance(b, 25).unwrap();
        tx.append_ledger_entry(a, b, 25).unwrap();
        tx.commit().unwrap();

        assert_eq!(store.balance_of(a).unwrap(), 75);
        assert_eq!(store.balance_of(b).unwrap(), 125);
        assert_eq!(store.ledger_entries_for(a).unwrap().len(), 1);
    }

    #[test]
    fn test_drop_rolls_back() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = store.create_account("alice", 100).unwrap();

        {
            let mut tx = store.begin(&[a]).unwrap();
            tx.adjust_balance(a, -60).unwrap();
            tx.append_purchase_record(a, "book", 50, 1).unwrap();
            // Failure path: dropped while still open
        }

        assert_eq!(store.balance_of(a).unwrap(), 100);
        assert!(store.purchase_records_for(a).unwrap().is_empty());
    }

    #[test]
    fn test_failed_finish_still_rolls_back_on_drop() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = store.create_account("alice", 100).unwrap();

        {
            let mut tx = store.begin(&[a]).unwrap();
            tx.adjust_balance(a, -60).unwrap();

            assert!(tx.finish("RELEASE no_such_savepoint").is_err());
            assert!(tx.open);
        }

        assert_eq!(store.balance_of(a).unwrap(), 100);
        // The connection is out of the transaction, so a new one can begin
        let tx = store.begin(&[a]).unwrap();
        tx.rollback().unwrap();
    }

    #[test]
    fn test_explicit_rollback_frees_connection() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = store.create_account("alice", 100).unwrap();

        let mut tx = store.begin(&[a]).unwrap();
        tx.adjust_balance(a, 50).unwrap();
        tx.rollback().unwrap();

        let mut tx = store.begin(&[a]).unwrap();
        assert_eq!(tx.balance(a).unwrap(), 100);
        tx.commit().unwrap();
    }

    #[test]
    fn test_begin_with_missing_account_rolls_back() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = store.create_account("alice", 100).unwrap();

        assert!(matches!(
            store.begin(&[a, 99]),
            Err(WalletError::AccountNotFound { account: 99 })
        ));

        // A dangling transaction would make this BEGIN fail
        let tx = store.begin(&[a]).unwrap();
        tx.rollback().unwrap();
    }

    #[test]
    fn test_history_ordered_newest_first() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = store.create_account("alice", 100).unwrap();
        let b = store.create_account("bob", 100).unwrap();

        for amount in [1, 2, 3] {
            let mut tx = store.begin(&[a, b]).unwrap();
            tx.adjust_balance(a, -amount).unwrap();
            tx.adjust_balance(b, amount).unwrap();
            tx.append_ledger_entry(a, b, amount).unwrap();
            tx.commit().unwrap();
        }

        let amounts: Vec<Coins> = store
            .ledger_entries_for(b)
            .unwrap()
            .iter()
            .map(|entry| entry.amount)
            .collect();
        assert_eq!(amounts, vec![3, 2, 1]);
    }

    #[test]
    fn test_file_database_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wallet.db");

        {
            let store = SqliteStore::open(&path, Duration::from_secs(1)).unwrap();
            let id = store.create_account("alice", 1000).unwrap();
            store.credit_balance(id, 5).unwrap();
        }

        let store = SqliteStore::open(&path, Duration::from_secs(1)).unwrap();
        let alice = store.find_account("alice").unwrap().unwrap();
        assert_eq!(alice.balance, 1005);
    }

    #[test]
    fn test_adjust_balance_outside_transaction_accounts() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = store.create_account("alice", 10).unwrap();
        let b = store.create_account("bob", 10).unwrap();

        let mut tx = store.begin(&[a]).unwrap();
        let result = tx.adjust_balance(b, 5);

        assert_eq!(result, Err(WalletError::account_not_in_transaction(b)));
        assert!(!result.unwrap_err().is_retryable());
    }

    #[test]
    fn test_lock_held_by_other_connection_is_retryable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wallet.db");
        let holder = SqliteStore::open(&path, Duration::from_secs(1)).unwrap();
        let waiter = SqliteStore::open(&path, Duration::from_millis(10)).unwrap();
        let a = holder.create_account("alice", 10).unwrap();

        let tx = holder.begin(&[a]).unwrap();
        let error = waiter.create_account("bob", 10).unwrap_err();
        tx.rollback().unwrap();

        assert!(error.is_retryable(), "{:?}", error);
        assert!(waiter.create_account("bob", 10).is_ok());
    }

    #[test]
    fn test_check_violation_is_not_retryable() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = store.create_account("alice", 10).unwrap();

        let mut tx = store.begin(&[a]).unwrap();
        let error = tx.append_purchase_record(a, "cup", 0, 1).unwrap_err();

        assert!(matches!(error, WalletError::StoreFailure { retryable: false, .. }));
    }

    #[test]
    fn test_concurrent_debits_never_overdraw() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let a = store.create_account("alice", 100).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let mut tx = store.begin(&[a])?;
                    tx.adjust_balance(a, -60)?;
                    tx.commit()
                })
            })
            .collect();

        let succeeded = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(Result::is_ok)
            .count();

        assert_eq!(succeeded, 1);
        assert_eq!(store.balance_of(a).unwrap(), 40);
    }
}
