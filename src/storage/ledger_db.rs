// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded ledger database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `wallets`: wallet id → serialized Wallet
//! - `wallet_owners`: `OWNER_TYPE:owner_id` → wallet id
//! - `transactions`: transaction id → serialized Transaction
//! - `ledger_entries`: entry sequence → serialized LedgerEntry
//! - `wallet_ledger_index`: composite key (wallet id | sequence) → signed amount
//! - `transaction_ledger_index`: composite key (transaction id | sequence) → sequence
//! - `users`: user id → serialized User
//! - `usernames`: username → user id
//! - `ledger_meta`: name → counter (entry sequence)
//!
//! ## Locking
//!
//! redb admits one write transaction at a time. A [`UnitOfWork`] is one write
//! transaction, so a wallet locked through it stays exclusive until the unit
//! ends. Units of work enter through a writer gate whose wait is bounded by the
//! lock timeout; a unit that cannot start in time fails with
//! [`StoreError::LockTimeout`] and writes nothing. Readers work on MVCC
//! snapshots and never wait for the writer.

use std::{path::Path, time::Duration};

use parking_lot::Mutex;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::records::{
    LedgerEntry, OwnerType, Transaction, TransactionId, User, UserId, Wallet, WalletId,
    SYSTEM_OWNER_ID,
};
use super::unit_of_work::UnitOfWork;

// =============================================================================
// Table Definitions
// =============================================================================

pub(super) const WALLETS: TableDefinition<u128, &[u8]> = TableDefinition::new("wallets");

/// Key format: `USER:<uuid>` or `SYSTEM:<uuid>`.
pub(super) const WALLET_OWNERS: TableDefinition<&str, u128> = TableDefinition::new("wallet_owners");

pub(super) const TRANSACTIONS: TableDefinition<u128, &[u8]> =
    TableDefinition::new("transactions");

pub(super) const LEDGER_ENTRIES: TableDefinition<u64, &[u8]> =
    TableDefinition::new("ledger_entries");

/// Key format: `wallet_uuid_bytes | sequence_be`. Balance is a range sum over it.
pub(super) const WALLET_LEDGER_INDEX: TableDefinition<&[u8], i64> =
    TableDefinition::new("wallet_ledger_index");

/// Key format: `transaction_uuid_bytes | sequence_be`.
pub(super) const TRANSACTION_LEDGER_INDEX: TableDefinition<&[u8], u64> =
    TableDefinition::new("transaction_ledger_index");

pub(super) const USERS: TableDefinition<u128, &[u8]> = TableDefinition::new("users");

pub(super) const USERNAMES: TableDefinition<&str, u128> = TableDefinition::new("usernames");

pub(super) const LEDGER_META: TableDefinition<&str, u64> = TableDefinition::new("ledger_meta");

pub(super) const ENTRY_SEQUENCE_KEY: &str = "ledger_entry_seq";

/// Default bound on the wait to start a unit of work.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    Conflict(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("balance of wallet {0} overflows i64")]
    BalanceOverflow(WalletId),

    #[error("timed out after {0:?} waiting for the ledger writer")]
    LockTimeout(Duration),
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Key Helpers
// =============================================================================

/// Build a composite index key: 16 UUID bytes followed by the big-endian sequence.
///
/// Big-endian sequences keep one owner's rows contiguous and in insertion order.
pub(super) fn index_key(owner: &Uuid, sequence: u64) -> [u8; 24] {
    let mut key = [0u8; 24];
    key[..16].copy_from_slice(owner.as_bytes());
    key[16..].copy_from_slice(&sequence.to_be_bytes());
    key
}

pub(super) fn owner_key(owner_type: OwnerType, owner_id: &Uuid) -> String {
    format!("{}:{}", owner_type.as_str(), owner_id)
}

// =============================================================================
// Shared Queries
//
// Generic over `ReadableTable` so the read path and the unit of work run the
// exact same code against snapshot and write-transaction tables.
// =============================================================================

pub(super) fn read_row<T: DeserializeOwned>(
    table: &impl ReadableTable<u128, &'static [u8]>,
    key: u128,
) -> StoreResult<Option<T>> {
    match table.get(key)? {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

/// Sum the signed amounts of every entry recorded against `wallet_id`.
///
/// A wallet without entries sums to zero.
pub(super) fn sum_wallet_entries(
    table: &impl ReadableTable<&'static [u8], i64>,
    wallet_id: &WalletId,
) -> StoreResult<i64> {
    let start = index_key(wallet_id.as_uuid(), 0);
    let end = index_key(wallet_id.as_uuid(), u64::MAX);

    let mut total: i64 = 0;
    for entry in table.range(start.as_slice()..=end.as_slice())? {
        let (_, amount) = entry?;
        total = total
            .checked_add(amount.value())
            .ok_or(StoreError::BalanceOverflow(*wallet_id))?;
    }
    Ok(total)
}

pub(super) fn lookup_owner(
    table: &impl ReadableTable<&'static str, u128>,
    owner_type: OwnerType,
    owner_id: &Uuid,
) -> StoreResult<Option<WalletId>> {
    let key = owner_key(owner_type, owner_id);
    let wallet_id = table.get(key.as_str())?.map(|v| WalletId::from_key(v.value()));
    Ok(wallet_id)
}

// =============================================================================
// LedgerDatabase
// =============================================================================

/// Embedded ACID ledger database.
pub struct LedgerDatabase {
    db: Database,
    /// Held for the whole life of a unit of work.
    writer: Mutex<()>,
    lock_timeout: Duration,
}

impl LedgerDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(WALLETS)?;
            let _ = write_txn.open_table(WALLET_OWNERS)?;
            let _ = write_txn.open_table(TRANSACTIONS)?;
            let _ = write_txn.open_table(LEDGER_ENTRIES)?;
            let _ = write_txn.open_table(WALLET_LEDGER_INDEX)?;
            let _ = write_txn.open_table(TRANSACTION_LEDGER_INDEX)?;
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USERNAMES)?;
            let _ = write_txn.open_table(LEDGER_META)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db,
            writer: Mutex::new(()),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        })
    }

    /// Replace the bound on the wait to start a unit of work.
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    // =========================================================================
    // Unit of Work
    // =========================================================================

    /// Run `f` inside one atomic write transaction.
    ///
    /// Commits when `f` returns `Ok`; rolls back every write made through the
    /// unit when it returns `Err`. Waits at most the lock timeout while another
    /// unit of work is open, then fails with [`StoreError::LockTimeout`]
    /// without calling `f`.
    pub fn run_in_unit_of_work<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut UnitOfWork<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let _writer = self.writer.try_lock_for(self.lock_timeout).ok_or_else(|| {
            tracing::warn!(timeout = ?self.lock_timeout, "Timed out waiting to start unit of work");
            StoreError::LockTimeout(self.lock_timeout)
        })?;

        let write_txn = self.db.begin_write().map_err(StoreError::from)?;
        let outcome = {
            let mut unit = UnitOfWork::new(&write_txn);
            f(&mut unit)
        };

        match outcome {
            Ok(value) => {
                write_txn.commit().map_err(StoreError::from)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(abort_err) = write_txn.abort() {
                    tracing::error!(error = %abort_err, "Failed to abort unit of work");
                }
                Err(e)
            }
        }
    }

    // =========================================================================
    // System wallet
    // =========================================================================

    /// Create the singleton system wallet if missing, otherwise return it.
    pub fn provision_system_wallet(&self, asset_code: &str) -> StoreResult<Wallet> {
        self.run_in_unit_of_work(|unit| match unit.system_wallet()? {
            Some(wallet) => Ok(wallet),
            None => unit.create_wallet(OwnerType::System, &SYSTEM_OWNER_ID, asset_code),
        })
    }

    /// Resolve the singleton system wallet.
    pub fn get_system_wallet(&self) -> StoreResult<WalletId> {
        let read_txn = self.db.begin_read()?;
        let owners = read_txn.open_table(WALLET_OWNERS)?;
        lookup_owner(&owners, OwnerType::System, &SYSTEM_OWNER_ID)?.ok_or_else(|| {
            StoreError::Configuration("system wallet has not been provisioned".to_string())
        })
    }

    // =========================================================================
    // Wallet lookups
    // =========================================================================

    pub fn wallet(&self, wallet_id: &WalletId) -> StoreResult<Wallet> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(WALLETS)?;
        read_row(&table, wallet_id.as_key())?
            .ok_or_else(|| StoreError::NotFound(format!("Wallet {wallet_id}")))
    }

    /// Wallet owned by a user.
    pub fn wallet_for_owner(&self, owner_id: &UserId) -> StoreResult<Wallet> {
        let read_txn = self.db.begin_read()?;
        let owners = read_txn.open_table(WALLET_OWNERS)?;
        let wallet_id = lookup_owner(&owners, OwnerType::User, owner_id.as_uuid())?
            .ok_or_else(|| StoreError::NotFound(format!("Wallet for owner {owner_id}")))?;

        let table = read_txn.open_table(WALLETS)?;
        read_row(&table, wallet_id.as_key())?
            .ok_or_else(|| StoreError::NotFound(format!("Wallet {wallet_id}")))
    }

    // =========================================================================
    // Transactions and entries
    // =========================================================================

    /// Look up a transaction by its caller-supplied id.
    pub fn get_transaction_by_id(&self, id: &TransactionId) -> StoreResult<Transaction> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TRANSACTIONS)?;
        read_row(&table, id.as_key())?
            .ok_or_else(|| StoreError::NotFound(format!("Transaction {id}")))
    }

    pub fn transaction_exists(&self, id: &TransactionId) -> StoreResult<bool> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TRANSACTIONS)?;
        let exists = table.get(id.as_key())?.is_some();
        Ok(exists)
    }

    /// All entries written for a transaction, in insertion order.
    pub fn entries_for_transaction(&self, id: &TransactionId) -> StoreResult<Vec<LedgerEntry>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(TRANSACTION_LEDGER_INDEX)?;
        let entries = read_txn.open_table(LEDGER_ENTRIES)?;

        let start = index_key(id.as_uuid(), 0);
        let end = index_key(id.as_uuid(), u64::MAX);

        let mut results = Vec::new();
        for item in index.range(start.as_slice()..=end.as_slice())? {
            let (_, sequence) = item?;
            if let Some(value) = entries.get(sequence.value())? {
                results.push(serde_json::from_slice(value.value())?);
            }
        }
        Ok(results)
    }

    /// Balance of a wallet: the sum of its ledger entries, zero when it has none.
    pub fn get_balance(&self, wallet_id: &WalletId) -> StoreResult<i64> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(WALLET_LEDGER_INDEX)?;
        sum_wallet_entries(&index, wallet_id)
    }

    // =========================================================================
    // Users
    // =========================================================================

    pub fn user(&self, id: &UserId) -> StoreResult<User> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        read_row(&table, id.as_key())?.ok_or_else(|| StoreError::NotFound(format!("User {id}")))
    }

    pub fn user_by_username(&self, username: &str) -> StoreResult<User> {
        let read_txn = self.db.begin_read()?;
        let names = read_txn.open_table(USERNAMES)?;
        let user_id = names
            .get(username)?
            .map(|v| UserId::from_key(v.value()))
            .ok_or_else(|| StoreError::NotFound(format!("User {username}")))?;

        let table = read_txn.open_table(USERS)?;
        read_row(&table, user_id.as_key())?
            .ok_or_else(|| StoreError::NotFound(format!("User {user_id}")))
    }

    // =========================================================================
    // Health
    // =========================================================================

    /// Open a read snapshot and touch the meta table.
    pub fn health_check(&self) -> StoreResult<()> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(LEDGER_META)?;
        let _ = table.get(ENTRY_SEQUENCE_KEY)?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::TransactionType;

    fn temp_db() -> (LedgerDatabase, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = LedgerDatabase::open(&dir.path().join("test.redb")).unwrap();
        (db, dir)
    }

    fn user_wallet(db: &LedgerDatabase) -> (UserId, WalletId) {
        let owner = UserId::new_v4();
        let wallet = db
            .run_in_unit_of_work(|unit| unit.create_wallet(OwnerType::User, owner.as_uuid(), "UC"))
            .unwrap();
        (owner, wallet.id)
    }

    #[test]
    fn system_wallet_missing_is_a_configuration_error() {
        let (db, _dir) = temp_db();
        let err = db.get_system_wallet().unwrap_err();
        assert!(matches!(err, StoreError::Configuration(_)));
    }

    #[test]
    fn provision_system_wallet_is_idempotent() {
        let (db, _dir) = temp_db();
        let one = db.provision_system_wallet("UC").unwrap();
        let two = db.provision_system_wallet("UC").unwrap();

        assert_eq!(one.id, two.id);
        assert_eq!(one.owner_type, OwnerType::System);
        assert_eq!(db.get_system_wallet().unwrap(), one.id);
    }

    #[test]
    fn balance_is_the_sum_of_entries() {
        let (db, _dir) = temp_db();
        let (_, wallet) = user_wallet(&db);

        for amount in [100, -30, 5] {
            db.run_in_unit_of_work(|unit| {
                let txn = unit.create_transaction(TransactionId::new_v4(), TransactionType::TopUp)?;
                unit.create_ledger_entry(&txn.id, &wallet, amount)
            })
            .unwrap();
        }

        assert_eq!(db.get_balance(&wallet).unwrap(), 75);
    }

    #[test]
    fn balance_of_wallet_without_entries_is_zero() {
        let (db, _dir) = temp_db();
        let (_, wallet) = user_wallet(&db);
        assert_eq!(db.get_balance(&wallet).unwrap(), 0);
        // Unknown wallets have no entries either
        assert_eq!(db.get_balance(&WalletId::new_v4()).unwrap(), 0);
    }

    #[test]
    fn balances_do_not_leak_between_wallets() {
        let (db, _dir) = temp_db();
        let (_, a) = user_wallet(&db);
        let (_, b) = user_wallet(&db);

        db.run_in_unit_of_work(|unit| {
            let txn = unit.create_transaction(TransactionId::new_v4(), TransactionType::TopUp)?;
            unit.create_ledger_entry(&txn.id, &a, 40)?;
            unit.create_ledger_entry(&txn.id, &b, -40)
        })
        .unwrap();

        assert_eq!(db.get_balance(&a).unwrap(), 40);
        assert_eq!(db.get_balance(&b).unwrap(), -40);
    }

    #[test]
    fn duplicate_transaction_id_conflicts() {
        let (db, _dir) = temp_db();
        let id = TransactionId::new_v4();

        db.run_in_unit_of_work(|unit| unit.create_transaction(id, TransactionType::TopUp))
            .unwrap();
        let err = db
            .run_in_unit_of_work(|unit| unit.create_transaction(id, TransactionType::Spend))
            .unwrap_err();

        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(db.get_transaction_by_id(&id).unwrap().kind, TransactionType::TopUp);
    }

    #[test]
    fn failed_unit_of_work_rolls_back_every_write() {
        let (db, _dir) = temp_db();
        let (_, wallet) = user_wallet(&db);
        let id = TransactionId::new_v4();

        let result: StoreResult<()> = db.run_in_unit_of_work(|unit| {
            let txn = unit.create_transaction(id, TransactionType::TopUp)?;
            unit.create_ledger_entry(&txn.id, &wallet, 50)?;
            Err(StoreError::Configuration("forced failure".to_string()))
        });

        assert!(result.is_err());
        assert!(!db.transaction_exists(&id).unwrap());
        assert!(db.entries_for_transaction(&id).unwrap().is_empty());
        assert_eq!(db.get_balance(&wallet).unwrap(), 0);
    }

    #[test]
    fn get_transaction_by_id_reports_not_found() {
        let (db, _dir) = temp_db();
        let err = db.get_transaction_by_id(&TransactionId::new_v4()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn entries_for_transaction_preserves_insertion_order() {
        let (db, _dir) = temp_db();
        let (_, a) = user_wallet(&db);
        let (_, b) = user_wallet(&db);
        let id = TransactionId::new_v4();

        db.run_in_unit_of_work(|unit| {
            unit.create_transaction(id, TransactionType::Spend)?;
            unit.create_ledger_entry(&id, &a, -7)?;
            unit.create_ledger_entry(&id, &b, 7)
        })
        .unwrap();

        let entries = db.entries_for_transaction(&id).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!((entries[0].wallet_id, entries[0].amount), (a, -7));
        assert_eq!((entries[1].wallet_id, entries[1].amount), (b, 7));
        assert!(entries[0].id < entries[1].id);
    }

    #[test]
    fn wallet_for_owner_resolves_user_wallets_only() {
        let (db, _dir) = temp_db();
        let (owner, wallet) = user_wallet(&db);
        assert_eq!(db.wallet_for_owner(&owner).unwrap().id, wallet);
        assert_eq!(db.wallet(&wallet).unwrap().owner_id, *owner.as_uuid());

        let err = db.wallet_for_owner(&UserId::new_v4()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn health_check_passes_on_open_database() {
        let (db, _dir) = temp_db();
        assert!(db.health_check().is_ok());
    }

    #[test]
    fn unit_of_work_gives_up_after_lock_timeout() {
        use std::sync::{mpsc, Arc};
        use std::thread;

        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(
            LedgerDatabase::open(&dir.path().join("timeout.redb"))
                .unwrap()
                .with_lock_timeout(Duration::from_millis(50)),
        );
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let holder = {
            let db = db.clone();
            thread::spawn(move || {
                db.run_in_unit_of_work(|_unit| {
                    entered_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    Ok::<_, StoreError>(())
                })
            })
        };
        entered_rx.recv().unwrap();

        let id = TransactionId::new_v4();
        let err = db
            .run_in_unit_of_work(|unit| unit.create_transaction(id, TransactionType::TopUp))
            .unwrap_err();
        assert!(matches!(err, StoreError::LockTimeout(t) if t == Duration::from_millis(50)));

        release_tx.send(()).unwrap();
        holder.join().unwrap().unwrap();

        assert!(!db.transaction_exists(&id).unwrap());
        // The gate is free again once the holder commits
        db.run_in_unit_of_work(|unit| unit.create_transaction(id, TransactionType::TopUp))
            .unwrap();
        assert!(db.transaction_exists(&id).unwrap());
    }

    #[test]
    fn index_key_orders_by_owner_then_sequence() {
        let owner = Uuid::new_v4();
        assert!(index_key(&owner, 1) < index_key(&owner, 2));
        assert!(index_key(&owner, 255) < index_key(&owner, 256));
    }
}
