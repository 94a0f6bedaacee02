// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Store handle bound to one open write transaction.

use chrono::Utc;
use redb::{ReadableTable, WriteTransaction};
use uuid::Uuid;

use super::ledger_db::{
    index_key, lookup_owner, owner_key, read_row, sum_wallet_entries, StoreError, StoreResult,
    ENTRY_SEQUENCE_KEY, LEDGER_ENTRIES, LEDGER_META, TRANSACTIONS, TRANSACTION_LEDGER_INDEX,
    USERNAMES, USERS, WALLETS, WALLET_LEDGER_INDEX, WALLET_OWNERS,
};
use super::records::{
    LedgerEntry, OwnerType, Transaction, TransactionId, TransactionType, User, UserId, Wallet,
    WalletId, SYSTEM_OWNER_ID,
};

/// Handle passed to the closure of [`LedgerDatabase::run_in_unit_of_work`].
///
/// Every write goes through the enclosing transaction and becomes visible only
/// on commit.
///
/// [`LedgerDatabase::run_in_unit_of_work`]: super::LedgerDatabase::run_in_unit_of_work
pub struct UnitOfWork<'txn> {
    txn: &'txn WriteTransaction,
}

impl<'txn> UnitOfWork<'txn> {
    pub(super) fn new(txn: &'txn WriteTransaction) -> Self {
        Self { txn }
    }

    // =========================================================================
    // Wallets
    // =========================================================================

    /// Resolve the wallet owned by `owner_id` and hold it for the rest of the unit.
    ///
    /// The hold is the write transaction itself, released on commit or rollback.
    pub fn lock_wallet(&mut self, owner_id: &UserId) -> StoreResult<WalletId> {
        let owners = self.txn.open_table(WALLET_OWNERS)?;
        lookup_owner(&owners, OwnerType::User, owner_id.as_uuid())?
            .ok_or_else(|| StoreError::NotFound(format!("Wallet for owner {owner_id}")))
    }

    pub(super) fn system_wallet(&self) -> StoreResult<Option<Wallet>> {
        let owners = self.txn.open_table(WALLET_OWNERS)?;
        match lookup_owner(&owners, OwnerType::System, &SYSTEM_OWNER_ID)? {
            Some(id) => {
                let wallets = self.txn.open_table(WALLETS)?;
                read_row(&wallets, id.as_key())
            }
            None => Ok(None),
        }
    }

    /// Create a wallet. Each owner holds at most one wallet.
    pub fn create_wallet(
        &mut self,
        owner_type: OwnerType,
        owner_id: &Uuid,
        asset_code: &str,
    ) -> StoreResult<Wallet> {
        let mut owners = self.txn.open_table(WALLET_OWNERS)?;
        if lookup_owner(&owners, owner_type, owner_id)?.is_some() {
            return Err(StoreError::Conflict(format!(
                "Wallet for {} owner {owner_id}",
                owner_type.as_str()
            )));
        }

        let wallet = Wallet {
            id: WalletId::new_v4(),
            owner_type,
            owner_id: *owner_id,
            asset_code: asset_code.to_string(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_vec(&wallet)?;

        let mut wallets = self.txn.open_table(WALLETS)?;
        wallets.insert(wallet.id.as_key(), json.as_slice())?;
        owners.insert(owner_key(owner_type, owner_id).as_str(), wallet.id.as_key())?;

        Ok(wallet)
    }

    // =========================================================================
    // Transactions and entries
    // =========================================================================

    /// Insert a transaction row. The id is unique; a repeat is a `Conflict`.
    pub fn create_transaction(
        &mut self,
        id: TransactionId,
        kind: TransactionType,
    ) -> StoreResult<Transaction> {
        let mut table = self.txn.open_table(TRANSACTIONS)?;
        if table.get(id.as_key())?.is_some() {
            return Err(StoreError::Conflict(format!("Transaction {id}")));
        }

        let transaction = Transaction {
            id,
            kind,
            created_at: Utc::now(),
        };
        let json = serde_json::to_vec(&transaction)?;
        table.insert(id.as_key(), json.as_slice())?;

        Ok(transaction)
    }

    pub fn transaction_exists(&self, id: &TransactionId) -> StoreResult<bool> {
        let table = self.txn.open_table(TRANSACTIONS)?;
        let exists = table.get(id.as_key())?.is_some();
        Ok(exists)
    }

    /// Append one signed entry against a wallet.
    pub fn create_ledger_entry(
        &mut self,
        transaction_id: &TransactionId,
        wallet_id: &WalletId,
        amount: i64,
    ) -> StoreResult<LedgerEntry> {
        {
            let wallets = self.txn.open_table(WALLETS)?;
            if wallets.get(wallet_id.as_key())?.is_none() {
                return Err(StoreError::NotFound(format!("Wallet {wallet_id}")));
            }
        }

        let entry = LedgerEntry {
            id: self.next_entry_sequence()?,
            transaction_id: *transaction_id,
            wallet_id: *wallet_id,
            amount,
        };
        let json = serde_json::to_vec(&entry)?;

        let mut entries = self.txn.open_table(LEDGER_ENTRIES)?;
        entries.insert(entry.id, json.as_slice())?;

        let mut by_wallet = self.txn.open_table(WALLET_LEDGER_INDEX)?;
        let wallet_key = index_key(wallet_id.as_uuid(), entry.id);
        by_wallet.insert(wallet_key.as_slice(), amount)?;

        let mut by_transaction = self.txn.open_table(TRANSACTION_LEDGER_INDEX)?;
        let transaction_key = index_key(transaction_id.as_uuid(), entry.id);
        by_transaction.insert(transaction_key.as_slice(), entry.id)?;

        Ok(entry)
    }

    /// Balance as seen by this unit, including its own uncommitted entries.
    pub fn get_balance(&self, wallet_id: &WalletId) -> StoreResult<i64> {
        let index = self.txn.open_table(WALLET_LEDGER_INDEX)?;
        sum_wallet_entries(&index, wallet_id)
    }

    fn next_entry_sequence(&mut self) -> StoreResult<u64> {
        let mut meta = self.txn.open_table(LEDGER_META)?;
        let current = meta.get(ENTRY_SEQUENCE_KEY)?.map(|v| v.value()).unwrap_or(0);
        let next = current + 1;
        meta.insert(ENTRY_SEQUENCE_KEY, next)?;
        Ok(next)
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Register a user. Usernames are unique.
    pub fn create_user(&mut self, username: &str, password_hash: &str) -> StoreResult<User> {
        let mut names = self.txn.open_table(USERNAMES)?;
        if names.get(username)?.is_some() {
            return Err(StoreError::Conflict(format!("User {username}")));
        }

        let user = User {
            id: UserId::new_v4(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_vec(&user)?;

        let mut users = self.txn.open_table(USERS)?;
        users.insert(user.id.as_key(), json.as_slice())?;
        names.insert(username, user.id.as_key())?;

        Ok(user)
    }
}
