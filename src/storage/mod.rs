// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Ledger Storage Module
//!
//! Durable, transactional storage for wallets, transactions, ledger entries
//! and users, kept in a single redb file.
//!
//! ## Storage Layout
//!
//! ```text
//! $DATA_DIR/
//!   ledger.redb     # All tables (see ledger_db.rs)
//! ```
//!
//! ## Important Notes
//!
//! - Ledger entries are append-only; nothing here updates or deletes them
//! - Balances are never stored, only summed from `wallet_ledger_index`
//! - Writes happen exclusively through a [`UnitOfWork`]

pub mod ledger_db;
pub mod records;
pub mod unit_of_work;

pub use ledger_db::{LedgerDatabase, StoreError, StoreResult, DEFAULT_LOCK_TIMEOUT};
pub use records::{
    LedgerEntry, OwnerType, Transaction, TransactionId, TransactionType, User, UserId, Wallet,
    WalletId, SYSTEM_OWNER_ID,
};
pub use unit_of_work::UnitOfWork;

/// File name of the ledger database inside the data directory.
pub const LEDGER_DB_FILE: &str = "ledger.redb";
