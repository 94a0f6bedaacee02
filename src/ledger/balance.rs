// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Balance resolution: a wallet's balance is the `i64` sum of its entries.

use std::sync::Arc;

use crate::storage::{LedgerDatabase, UnitOfWork, WalletId};

use super::LedgerError;

#[derive(Clone)]
pub struct BalanceResolver {
    db: Arc<LedgerDatabase>,
}

impl BalanceResolver {
    pub fn new(db: Arc<LedgerDatabase>) -> Self {
        Self { db }
    }

    /// Point-in-time balance from a committed snapshot. Takes no lock.
    pub fn current(&self, wallet_id: &WalletId) -> Result<i64, LedgerError> {
        self.db.get_balance(wallet_id).map_err(|e| {
            tracing::error!(wallet_id = %wallet_id, error = %e, "Failed to get balance for wallet");
            LedgerError::BalanceRetrievalFailed(e)
        })
    }

    /// Balance as seen inside an open unit of work, uncommitted entries included.
    pub fn within(unit: &UnitOfWork<'_>, wallet_id: &WalletId) -> Result<i64, LedgerError> {
        Ok(unit.get_balance(wallet_id)?)
    }
}
