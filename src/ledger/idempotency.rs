// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Idempotency guard keyed on the caller-supplied transaction id.
//!
//! The read-only [`IdempotencyGuard::check`] runs before any unit of work is
//! opened and answers most retries without touching the writer. It is not
//! atomic with the write that follows: two identical requests can both pass
//! it. The unique transaction id enforced by
//! [`UnitOfWork::create_transaction`] is what actually prevents a second
//! application, and [`IdempotencyGuard::seen_within`] repeats the probe under
//! the write transaction.

use std::sync::Arc;

use crate::storage::{LedgerDatabase, TransactionId, UnitOfWork, WalletId};

use super::{BalanceResolver, LedgerError};

/// Result of the pre-write probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdempotencyCheck {
    /// Unknown id; the operation should run.
    Fresh,
    /// Id already committed; reply with the wallet's current balance.
    AlreadyProcessed { balance: i64 },
}

#[derive(Clone)]
pub struct IdempotencyGuard {
    db: Arc<LedgerDatabase>,
    balances: BalanceResolver,
}

impl IdempotencyGuard {
    pub fn new(db: Arc<LedgerDatabase>) -> Self {
        let balances = BalanceResolver::new(db.clone());
        Self { db, balances }
    }

    /// Probe for `txn_id`; when it exists, read the balance of `wallet_id`.
    ///
    /// A failed probe counts as `Fresh`: the unit of work re-checks under the
    /// write lock, so nothing is applied twice either way.
    pub fn check(
        &self,
        txn_id: &TransactionId,
        wallet_id: &WalletId,
    ) -> Result<IdempotencyCheck, LedgerError> {
        match self.db.transaction_exists(txn_id) {
            Ok(true) => {
                let balance = self.balances.current(wallet_id)?;
                Ok(IdempotencyCheck::AlreadyProcessed { balance })
            }
            Ok(false) => Ok(IdempotencyCheck::Fresh),
            Err(e) => {
                tracing::warn!(txn_id = %txn_id, error = %e, "Idempotency probe failed");
                Ok(IdempotencyCheck::Fresh)
            }
        }
    }

    /// Repeat the existence probe inside an open unit of work.
    pub fn seen_within(unit: &UnitOfWork<'_>, txn_id: &TransactionId) -> Result<bool, LedgerError> {
        Ok(unit.transaction_exists(txn_id)?)
    }
}
