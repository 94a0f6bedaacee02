// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet issuance with the signup bonus.
//!
//! The bonus is a single credit entry on the new wallet with no system-side
//! debit, so BONUS transactions do not sum to zero.

use tracing::info;

use crate::storage::{OwnerType, TransactionId, TransactionType, UnitOfWork, UserId, Wallet};

use super::{BalanceResolver, LedgerError, TransferEngine};

/// A freshly created user wallet.
#[derive(Debug, Clone)]
pub struct OpenedWallet {
    pub wallet: Wallet,
    /// Set when a bonus was credited.
    pub bonus_transaction: Option<TransactionId>,
    pub balance: i64,
}

impl TransferEngine {
    /// Create the user's wallet and credit the configured bonus inside `unit`.
    ///
    /// Callers pass their own unit so the wallet commits together with
    /// whatever else they write (the user row, at signup).
    pub fn open_user_wallet(
        &self,
        unit: &mut UnitOfWork<'_>,
        user_id: &UserId,
    ) -> Result<OpenedWallet, LedgerError> {
        let wallet = unit.create_wallet(OwnerType::User, user_id.as_uuid(), &self.config.asset_code)?;

        let bonus_transaction = if self.config.signup_bonus > 0 {
            let txn = unit.create_transaction(TransactionId::new_v4(), TransactionType::Bonus)?;
            unit.create_ledger_entry(&txn.id, &wallet.id, self.config.signup_bonus)?;
            Some(txn.id)
        } else {
            None
        };

        let balance = BalanceResolver::within(unit, &wallet.id)?;
        Ok(OpenedWallet {
            wallet,
            bonus_transaction,
            balance,
        })
    }

    /// [`Self::open_user_wallet`] in a unit of work of its own.
    pub fn issue_signup_wallet(&self, user_id: &UserId) -> Result<OpenedWallet, LedgerError> {
        let opened = self
            .db
            .run_in_unit_of_work(|unit| self.open_user_wallet(unit, user_id))?;
        info!(
            user_id = %user_id,
            wallet_id = %opened.wallet.id,
            bonus = self.config.signup_bonus,
            "Wallet issued"
        );
        Ok(opened)
    }
}
