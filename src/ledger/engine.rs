// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transfer engine: top-ups and spends as atomic, idempotent double-entry writes.
//!
//! A top-up credits the user wallet and debits the system wallet by the same
//! amount; a spend does the reverse. Both entries, the transaction row and the
//! balance read-back happen in one unit of work, after the user's wallet has
//! been locked. For spends the funds check runs under that same lock, so two
//! concurrent spends can never both observe the same sufficient balance.
//!
//! Calls are blocking. Async callers should run them on a blocking thread;
//! once started, a unit of work runs to commit or rollback even if the caller
//! goes away.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::storage::{
    LedgerDatabase, StoreError, TransactionId, TransactionType, UnitOfWork, UserId, WalletId,
};

use super::{BalanceResolver, IdempotencyCheck, IdempotencyGuard, LedgerError};

/// Message returned when the transaction id was seen before.
pub const ALREADY_PROCESSED: &str = "already processed";
pub const TOPUP_SUCCESSFUL: &str = "topup successful";
pub const SPEND_SUCCESSFUL: &str = "spend successful";

/// Default signup bonus, in the smallest currency unit.
pub const DEFAULT_SIGNUP_BONUS: i64 = 100;
/// Default asset code stamped on new wallets.
pub const DEFAULT_ASSET_CODE: &str = "UC";

/// Engine tunables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Credited to every new user wallet. Zero disables the bonus.
    pub signup_bonus: i64,
    pub asset_code: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            signup_bonus: DEFAULT_SIGNUP_BONUS,
            asset_code: DEFAULT_ASSET_CODE.to_string(),
        }
    }
}

/// Response of a top-up or spend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub message: &'static str,
    pub balance: i64,
    /// True when nothing was written because the id had been processed before.
    pub already_processed: bool,
}

impl TransferOutcome {
    fn replayed(balance: i64) -> Self {
        Self {
            message: ALREADY_PROCESSED,
            balance,
            already_processed: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Transfer {
    TopUp,
    Spend,
}

impl Transfer {
    fn kind(self) -> TransactionType {
        match self {
            Transfer::TopUp => TransactionType::TopUp,
            Transfer::Spend => TransactionType::Spend,
        }
    }

    /// Signed amount applied to the user wallet; the system wallet gets the negation.
    fn user_delta(self, amount: i64) -> i64 {
        match self {
            Transfer::TopUp => amount,
            Transfer::Spend => -amount,
        }
    }

    fn success_message(self) -> &'static str {
        match self {
            Transfer::TopUp => TOPUP_SUCCESSFUL,
            Transfer::Spend => SPEND_SUCCESSFUL,
        }
    }
}

/// Orchestrates ledger writes against a user wallet and the system counterparty.
pub struct TransferEngine {
    pub(super) db: Arc<LedgerDatabase>,
    pub(super) system_wallet: WalletId,
    pub(super) config: EngineConfig,
    balances: BalanceResolver,
    guard: IdempotencyGuard,
}

impl TransferEngine {
    /// Build an engine, resolving the system wallet once.
    ///
    /// Fails with [`LedgerError::Configuration`] when the system wallet has not
    /// been provisioned.
    pub fn new(db: Arc<LedgerDatabase>, config: EngineConfig) -> Result<Self, LedgerError> {
        let system_wallet = db.get_system_wallet()?;
        Ok(Self::with_system_wallet(db, system_wallet, config))
    }

    pub fn with_system_wallet(
        db: Arc<LedgerDatabase>,
        system_wallet: WalletId,
        config: EngineConfig,
    ) -> Self {
        Self {
            balances: BalanceResolver::new(db.clone()),
            guard: IdempotencyGuard::new(db.clone()),
            db,
            system_wallet,
            config,
        }
    }

    pub fn system_wallet(&self) -> WalletId {
        self.system_wallet
    }

    /// Credit `amount` to the user's wallet, debiting the system wallet.
    pub fn top_up(
        &self,
        user_id: &UserId,
        wallet_id: &WalletId,
        txn_id: TransactionId,
        amount: i64,
    ) -> Result<TransferOutcome, LedgerError> {
        self.transfer(Transfer::TopUp, user_id, wallet_id, txn_id, amount)
    }

    /// Debit `amount` from the user's wallet, crediting the system wallet.
    ///
    /// Fails with [`LedgerError::InsufficientBalance`] without writing anything
    /// when the locked balance is below `amount`.
    pub fn spend(
        &self,
        user_id: &UserId,
        wallet_id: &WalletId,
        txn_id: TransactionId,
        amount: i64,
    ) -> Result<TransferOutcome, LedgerError> {
        self.transfer(Transfer::Spend, user_id, wallet_id, txn_id, amount)
    }

    /// Read-only balance; no lock is taken.
    pub fn get_balance(&self, user_id: &UserId, wallet_id: &WalletId) -> Result<i64, LedgerError> {
        debug!(user_id = %user_id, wallet_id = %wallet_id, "Reading wallet balance");
        self.balances.current(wallet_id)
    }

    fn transfer(
        &self,
        transfer: Transfer,
        user_id: &UserId,
        wallet_id: &WalletId,
        txn_id: TransactionId,
        amount: i64,
    ) -> Result<TransferOutcome, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        if let IdempotencyCheck::AlreadyProcessed { balance } = self.guard.check(&txn_id, wallet_id)? {
            debug!(txn_id = %txn_id, wallet_id = %wallet_id, "Transaction with id already exists");
            return Ok(TransferOutcome::replayed(balance));
        }

        let result = self
            .db
            .run_in_unit_of_work(|unit| self.apply(unit, transfer, user_id, wallet_id, txn_id, amount));

        match result {
            Ok(balance) => {
                info!(
                    kind = %transfer.kind(),
                    user_id = %user_id,
                    wallet_id = %wallet_id,
                    txn_id = %txn_id,
                    amount,
                    balance,
                    "Transfer applied"
                );
                Ok(TransferOutcome {
                    message: transfer.success_message(),
                    balance,
                    already_processed: false,
                })
            }
            Err(LedgerError::Conflict(id)) => {
                // Lost the race against an identical request; it has committed.
                debug!(txn_id = %id, "Transaction committed concurrently, replaying");
                let balance = self.balances.current(wallet_id)?;
                Ok(TransferOutcome::replayed(balance))
            }
            Err(e @ (LedgerError::InsufficientBalance { .. } | LedgerError::BalanceOverflow { .. })) => {
                warn!(
                    kind = %transfer.kind(),
                    txn_id = %txn_id,
                    wallet_id = %wallet_id,
                    reason = %e,
                    "Transfer rejected by balance check"
                );
                Err(e)
            }
            Err(e) if e.is_caller_error() => {
                warn!(txn_id = %txn_id, user_id = %user_id, reason = %e, "Transfer rejected");
                Err(e)
            }
            Err(e) => {
                error!(txn_id = %txn_id, wallet_id = %wallet_id, error = %e, "Transaction failed");
                Err(e)
            }
        }
    }

    /// Body of the unit of work. Any `Err` rolls back everything written here.
    fn apply(
        &self,
        unit: &mut UnitOfWork<'_>,
        transfer: Transfer,
        user_id: &UserId,
        wallet_id: &WalletId,
        txn_id: TransactionId,
        amount: i64,
    ) -> Result<i64, LedgerError> {
        let locked = unit.lock_wallet(user_id)?;
        if locked != *wallet_id {
            return Err(LedgerError::NotFound(format!(
                "Wallet {wallet_id} for user {user_id}"
            )));
        }

        if IdempotencyGuard::seen_within(unit, &txn_id)? {
            return Err(LedgerError::Conflict(txn_id));
        }

        let current = BalanceResolver::within(unit, &locked)?;
        match transfer {
            Transfer::Spend if current < amount => {
                return Err(LedgerError::InsufficientBalance {
                    available: current,
                    requested: amount,
                });
            }
            Transfer::TopUp if current.checked_add(amount).is_none() => {
                return Err(LedgerError::BalanceOverflow {
                    balance: current,
                    amount,
                });
            }
            _ => {}
        }

        let transaction = unit
            .create_transaction(txn_id, transfer.kind())
            .map_err(|e| match e {
                StoreError::Conflict(_) => LedgerError::Conflict(txn_id),
                other => other.into(),
            })?;

        let delta = transfer.user_delta(amount);
        unit.create_ledger_entry(&transaction.id, &locked, delta)?;
        unit.create_ledger_entry(&transaction.id, &self.system_wallet, -delta)?;

        BalanceResolver::within(unit, &locked)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::{OwnerType, WalletId};
    use std::thread;

    pub(crate) struct Fixture {
        pub db: Arc<LedgerDatabase>,
        pub engine: Arc<TransferEngine>,
        _dir: tempfile::TempDir,
    }

    pub(crate) fn fixture_with_bonus(signup_bonus: i64) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(LedgerDatabase::open(&dir.path().join("engine.redb")).unwrap());
        db.provision_system_wallet(DEFAULT_ASSET_CODE).unwrap();
        let config = EngineConfig {
            signup_bonus,
            ..EngineConfig::default()
        };
        let engine = Arc::new(TransferEngine::new(db.clone(), config).unwrap());
        Fixture {
            db,
            engine,
            _dir: dir,
        }
    }

    fn new_user(fx: &Fixture) -> (UserId, WalletId) {
        let user = UserId::new_v4();
        let opened = fx.engine.issue_signup_wallet(&user).unwrap();
        (user, opened.wallet.id)
    }

    fn entry_sum(fx: &Fixture, txn: &TransactionId) -> i64 {
        fx.db
            .entries_for_transaction(txn)
            .unwrap()
            .iter()
            .map(|e| e.amount)
            .sum()
    }

    #[test]
    fn engine_requires_a_provisioned_system_wallet() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(LedgerDatabase::open(&dir.path().join("bare.redb")).unwrap());
        let err = TransferEngine::new(db, EngineConfig::default()).err().unwrap();
        assert!(matches!(err, LedgerError::Configuration(_)));
    }

    #[test]
    fn bonus_then_spend() {
        let fx = fixture_with_bonus(100);
        let (user, wallet) = new_user(&fx);
        let txn = TransactionId::new_v4();

        let outcome = fx.engine.spend(&user, &wallet, txn, 40).unwrap();
        assert_eq!(outcome.message, SPEND_SUCCESSFUL);
        assert_eq!(outcome.balance, 60);
        assert_eq!(fx.engine.get_balance(&user, &wallet).unwrap(), 60);

        let entries = fx.db.entries_for_transaction(&txn).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!((entries[0].wallet_id, entries[0].amount), (wallet, -40));
        assert_eq!(
            (entries[1].wallet_id, entries[1].amount),
            (fx.engine.system_wallet(), 40)
        );
        assert_eq!(fx.db.get_transaction_by_id(&txn).unwrap().kind, TransactionType::Spend);
    }

    #[test]
    fn insufficient_funds_writes_nothing() {
        let fx = fixture_with_bonus(10);
        let (user, wallet) = new_user(&fx);
        let txn = TransactionId::new_v4();

        let err = fx.engine.spend(&user, &wallet, txn, 50).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientBalance {
                available: 10,
                requested: 50
            }
        ));
        assert!(!fx.db.transaction_exists(&txn).unwrap());
        assert!(fx.db.entries_for_transaction(&txn).unwrap().is_empty());
        assert_eq!(fx.engine.get_balance(&user, &wallet).unwrap(), 10);
        assert_eq!(fx.db.get_balance(&fx.engine.system_wallet()).unwrap(), 0);
    }

    #[test]
    fn rejected_spend_id_can_be_retried_once_funded() {
        let fx = fixture_with_bonus(10);
        let (user, wallet) = new_user(&fx);
        let txn = TransactionId::new_v4();

        assert!(fx.engine.spend(&user, &wallet, txn, 30).is_err());
        fx.engine.top_up(&user, &wallet, TransactionId::new_v4(), 25).unwrap();

        let outcome = fx.engine.spend(&user, &wallet, txn, 30).unwrap();
        assert!(!outcome.already_processed);
        assert_eq!(outcome.balance, 5);
    }

    #[test]
    fn duplicate_top_up_is_applied_once() {
        let fx = fixture_with_bonus(100);
        let (user, wallet) = new_user(&fx);
        let txn = TransactionId::new_v4();

        let first = fx.engine.top_up(&user, &wallet, txn, 20).unwrap();
        assert_eq!(first.message, TOPUP_SUCCESSFUL);
        assert_eq!(first.balance, 120);

        let second = fx.engine.top_up(&user, &wallet, txn, 20).unwrap();
        assert_eq!(second.message, ALREADY_PROCESSED);
        assert!(second.already_processed);
        assert_eq!(second.balance, 120);

        assert_eq!(fx.db.entries_for_transaction(&txn).unwrap().len(), 2);
        assert_eq!(fx.engine.get_balance(&user, &wallet).unwrap(), 120);
    }

    #[test]
    fn duplicate_spend_is_applied_once() {
        let fx = fixture_with_bonus(100);
        let (user, wallet) = new_user(&fx);
        let txn = TransactionId::new_v4();

        let first = fx.engine.spend(&user, &wallet, txn, 30).unwrap();
        assert_eq!(first.message, SPEND_SUCCESSFUL);
        assert_eq!(first.balance, 70);

        let second = fx.engine.spend(&user, &wallet, txn, 30).unwrap();
        assert_eq!(second.message, ALREADY_PROCESSED);
        assert!(second.already_processed);
        assert_eq!(second.balance, 70);

        assert_eq!(fx.db.entries_for_transaction(&txn).unwrap().len(), 2);
        assert_eq!(fx.db.get_balance(&fx.engine.system_wallet()).unwrap(), 30);
    }

    #[test]
    fn spend_replay_after_balance_drops_is_already_processed() {
        let fx = fixture_with_bonus(100);
        let (user, wallet) = new_user(&fx);
        let txn = TransactionId::new_v4();

        fx.engine.spend(&user, &wallet, txn, 60).unwrap();
        fx.engine.spend(&user, &wallet, TransactionId::new_v4(), 30).unwrap();

        // Balance is now 10, below the replayed amount
        let replay = fx.engine.spend(&user, &wallet, txn, 60).unwrap();
        assert!(replay.already_processed);
        assert_eq!(replay.message, ALREADY_PROCESSED);
        assert_eq!(replay.balance, 10);
        assert_eq!(fx.db.entries_for_transaction(&txn).unwrap().len(), 2);
    }

    #[test]
    fn top_up_past_i64_max_is_rejected_as_caller_error() {
        let fx = fixture_with_bonus(100);
        let (user, wallet) = new_user(&fx);
        let txn = TransactionId::new_v4();

        let err = fx.engine.top_up(&user, &wallet, txn, i64::MAX).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::BalanceOverflow {
                balance: 100,
                amount: i64::MAX
            }
        ));
        assert!(err.is_caller_error());
        assert!(!fx.db.transaction_exists(&txn).unwrap());
        assert_eq!(fx.engine.get_balance(&user, &wallet).unwrap(), 100);

        // Up to the limit is fine
        let outcome = fx
            .engine
            .top_up(&user, &wallet, TransactionId::new_v4(), i64::MAX - 100)
            .unwrap();
        assert_eq!(outcome.balance, i64::MAX);
    }

    #[test]
    fn transfer_fails_without_writing_when_writer_is_held_too_long() {
        use std::sync::mpsc;
        use std::time::Duration;

        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(
            LedgerDatabase::open(&dir.path().join("held.redb"))
                .unwrap()
                .with_lock_timeout(Duration::from_millis(50)),
        );
        db.provision_system_wallet(DEFAULT_ASSET_CODE).unwrap();
        let engine = TransferEngine::new(db.clone(), EngineConfig::default()).unwrap();
        let user = UserId::new_v4();
        let wallet = engine.issue_signup_wallet(&user).unwrap().wallet.id;

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

        let txn = TransactionId::new_v4();
        let err = engine.top_up(&user, &wallet, txn, 10).unwrap_err();
        assert!(matches!(err, LedgerError::TransactionFailed(StoreError::LockTimeout(_))));
        assert!(!err.is_caller_error());

        release_tx.send(()).unwrap();
        holder.join().unwrap().unwrap();

        assert!(!db.transaction_exists(&txn).unwrap());
        assert_eq!(engine.get_balance(&user, &wallet).unwrap(), 100);
    }

    #[test]
    fn non_bonus_transactions_sum_to_zero() {
        let fx = fixture_with_bonus(100);
        let (user, wallet) = new_user(&fx);

        let mut ids = Vec::new();
        for (i, amount) in [15, 40, 7, 60].into_iter().enumerate() {
            let id = TransactionId::new_v4();
            if i % 2 == 0 {
                fx.engine.top_up(&user, &wallet, id, amount).unwrap();
            } else {
                fx.engine.spend(&user, &wallet, id, amount).unwrap();
            }
            ids.push(id);
        }

        for id in &ids {
            assert_eq!(fx.db.entries_for_transaction(id).unwrap().len(), 2);
            assert_eq!(entry_sum(&fx, id), 0);
        }
        // 100 + 15 - 40 + 7 - 60
        assert_eq!(fx.engine.get_balance(&user, &wallet).unwrap(), 22);
        // Bonus did not come from the system wallet
        assert_eq!(fx.db.get_balance(&fx.engine.system_wallet()).unwrap(), 78);
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let fx = fixture_with_bonus(100);
        let (user, wallet) = new_user(&fx);

        for amount in [0, -5] {
            let txn = TransactionId::new_v4();
            let err = fx.engine.top_up(&user, &wallet, txn, amount).unwrap_err();
            assert!(matches!(err, LedgerError::InvalidAmount(a) if a == amount));
            let err = fx.engine.spend(&user, &wallet, txn, amount).unwrap_err();
            assert!(matches!(err, LedgerError::InvalidAmount(_)));
            assert!(!fx.db.transaction_exists(&txn).unwrap());
        }
    }

    #[test]
    fn unknown_user_is_not_found() {
        let fx = fixture_with_bonus(100);
        let err = fx
            .engine
            .top_up(&UserId::new_v4(), &WalletId::new_v4(), TransactionId::new_v4(), 5)
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
        assert!(err.is_caller_error());
    }

    #[test]
    fn wallet_of_another_user_is_not_found() {
        let fx = fixture_with_bonus(100);
        let (alice, _) = new_user(&fx);
        let (_, bob_wallet) = new_user(&fx);
        let txn = TransactionId::new_v4();

        let err = fx.engine.spend(&alice, &bob_wallet, txn, 5).unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
        assert!(!fx.db.transaction_exists(&txn).unwrap());
    }

    #[test]
    fn concurrent_spends_never_overdraw() {
        let fx = fixture_with_bonus(100);
        let (user, wallet) = new_user(&fx);

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let engine = fx.engine.clone();
                thread::spawn(move || engine.spend(&user, &wallet, TransactionId::new_v4(), 30))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(succeeded, 3);
        for result in &results {
            match result {
                Ok(outcome) => assert!(outcome.balance >= 0),
                Err(e) => assert!(matches!(e, LedgerError::InsufficientBalance { .. })),
            }
        }
        assert_eq!(fx.engine.get_balance(&user, &wallet).unwrap(), 10);
    }

    #[test]
    fn concurrent_retries_of_one_id_apply_once() {
        let fx = fixture_with_bonus(100);
        let (user, wallet) = new_user(&fx);
        let txn = TransactionId::new_v4();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = fx.engine.clone();
                thread::spawn(move || engine.top_up(&user, &wallet, txn, 20))
            })
            .collect();
        let outcomes: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();

        assert_eq!(outcomes.iter().filter(|o| !o.already_processed).count(), 1);
        assert!(outcomes.iter().all(|o| o.balance == 120));
        assert_eq!(fx.db.entries_for_transaction(&txn).unwrap().len(), 2);
        assert_eq!(fx.engine.get_balance(&user, &wallet).unwrap(), 120);
    }

    #[test]
    fn concurrent_retries_of_one_spend_apply_once() {
        let fx = fixture_with_bonus(100);
        let (user, wallet) = new_user(&fx);
        let txn = TransactionId::new_v4();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = fx.engine.clone();
                thread::spawn(move || engine.spend(&user, &wallet, txn, 70))
            })
            .collect();
        let outcomes: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();

        // Later retries see the id, never the 30 left over
        assert_eq!(outcomes.iter().filter(|o| !o.already_processed).count(), 1);
        assert!(outcomes.iter().all(|o| o.balance == 30));
        assert_eq!(fx.db.entries_for_transaction(&txn).unwrap().len(), 2);
        assert_eq!(fx.engine.get_balance(&user, &wallet).unwrap(), 30);
    }

    #[test]
    fn concurrent_mixed_operations_serialize() {
        let fx = fixture_with_bonus(100);
        let (user, wallet) = new_user(&fx);

        let mut handles = Vec::new();
        for i in 0..30 {
            let engine = fx.engine.clone();
            handles.push(thread::spawn(move || {
                if i % 3 == 0 {
                    engine.spend(&user, &wallet, TransactionId::new_v4(), 7)
                } else {
                    engine.top_up(&user, &wallet, TransactionId::new_v4(), 5)
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        // 100 + 20 * 5 - 10 * 7
        assert_eq!(fx.engine.get_balance(&user, &wallet).unwrap(), 130);
        assert_eq!(fx.db.get_balance(&fx.engine.system_wallet()).unwrap(), -30);
    }

    #[test]
    fn system_wallet_is_not_a_user_wallet() {
        let fx = fixture_with_bonus(100);
        let system = fx.db.wallet(&fx.engine.system_wallet()).unwrap();
        assert_eq!(system.owner_type, OwnerType::System);
    }
}
