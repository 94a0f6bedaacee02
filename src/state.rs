// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::accounts::AccountService;
use crate::auth::TokenIssuer;
use crate::ledger::{LedgerError, TransferEngine};
use crate::storage::LedgerDatabase;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<LedgerDatabase>,
    pub engine: Arc<TransferEngine>,
    pub accounts: AccountService,
    pub tokens: TokenIssuer,
    /// Cancelled when shutdown begins; wallet mutations are refused after that.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Wire the services over an opened database whose system wallet exists.
    pub fn new(
        db: Arc<LedgerDatabase>,
        engine: TransferEngine,
        tokens: TokenIssuer,
        shutdown: CancellationToken,
    ) -> Self {
        let engine = Arc::new(engine);
        let accounts = AccountService::new(db.clone(), engine.clone(), tokens.clone());
        Self {
            db,
            engine,
            accounts,
            tokens,
            shutdown,
        }
    }

    /// Convenience constructor resolving the system wallet from `db`.
    pub fn build(
        db: Arc<LedgerDatabase>,
        engine_config: crate::ledger::EngineConfig,
        jwt_secret: &[u8],
        shutdown: CancellationToken,
    ) -> Result<Self, LedgerError> {
        let engine = TransferEngine::new(db.clone(), engine_config)?;
        Ok(Self::new(db, engine, TokenIssuer::new(jwt_secret), shutdown))
    }
}
