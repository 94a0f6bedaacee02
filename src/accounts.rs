// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User accounts: signup and signin.
//!
//! Signup writes the user row, the wallet and the signup bonus in a single
//! unit of work, so a user never exists without a wallet.

use std::sync::Arc;

use axum::http::StatusCode;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::auth::{hash_password, verify_password, AuthError, TokenIssuer};
use crate::ledger::{LedgerError, TransferEngine};
use crate::models::UserResponse;
use crate::storage::{LedgerDatabase, StoreError};

/// Message shown for every signup or signin refusal.
pub const AUTHENTICATION_FAILED: &str = "authentication failed";

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("username is already registered")]
    UsernameTaken,

    #[error("unknown username or wrong password")]
    InvalidCredentials,

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("token error: {0}")]
    Token(#[from] AuthError),
}

impl AccountError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AccountError::UsernameTaken => "username_taken",
            AccountError::InvalidCredentials => "invalid_credentials",
            AccountError::Store(_) | AccountError::Ledger(_) | AccountError::Token(_) => {
                "account_error"
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AccountError::UsernameTaken => StatusCode::CONFLICT,
            AccountError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to clients; never says which check failed.
    pub fn public_message(&self) -> &'static str {
        AUTHENTICATION_FAILED
    }
}

/// Registers users and signs them in.
#[derive(Clone)]
pub struct AccountService {
    db: Arc<LedgerDatabase>,
    engine: Arc<TransferEngine>,
    tokens: TokenIssuer,
}

impl AccountService {
    pub fn new(db: Arc<LedgerDatabase>, engine: Arc<TransferEngine>, tokens: TokenIssuer) -> Self {
        Self { db, engine, tokens }
    }

    /// Create the user, their wallet and the signup bonus, then issue a token.
    pub fn signup(&self, username: &str, password: &str) -> Result<UserResponse, AccountError> {
        match self.db.user_by_username(username) {
            Ok(_) => {
                debug!(username, "User with username already exists");
                return Err(AccountError::UsernameTaken);
            }
            Err(StoreError::NotFound(_)) => {}
            Err(e) => {
                error!(error = %e, "Failed to look up username");
                return Err(e.into());
            }
        }

        let password_hash = hash_password(password)?;

        let (user, opened) = self
            .db
            .run_in_unit_of_work(|unit| {
                let user = unit
                    .create_user(username, &password_hash)
                    .map_err(|e| match e {
                        StoreError::Conflict(_) => AccountError::UsernameTaken,
                        other => other.into(),
                    })?;
                let opened = self.engine.open_user_wallet(unit, &user.id)?;
                Ok::<_, AccountError>((user, opened))
            })
            .inspect_err(|e| {
                if !matches!(e, AccountError::UsernameTaken) {
                    error!(error = %e, "Failed to create user");
                }
            })?;

        let access_token = self.tokens.issue(user.id, opened.wallet.id)?;
        info!(user_id = %user.id, wallet_id = %opened.wallet.id, balance = opened.balance, "User registered");

        Ok(UserResponse {
            id: user.id,
            username: user.username,
            wallet_id: Some(opened.wallet.id),
            balance: Some(opened.balance),
            access_token,
        })
    }

    /// Verify the password and issue a token.
    pub fn signin(&self, username: &str, password: &str) -> Result<UserResponse, AccountError> {
        let user = match self.db.user_by_username(username) {
            Ok(user) => user,
            Err(StoreError::NotFound(_)) => {
                debug!(username, "User with username does not exist");
                return Err(AccountError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        if !verify_password(password, &user.password_hash) {
            debug!(user_id = %user.id, "Password does not match");
            return Err(AccountError::InvalidCredentials);
        }

        let wallet = self.db.wallet_for_owner(&user.id).inspect_err(|e| {
            error!(user_id = %user.id, error = %e, "Failed to get wallet for user");
        })?;

        let access_token = self.tokens.issue(user.id, wallet.id)?;
        debug!(user_id = %user.id, "User signed in");

        Ok(UserResponse {
            id: user.id,
            username: user.username,
            wallet_id: Some(wallet.id),
            balance: None,
            access_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::engine::tests::fixture_with_bonus;

    fn service(bonus: i64) -> (AccountService, crate::ledger::engine::tests::Fixture) {
        let fx = fixture_with_bonus(bonus);
        let service = AccountService::new(fx.db.clone(), fx.engine.clone(), TokenIssuer::new(b"secret"));
        (service, fx)
    }

    #[test]
    fn signup_creates_user_wallet_and_bonus() {
        let (accounts, fx) = service(100);
        let created = accounts.signup("alice", "pw").unwrap();

        assert_eq!(created.username, "alice");
        assert_eq!(created.balance, Some(100));
        let wallet_id = created.wallet_id.unwrap();
        assert_eq!(fx.db.wallet_for_owner(&created.id).unwrap().id, wallet_id);
        assert_eq!(fx.db.get_balance(&wallet_id).unwrap(), 100);

        let stored = fx.db.user(&created.id).unwrap();
        assert_ne!(stored.password_hash, "pw");
    }

    #[test]
    fn duplicate_username_is_refused() {
        let (accounts, _fx) = service(100);
        accounts.signup("alice", "pw").unwrap();
        let err = accounts.signup("alice", "other").unwrap_err();
        assert!(matches!(err, AccountError::UsernameTaken));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.public_message(), AUTHENTICATION_FAILED);
    }

    #[test]
    fn signin_returns_same_user_and_wallet() {
        let (accounts, _fx) = service(100);
        let created = accounts.signup("bob", "hunter2").unwrap();
        let signed_in = accounts.signin("bob", "hunter2").unwrap();

        assert_eq!(signed_in.id, created.id);
        assert_eq!(signed_in.wallet_id, created.wallet_id);
        assert_eq!(signed_in.balance, None);
        assert!(!signed_in.access_token.is_empty());
    }

    #[test]
    fn signin_failures_are_indistinguishable() {
        let (accounts, _fx) = service(100);
        accounts.signup("carol", "right").unwrap();

        let wrong_password = accounts.signin("carol", "wrong").unwrap_err();
        let unknown_user = accounts.signin("nobody", "right").unwrap_err();
        assert!(matches!(wrong_password, AccountError::InvalidCredentials));
        assert!(matches!(unknown_user, AccountError::InvalidCredentials));
        assert_eq!(wrong_password.public_message(), unknown_user.public_message());
    }
}
