// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error taxonomy of the transfer engine.

use axum::http::StatusCode;
use thiserror::Error;

use crate::storage::{StoreError, TransactionId};

/// Failure of a ledger operation.
///
/// Every variant raised inside a unit of work has already rolled it back by
/// the time the caller sees it.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("amount must be greater than 0, got {0}")]
    InvalidAmount(i64),

    #[error("not found: {0}")]
    NotFound(String),

    /// The transaction id hit the uniqueness constraint. The engine turns this
    /// into an "already processed" outcome before it reaches callers.
    #[error("transaction {0} already exists")]
    Conflict(TransactionId),

    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance { available: i64, requested: i64 },

    /// Applying the amount would push the wallet balance out of `i64` range.
    #[error("balance overflow: balance {balance}, amount {amount}")]
    BalanceOverflow { balance: i64, amount: i64 },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to retrieve balance: {0}")]
    BalanceRetrievalFailed(#[source] StoreError),

    #[error("transaction failed: {0}")]
    TransactionFailed(#[source] StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => LedgerError::NotFound(what),
            StoreError::Configuration(msg) => LedgerError::Configuration(msg),
            other => LedgerError::TransactionFailed(other),
        }
    }
}

impl LedgerError {
    /// Machine-readable code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            LedgerError::InvalidAmount(_) => "invalid_amount",
            LedgerError::NotFound(_) => "not_found",
            LedgerError::Conflict(_) => "conflict",
            LedgerError::InsufficientBalance { .. } => "insufficient_balance",
            LedgerError::BalanceOverflow { .. } => "balance_overflow",
            LedgerError::Configuration(_) => "configuration_error",
            LedgerError::BalanceRetrievalFailed(_) => "balance_retrieval_failed",
            LedgerError::TransactionFailed(_) => "transaction_failed",
        }
    }

    /// HTTP status the caller should translate this failure into.
    pub fn status_code(&self) -> StatusCode {
        match self {
            LedgerError::InvalidAmount(_)
            | LedgerError::InsufficientBalance { .. }
            | LedgerError::BalanceOverflow { .. } => StatusCode::BAD_REQUEST,
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::Conflict(_) => StatusCode::CONFLICT,
            LedgerError::Configuration(_)
            | LedgerError::BalanceRetrievalFailed(_)
            | LedgerError::TransactionFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the caller caused this rather than the system.
    pub fn is_caller_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}
