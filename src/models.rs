// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! This module defines the request and response data structures used by
//! the REST API. All types derive `ToSchema` for OpenAPI documentation.
//!
//! ## Envelope
//!
//! Every response body is an [`ApiResponse`]: `{ success, message, data? }`.
//!
//! ## Model Categories
//!
//! - **Auth**: signup/signin credentials and the resulting user
//! - **Wallet**: top-up/spend requests carrying the idempotency key

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::storage::{TransactionId, UserId, WalletId};

// =============================================================================
// Envelope
// =============================================================================

/// Uniform response envelope.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

// =============================================================================
// Auth Models
// =============================================================================

/// Signup and signin credentials.
///
/// Both fields are required; missing ones are reported by [`AuthRequest::validate`]
/// rather than as a body parse failure.
#[derive(Debug, Clone, Deserialize, ToSchema, Default)]
#[serde(deny_unknown_fields)]
pub struct AuthRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Credentials after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl AuthRequest {
    pub fn validate(self) -> Result<Credentials, ApiError> {
        let username = self.username.filter(|u| !u.trim().is_empty());
        let password = self.password.filter(|p| !p.is_empty());

        let mut problems = Vec::new();
        if username.is_none() {
            problems.push("username is required");
        }
        if password.is_none() {
            problems.push("password is required");
        }

        match (username, password) {
            (Some(username), Some(password)) => Ok(Credentials { username, password }),
            _ => Err(ApiError::unprocessable(problems.join(", "))),
        }
    }
}

/// Account returned by signup and signin.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct UserResponse {
    pub id: UserId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_id: Option<WalletId>,
    /// Present after signup: the wallet balance including the bonus.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<i64>,
    pub access_token: String,
}

// =============================================================================
// Wallet Models
// =============================================================================

/// Top-up or spend request.
///
/// `txn_id` is the idempotency key: retrying with the same id never applies
/// the amount twice.
#[derive(Debug, Clone, Deserialize, ToSchema, Default)]
#[serde(deny_unknown_fields)]
pub struct WalletRequest {
    #[serde(default)]
    pub txn_id: Option<TransactionId>,
    /// Smallest currency unit; must be positive.
    #[serde(default)]
    pub amount: Option<i64>,
}

/// Wallet request after validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletCommand {
    pub txn_id: TransactionId,
    pub amount: i64,
}

impl WalletRequest {
    pub fn validate(self) -> Result<WalletCommand, ApiError> {
        let txn_id = self.txn_id.filter(|id| !id.as_uuid().is_nil());

        let mut problems = Vec::new();
        match self.amount {
            None => problems.push("amount is required"),
            Some(amount) if amount <= 0 => problems.push("amount must be greater than 0"),
            Some(_) => {}
        }
        if txn_id.is_none() {
            problems.push("txn_id is required");
        }

        match (txn_id, self.amount) {
            (Some(txn_id), Some(amount)) if problems.is_empty() => Ok(WalletCommand { txn_id, amount }),
            _ => Err(ApiError::bad_request(problems.join(", "))),
        }
    }
}
