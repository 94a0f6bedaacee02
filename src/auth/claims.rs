// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims and authenticated user representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::{UserId, WalletId};

/// Issuer stamped on every access token.
pub const TOKEN_ISSUER: &str = "wallet-service";

/// Access token lifetime in seconds (24 hours).
pub const ACCESS_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User id
    pub uid: UserId,
    /// Wallet id at issuance
    pub wid: WalletId,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
    /// Issuer
    pub iss: String,
}

impl AccessClaims {
    pub fn new(user_id: UserId, wallet_id: WalletId, issued_at: i64) -> Self {
        Self {
            uid: user_id,
            wid: wallet_id,
            iat: issued_at,
            exp: issued_at + ACCESS_TOKEN_TTL_SECS,
            iss: TOKEN_ISSUER.to_string(),
        }
    }
}

/// Authenticated user information extracted from a verified token.
///
/// `wallet_id` is re-resolved from storage on every request, not taken from
/// the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub wallet_id: WalletId,
}
