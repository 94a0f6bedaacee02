// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for authenticated users.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use super::{cookie::session_token, AccessClaims, AuthError, AuthenticatedUser};
use crate::api::run_blocking;
use crate::state::AppState;
use crate::storage::{LedgerDatabase, StoreError};

/// Extractor for authenticated users.
///
/// The token is taken from the `ssid` cookie, falling back to
/// `Authorization: Bearer <token>`. After the signature check the user and
/// their wallet are looked up again on a blocking thread, so tokens of deleted
/// users stop working.
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = match session_token(&parts.headers) {
            Some(token) => token,
            None => bearer_token(&parts.headers)?,
        };

        let claims = state
            .tokens
            .verify(&token)
            .inspect_err(|e| tracing::debug!(reason = %e, "Rejected access token"))?;

        let db = state.db.clone();
        let user = run_blocking(move || resolve_subject(&db, &claims))
            .await
            .map_err(|e| AuthError::InternalError(e.message))??;
        Ok(Auth(user))
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<String, AuthError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingCredentials)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    auth_header
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or(AuthError::InvalidAuthHeader)
}

/// Confirm the token's user still exists and owns a wallet.
fn resolve_subject(db: &LedgerDatabase, claims: &AccessClaims) -> Result<AuthenticatedUser, AuthError> {
    let lookup_failed = |e: StoreError| match e {
        StoreError::NotFound(what) => {
            tracing::warn!(user_id = %claims.uid, missing = %what, "Token subject not found");
            AuthError::UnknownSubject
        }
        other => AuthError::InternalError(other.to_string()),
    };

    let user = db.user(&claims.uid).map_err(lookup_failed)?;
    let wallet = db.wallet_for_owner(&user.id).map_err(lookup_failed)?;

    Ok(AuthenticatedUser {
        user_id: user.id,
        wallet_id: wallet.id,
    })
}
