// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Self-issued HS256 access tokens for wallet holders.
//!
//! ## Auth Flow
//!
//! 1. `POST /api/auth/signup` or `/api/auth/signin` returns an access token and
//!    sets it as the `ssid` cookie
//! 2. Clients send the cookie, or `Authorization: Bearer <token>`
//! 3. The server:
//!    - Verifies signature, expiry and issuer
//!    - Extracts `uid` and looks the user up again
//!    - Resolves the user's wallet
//!
//! ## Security
//!
//! - Wallet endpoints require authentication
//! - Passwords are stored as Argon2id PHC strings
//! - Clock skew tolerance is 60 seconds

pub mod claims;
pub mod cookie;
pub mod error;
pub mod extractor;
pub mod password;
pub mod tokens;

pub use claims::{AccessClaims, AuthenticatedUser};
pub use cookie::{session_cookie, SESSION_COOKIE};
pub use error::AuthError;
pub use extractor::Auth;
pub use password::{hash_password, verify_password};
pub use tokens::TokenIssuer;
