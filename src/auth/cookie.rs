// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session cookie carrying the access token.

use axum::http::{header::COOKIE, HeaderMap, HeaderValue};

/// Cookie name.
pub const SESSION_COOKIE: &str = "ssid";

/// Seven days.
pub const SESSION_COOKIE_MAX_AGE_SECS: u64 = 7 * 24 * 60 * 60;

/// `Set-Cookie` value for a freshly issued token.
pub fn session_cookie(token: &str) -> Option<HeaderValue> {
    let value = format!(
        "{SESSION_COOKIE}={token}; Path=/; Max-Age={SESSION_COOKIE_MAX_AGE_SECS}; HttpOnly; SameSite=Lax"
    );
    HeaderValue::from_str(&value).ok()
}

/// Token from the request's `ssid` cookie, if any.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}
