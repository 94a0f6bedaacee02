// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::SET_COOKIE, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use super::run_blocking;
use crate::{
    auth::session_cookie,
    error::ApiError,
    models::{ApiResponse, AuthRequest, UserResponse},
    state::AppState,
};

#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = AuthRequest,
    tag = "Auth",
    responses(
        (status = 201, description = "User, wallet and signup bonus created", body = ApiResponse<UserResponse>),
        (status = 400, description = "Malformed body"),
        (status = 409, description = "Username taken"),
        (status = 422, description = "Missing username or password")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<AuthRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|_| ApiError::invalid_body())?;
    let credentials = request.validate()?;

    let accounts = state.accounts.clone();
    let user = run_blocking(move || accounts.signup(&credentials.username, &credentials.password))
        .await??;

    Ok(with_session(StatusCode::CREATED, "User registered successfully", user))
}

#[utoipa::path(
    post,
    path = "/api/auth/signin",
    request_body = AuthRequest,
    tag = "Auth",
    responses(
        (status = 200, description = "Signed in", body = ApiResponse<UserResponse>),
        (status = 400, description = "Malformed body"),
        (status = 401, description = "Unknown username or wrong password"),
        (status = 422, description = "Missing username or password")
    )
)]
pub async fn signin(
    State(state): State<AppState>,
    payload: Result<Json<AuthRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|_| ApiError::invalid_body())?;
    let credentials = request.validate()?;

    let accounts = state.accounts.clone();
    let user = run_blocking(move || accounts.signin(&credentials.username, &credentials.password))
        .await??;

    Ok(with_session(StatusCode::OK, "User logged in successfully", user))
}

/// Envelope response that also sets the `ssid` cookie.
fn with_session(status: StatusCode, message: &str, user: UserResponse) -> Response {
    let cookie = session_cookie(&user.access_token);
    let mut response = (status, Json(ApiResponse::ok(message, user))).into_response();
    if let Some(cookie) = cookie {
        response.headers_mut().insert(SET_COOKIE, cookie);
    }
    response
}
