// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet endpoints: balance, top-up and spend for the authenticated user.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};

use super::run_blocking;
use crate::{
    auth::Auth,
    error::ApiError,
    ledger::TransferOutcome,
    models::{ApiResponse, WalletCommand, WalletRequest},
    state::AppState,
};

#[utoipa::path(
    get,
    path = "/api/wallet/balance",
    tag = "Wallet",
    responses(
        (status = 200, description = "Current balance", body = ApiResponse<i64>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_balance(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<i64>>, ApiError> {
    let engine = state.engine.clone();
    let balance = run_blocking(move || engine.get_balance(&user.user_id, &user.wallet_id)).await??;
    Ok(Json(ApiResponse::ok("wallet balance retrieved successfully", balance)))
}

#[utoipa::path(
    post,
    path = "/api/wallet/topup",
    request_body = WalletRequest,
    tag = "Wallet",
    responses(
        (status = 201, description = "Applied, or already processed", body = ApiResponse<i64>),
        (status = 400, description = "Invalid body or amount"),
        (status = 401, description = "Not authenticated"),
        (status = 503, description = "Shutting down")
    )
)]
pub async fn top_up(
    Auth(user): Auth,
    State(state): State<AppState>,
    payload: Result<Json<WalletRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<i64>>), ApiError> {
    let command = accept_mutation(&state, payload)?;

    let engine = state.engine.clone();
    let outcome = run_blocking(move || {
        engine.top_up(&user.user_id, &user.wallet_id, command.txn_id, command.amount)
    })
    .await??;

    Ok(created(outcome))
}

#[utoipa::path(
    post,
    path = "/api/wallet/spend",
    request_body = WalletRequest,
    tag = "Wallet",
    responses(
        (status = 201, description = "Applied, or already processed", body = ApiResponse<i64>),
        (status = 400, description = "Invalid body, invalid amount or insufficient balance"),
        (status = 401, description = "Not authenticated"),
        (status = 503, description = "Shutting down")
    )
)]
pub async fn spend(
    Auth(user): Auth,
    State(state): State<AppState>,
    payload: Result<Json<WalletRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<i64>>), ApiError> {
    let command = accept_mutation(&state, payload)?;

    let engine = state.engine.clone();
    let outcome = run_blocking(move || {
        engine.spend(&user.user_id, &user.wallet_id, command.txn_id, command.amount)
    })
    .await??;

    Ok(created(outcome))
}

/// Refuse new mutations once shutdown has begun, then parse and validate the body.
fn accept_mutation(
    state: &AppState,
    payload: Result<Json<WalletRequest>, JsonRejection>,
) -> Result<WalletCommand, ApiError> {
    if state.shutdown.is_cancelled() {
        return Err(ApiError::unavailable("service is shutting down"));
    }
    let Json(request) = payload.map_err(|_| ApiError::invalid_body())?;
    request.validate()
}

fn created(outcome: TransferOutcome) -> (StatusCode, Json<ApiResponse<i64>>) {
    (
        StatusCode::CREATED,
        Json(ApiResponse::ok(outcome.message, outcome.balance)),
    )
}
