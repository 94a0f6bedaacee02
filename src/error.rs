// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::accounts::AccountError;
use crate::auth::AuthError;
use crate::ledger::LedgerError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub code: Option<&'static str>,
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<&'static str>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn invalid_body() -> Self {
        Self::bad_request("invalid request body")
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        let message = match &e {
            LedgerError::InvalidAmount(_) => "amount must be greater than 0",
            LedgerError::NotFound(_) => "wallet not found",
            LedgerError::Conflict(_) => "transaction with this ID already exists",
            LedgerError::InsufficientBalance { .. } => "insufficient balance",
            LedgerError::BalanceOverflow { .. } => "amount would overflow the wallet balance",
            LedgerError::BalanceRetrievalFailed(_) => "failed to retrieve balance",
            LedgerError::Configuration(_) | LedgerError::TransactionFailed(_) => "transaction failed",
        };
        Self::new(e.status_code(), message).with_code(e.error_code())
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        let status = e.status_code();
        let message = if status == StatusCode::UNAUTHORIZED {
            "unauthorized"
        } else {
            "internal server error"
        };
        Self::new(status, message).with_code(e.error_code())
    }
}

impl From<AccountError> for ApiError {
    fn from(e: AccountError) -> Self {
        Self::new(e.status_code(), e.public_message()).with_code(e.error_code())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            success: false,
            message: self.message,
            error_code: self.code,
        });
        (self.status, body).into_response()
    }
}
