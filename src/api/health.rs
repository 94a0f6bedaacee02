// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::time::Instant;

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::run_blocking;
use crate::models::ApiResponse;
use crate::state::AppState;

/// Health report with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthReport {
    /// Overall status ("healthy" or "unhealthy").
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub checks: HealthChecks,
}

/// Individual health check results.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    /// Ledger database read check.
    pub database: ComponentCheck,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ComponentCheck {
    pub status: String,
    /// Time the check took, e.g. `"1.2ms"`.
    pub response_time: String,
}

/// Health check endpoint handler.
///
/// Returns 200 if all checks pass, 503 if any check fails.
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = ApiResponse<HealthReport>),
        (status = 503, description = "Service is unhealthy", body = ApiResponse<HealthReport>)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<ApiResponse<HealthReport>>) {
    let started = Instant::now();
    let db = state.db.clone();
    let result = run_blocking(move || db.health_check()).await;
    let response_time = format!("{:?}", started.elapsed());

    let healthy = match result {
        Ok(Ok(())) => {
            tracing::debug!(response_time = %response_time, "Database health check passed");
            true
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, response_time = %response_time, "Database health check failed");
            false
        }
        Err(e) => {
            tracing::warn!(error = %e.message, response_time = %response_time, "Database health check failed");
            false
        }
    };
    let label = if healthy { "healthy" } else { "unhealthy" };

    let report = HealthReport {
        status: label.to_string(),
        timestamp: Utc::now(),
        checks: HealthChecks {
            database: ComponentCheck {
                status: label.to_string(),
                response_time,
            },
        },
    };

    let (status, message) = if healthy {
        (StatusCode::OK, "service is healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "service is unhealthy")
    };

    let mut body = ApiResponse::ok(message, report);
    body.success = healthy;
    (status, Json(body))
}
