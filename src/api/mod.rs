// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::HeaderName,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::AuthenticatedUser,
    error::ApiError,
    models::{AuthRequest, UserResponse, WalletRequest},
    state::AppState,
};

pub mod auth;
pub mod health;
pub mod wallet;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health::health))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/signin", post(auth::signin))
        .route("/wallet/balance", get(wallet::get_balance))
        .route("/wallet/topup", post(wallet::top_up))
        .route("/wallet/spend", post(wallet::spend))
        .with_state(state);

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .nest("/api", api_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

/// Run blocking store work off the async runtime.
///
/// The closure runs to completion even if the awaiting request is dropped, so
/// a started unit of work always commits or rolls back.
pub(crate) async fn run_blocking<F, T>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        tracing::error!(error = %e, "Blocking task failed");
        ApiError::internal("transaction failed")
    })
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::signup,
        auth::signin,
        wallet::get_balance,
        wallet::top_up,
        wallet::spend
    ),
    components(
        schemas(
            AuthRequest,
            UserResponse,
            WalletRequest,
            AuthenticatedUser,
            health::HealthReport,
            health::HealthChecks,
            health::ComponentCheck
        )
    ),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Auth", description = "Signup and signin"),
        (name = "Wallet", description = "Balance, top-up and spend")
    )
)]
struct ApiDoc;
