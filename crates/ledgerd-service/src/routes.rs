//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{admin, credits, grants, health, reservations, subscriptions};
use crate::state::AppState;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Credits (user bearer auth)
/// - `GET /v1/credits/balance` - Get current balance
/// - `GET /v1/credits/events` - List credit event history
///
/// ## Reservations (service API key auth)
/// - `POST /v1/reservations` - Reserve credits for a job
/// - `POST /v1/reservations/:id/external` - Bind a provider request id
/// - `POST /v1/reservations/finalize` - Settle a reservation
/// - `POST /v1/reservations/release-all` - Sweep a user's open holds
///
/// ## Grants and subscriptions (service API key auth)
/// - `POST /v1/grants/charge` - Grant plan credits for a charge
/// - `POST /v1/grants/backfill` - Backfill all active subscribers
/// - `POST /v1/subscriptions` - Set subscription state
///
/// ## Operations (service API key auth)
/// - `POST /v1/reconcile` - Correct reserved-balance drift
/// - `GET /v1/accounts/reserved` - Accounts with held credits
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    Router::new()
        // Health (public)
        .route("/health", get(health::health))
        // Credits
        .route("/v1/credits/balance", get(credits::get_balance))
        .route("/v1/credits/events", get(credits::list_events))
        // Reservations
        .route("/v1/reservations", post(reservations::create_reservation))
        .route(
            "/v1/reservations/:id/external",
            post(reservations::attach_external_id),
        )
        .route("/v1/reservations/finalize", post(reservations::finalize))
        .route(
            "/v1/reservations/release-all",
            post(reservations::release_all),
        )
        // Grants and subscriptions
        .route("/v1/grants/charge", post(grants::grant_for_charge))
        .route("/v1/grants/backfill", post(grants::backfill))
        .route("/v1/subscriptions", post(subscriptions::set_subscription))
        // Operations
        .route("/v1/reconcile", post(admin::reconcile))
        .route("/v1/accounts/reserved", get(admin::list_reserved))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
