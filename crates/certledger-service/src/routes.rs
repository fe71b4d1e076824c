//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{health, recovery, topics, transactions};
use crate::state::AppState;

/// Maximum concurrent requests for recovery endpoints.
/// Each one may hold a mirror polling loop open for up to 30s.
const RECOVERY_MAX_CONCURRENT_REQUESTS: usize = 8;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check with mirror probe
///
/// ## Transactions (user JWT auth)
/// - `GET /v1/transactions` - List the caller's transaction log
/// - `GET /v1/transactions/:transaction_id` - Get one record
///
/// ## Recovery (service API key auth, rate-limited, no request timeout)
/// - `POST /v1/recovery/sweep` - Start the batch recovery sweep in the background
/// - `GET /v1/recovery/sweep` - Sweep status and last result
/// - `POST /v1/recovery/transactions/:transaction_id` - Reconcile one transaction
///
/// ## Topics (service API key auth)
/// - `GET /v1/topics/:topic_id/messages` - Page through topic messages
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);
    let request_timeout = Duration::from_secs(request_timeout_seconds);

    // No request timeout here: reconciliation is bounded by its own polling
    // budget and sweeps run in the background.
    let recovery_routes = Router::new()
        .route(
            "/sweep",
            post(recovery::start_sweep).get(recovery::sweep_status),
        )
        .route(
            "/transactions/:transaction_id",
            post(recovery::reconcile_transaction),
        )
        .layer(ConcurrencyLimitLayer::new(RECOVERY_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        .route("/transactions", get(transactions::list_transactions))
        .route(
            "/transactions/:transaction_id",
            get(transactions::get_transaction),
        )
        .route(
            "/topics/:topic_id/messages",
            get(topics::list_topic_messages),
        )
        .layer(TimeoutLayer::new(request_timeout))
        .nest("/recovery", recovery_routes)
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        .layer(TimeoutLayer::new(request_timeout))
        .nest("/v1", api_routes)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
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
