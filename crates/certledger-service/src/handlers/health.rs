//! Health check handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use certledger_core::Network;
use certledger_mirror::{MirrorHealth, MirrorQuery};
use serde::Serialize;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` while the mirror is unreachable.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Service version.
    pub version: String,
    /// Ledger network served.
    pub network: Network,
    /// Mirror probe result.
    pub mirror: MirrorHealth,
    /// Confirmations still waiting on the mirror.
    pub pending_confirmations: usize,
}

/// Health check endpoint.
///
/// Always answers 200; the mirror state is informational.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let mirror = state.mirror.check_health().await;

    Json(HealthResponse {
        status: if mirror.mirror_node_available {
            "ok"
        } else {
            "degraded"
        }
        .to_string(),
        service: "certledger".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        network: state.mirror.network(),
        mirror,
        pending_confirmations: state.confirmations().len(),
    })
}
