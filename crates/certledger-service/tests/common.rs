//! Common test utilities for certledger-service integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use certledger_core::{
    LogMetadata, Network, NewTransactionLog, TransactionId, TransactionType, UserId,
};
use certledger_mirror::{MirrorClient, MirrorOptions};
use certledger_service::{create_router, AppState, ServiceConfig};
use certledger_store::{MemoryStore, TransactionLogStore};

pub const SERVICE_API_KEY: &str = "test-service-key";
pub const JWT_SECRET: &str = "test-jwt-secret";
pub const AUDIENCE: &str = "authenticated";

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Mock mirror REST API.
    pub mirror: MockServer,
    /// The transaction log behind the service.
    pub store: Arc<MemoryStore>,
    /// Application state, for reaching the sweep and scheduler pieces directly.
    pub state: AppState,
    /// A test user ID for authenticated requests.
    pub test_user_id: UserId,
}

impl TestHarness {
    /// Create a new test harness with an empty store and a mock mirror.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Like [`TestHarness::new`], with `adjust` applied to the service config.
    pub async fn with_config(adjust: impl FnOnce(&mut ServiceConfig)) -> Self {
        let mirror = MockServer::start().await;
        let store = Arc::new(MemoryStore::new());

        let mut config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            network: Network::Testnet,
            mirror_base_url: Some(mirror.uri()),
            service_api_key: Some(SERVICE_API_KEY.into()),
            auth_jwt_secret: Some(JWT_SECRET.into()),
            auth_audience: AUDIENCE.into(),
            sweep_interval_seconds: 0,
            reconcile_max_retries: 2,
            reconcile_retry_delay_ms: 20,
            ..ServiceConfig::default()
        };
        adjust(&mut config);

        let client = MirrorClient::with_options(
            Network::Testnet,
            MirrorOptions::with_base_url(mirror.uri()),
        )
        .expect("Failed to build mirror client");

        let state = AppState::new(
            Arc::clone(&store) as Arc<dyn TransactionLogStore>,
            Arc::new(client),
            config,
        );
        let router: Router = create_router(state.clone());

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            mirror,
            store,
            state,
            test_user_id: UserId::generate(),
        }
    }

    /// Get the authorization header for the test user.
    pub fn user_auth_header(&self) -> String {
        Self::auth_header_for(&self.test_user_id)
    }

    /// Get a different user's auth header (for testing isolation).
    pub fn other_user_auth_header() -> String {
        Self::auth_header_for(&UserId::generate())
    }

    /// Bearer header with a valid HS256 token for `user_id`.
    pub fn auth_header_for(user_id: &UserId) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = json!({
            "sub": user_id.to_string(),
            "aud": AUDIENCE,
            "iat": now,
            "exp": now + 3600,
        });
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
        )
        .expect("Failed to sign token");
        format!("Bearer {token}")
    }

    /// Insert a pending record for `user_id`.
    pub async fn seed_pending(&self, transaction_id: TransactionId, user_id: UserId) {
        self.store
            .insert(NewTransactionLog::pending(
                transaction_id,
                user_id,
                TransactionType::TokenMint,
                LogMetadata::default(),
            ))
            .await
            .expect("Failed to seed record");
    }

    /// Move a record's creation time `minutes` into the past.
    pub async fn backdate(&self, transaction_id: &TransactionId, minutes: i64) {
        let created_at = chrono::Utc::now() - chrono::Duration::minutes(minutes);
        assert!(self.store.set_created_at(transaction_id, created_at).await);
    }

    /// Poll the sweep status until a sweep has finished and nothing is running.
    pub async fn wait_for_sweep(&self) -> serde_json::Value {
        for _ in 0..100 {
            let status: serde_json::Value = self
                .server
                .get("/v1/recovery/sweep")
                .add_header("x-api-key", SERVICE_API_KEY)
                .await
                .json();
            if status["running"] == false && !status["last_run"].is_null() {
                return status;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("recovery sweep did not finish");
    }

    /// Mirror answers the health probe.
    pub async fn mirror_healthy(&self) {
        Mock::given(method("GET"))
            .and(path("/api/v1/network/supply"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "released_supply": "5000000000000000000",
                "total_supply": "5000000000000000000",
            })))
            .mount(&self.mirror)
            .await;
    }

    /// Mirror knows `transaction_id` with `result`.
    pub async fn mirror_knows(&self, transaction_id: &TransactionId, result: &str) {
        Mock::given(method("GET"))
            .and(path(format!(
                "/api/v1/transactions/{}",
                transaction_id.to_mirror_format()
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(mirror_transaction(
                transaction_id,
                result,
            )))
            .mount(&self.mirror)
            .await;
    }
}

/// The transaction used throughout the scenarios.
pub fn scenario_tx() -> TransactionId {
    "0.0.1001@1700000000.123456789".parse().unwrap()
}

/// A distinct transaction per `n`.
pub fn tx(n: u32) -> TransactionId {
    format!("0.0.{}@1700000000.{n}", 3000 + n).parse().unwrap()
}

/// Mirror body for a single transaction lookup.
pub fn mirror_transaction(transaction_id: &TransactionId, result: &str) -> serde_json::Value {
    json!({
        "transactions": [{
            "transaction_id": transaction_id.to_mirror_format(),
            "consensus_timestamp": "1700000005.000000000",
            "transaction_hash": "abc123",
            "charged_tx_fee": 85_000_000,
            "result": result,
            "name": "TOKENMINT",
            "transfers": []
        }],
        "links": { "next": null }
    })
}
