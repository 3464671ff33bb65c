//! Common test utilities for ledgerd-service integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use serde_json::json;
use tempfile::TempDir;

use ledgerd_core::{PricingConfig, UserId};
use ledgerd_service::{create_router, AppState, ServiceConfig};
use ledgerd_store::RocksStore;

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
    /// A test user ID for authenticated requests.
    pub test_user_id: UserId,
    /// The service API key for service-to-service requests.
    pub service_api_key: String,
}

impl TestHarness {
    /// Create a new test harness with a fresh database.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = RocksStore::open(temp_dir.path()).expect("Failed to open store");

        let service_api_key = "test-service-key".to_string();

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            service_api_key: Some(service_api_key.clone()),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            pricing: PricingConfig::default(),
        };

        let state = AppState::new(Arc::new(store), config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");
        let test_user_id = UserId::generate();

        Self {
            server,
            _temp_dir: temp_dir,
            test_user_id,
            service_api_key,
        }
    }

    /// Get the authorization header for user authentication.
    pub fn user_auth_header(&self) -> String {
        format!("Bearer test-token:{}", self.test_user_id)
    }

    /// Get a different user's auth header (for testing isolation).
    pub fn other_user_auth_header() -> String {
        let other_user = UserId::generate();
        format!("Bearer test-token:{other_user}")
    }

    /// Give the test user an active standard subscription.
    pub async fn subscribe(&self, user_id: UserId) {
        let now = chrono::Utc::now();
        self.server
            .post("/v1/subscriptions")
            .add_header("x-api-key", self.service_api_key.clone())
            .json(&json!({
                "user_id": user_id.to_string(),
                "plan_id": "standard",
                "status": "active",
                "current_period_start": now.to_rfc3339(),
                "current_period_end": (now + chrono::Duration::days(30)).to_rfc3339(),
            }))
            .await
            .assert_status_ok();
    }

    /// Fund a user by granting plan credits for a charge.
    pub async fn grant(&self, user_id: UserId, charge_id: &str) {
        self.server
            .post("/v1/grants/charge")
            .add_header("x-api-key", self.service_api_key.clone())
            .json(&json!({
                "user_id": user_id.to_string(),
                "plan_id": "standard",
                "charge_id": charge_id,
            }))
            .await
            .assert_status_ok();
    }

    /// Reserve credits for the user; returns the reservation id.
    pub async fn reserve(&self, user_id: UserId, estimated: f64) -> String {
        let response = self
            .server
            .post("/v1/reservations")
            .add_header("x-api-key", self.service_api_key.clone())
            .json(&json!({
                "user_id": user_id.to_string(),
                "service": "fal",
                "model_id": "flux-pro",
                "estimated_credits": estimated,
            }))
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        body["reservation_id"].as_str().unwrap().to_string()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
