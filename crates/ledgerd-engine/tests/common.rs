//! Common test utilities for ledgerd-engine integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use chrono::{Duration, Utc};
use tempfile::TempDir;

use ledgerd_core::{GenerationService, PricingConfig, ReservationId, SubscriptionStatus, UserId};
use ledgerd_engine::{LedgerEngine, ReserveOutcome, ReserveRequest};
use ledgerd_store::RocksStore;

/// An engine over a throwaway database.
pub struct TestLedger {
    pub engine: LedgerEngine,
    /// Kept alive for the test duration.
    pub _temp_dir: TempDir,
}

impl TestLedger {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = RocksStore::open(temp_dir.path()).expect("Failed to open store");
        let engine = LedgerEngine::new(Arc::new(store), PricingConfig::default());
        Self {
            engine,
            _temp_dir: temp_dir,
        }
    }

    /// A user with an active standard subscription and the given balance.
    pub fn subscribed_user(&self, available_credits: i64) -> UserId {
        let user_id = UserId::generate();
        let now = Utc::now();
        self.engine
            .set_subscription(
                user_id,
                "standard",
                SubscriptionStatus::Active,
                now,
                now + Duration::days(30),
            )
            .expect("Failed to set subscription");

        if available_credits > 0 {
            // Grant resets to the plan allotment, then shape the balance
            // directly for tests that need an arbitrary starting point.
            let mut account = self
                .engine
                .store()
                .get_account(&user_id)
                .unwrap()
                .expect("account exists after subscribe");
            account.available_credits = available_credits;
            self.engine.store().put_account(&account).unwrap();
        }

        user_id
    }

    /// Reserve credits for a fal job.
    pub fn reserve(&self, user_id: UserId, estimated: f64) -> ReserveOutcome {
        self.engine
            .reserve(ReserveRequest {
                user_id,
                service: GenerationService::Fal,
                model_id: "flux-pro".into(),
                estimated_credits: estimated,
                reservation_id: None,
            })
            .expect("reserve failed")
    }

    /// Reserve with a caller-supplied id.
    pub fn reserve_with_id(
        &self,
        user_id: UserId,
        estimated: f64,
        id: &str,
    ) -> Result<ReserveOutcome, ledgerd_core::LedgerError> {
        self.engine.reserve(ReserveRequest {
            user_id,
            service: GenerationService::Fal,
            model_id: "flux-pro".into(),
            estimated_credits: estimated,
            reservation_id: Some(ReservationId::new(id)),
        })
    }

    /// Current (available, reserved) balances.
    pub fn balances(&self, user_id: UserId) -> (i64, i64) {
        let projection = self.engine.balance(user_id).unwrap();
        (projection.available_credits, projection.reserved_credits)
    }

    /// All events recorded for a user, newest first.
    pub fn events(&self, user_id: UserId) -> Vec<ledgerd_core::CreditEvent> {
        self.engine
            .store()
            .list_events_by_user(&user_id, 100, 0)
            .unwrap()
    }
}

impl Default for TestLedger {
    fn default() -> Self {
        Self::new()
    }
}
