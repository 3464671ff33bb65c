//! Application state.

use std::sync::Arc;

use ledgerd_engine::LedgerEngine;
use ledgerd_store::Store;

use crate::config::ServiceConfig;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The ledger engine over the storage backend.
    pub engine: LedgerEngine,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        if config.service_api_key.is_none() {
            tracing::warn!("SERVICE_API_KEY not configured - service endpoints will reject all requests");
        }

        let engine = LedgerEngine::new(store, config.pricing.clone());
        Self { engine, config }
    }
}
