//! Plan grant handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use ledgerd_core::UserId;
use ledgerd_engine::{BackfillOutcome, GrantOutcome};

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Charge grant request.
#[derive(Debug, Deserialize)]
pub struct ChargeGrantRequest {
    /// The subscriber to provision.
    pub user_id: UserId,
    /// The charged plan.
    pub plan_id: String,
    /// The billing provider's charge id. Duplicate webhooks for the same
    /// charge grant at most once.
    pub charge_id: String,
}

/// Grant plan credits for a successful recurring charge.
pub async fn grant_for_charge(
    State(state): State<Arc<AppState>>,
    service_auth: ServiceAuth,
    Json(body): Json<ChargeGrantRequest>,
) -> Result<Json<GrantOutcome>, ApiError> {
    tracing::info!(
        caller = %service_auth.service_name,
        user_id = %body.user_id,
        plan_id = %body.plan_id,
        charge_id = %body.charge_id,
        "Charge grant requested"
    );

    let outcome = state
        .engine
        .grant_for_charge(body.user_id, &body.plan_id, &body.charge_id)?;
    Ok(Json(outcome))
}

/// Backfill every account holding an active subscription.
pub async fn backfill(
    State(state): State<Arc<AppState>>,
    _service_auth: ServiceAuth,
) -> Result<Json<BackfillOutcome>, ApiError> {
    let outcome = state.engine.backfill_all_active()?;
    Ok(Json(outcome))
}
