//! Subscription upkeep handlers.
//!
//! The billing webhook consumer mirrors subscription state here; it gates
//! reservations and feeds the balance projection but moves no credits.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ledgerd_core::{SubscriptionStatus, UserId};

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Set subscription request.
#[derive(Debug, Deserialize)]
pub struct SetSubscriptionRequest {
    /// The subscriber.
    pub user_id: UserId,
    /// The subscribed plan.
    pub plan_id: String,
    /// Current subscription status.
    pub status: SubscriptionStatus,
    /// Start of the current billing period.
    pub current_period_start: DateTime<Utc>,
    /// End of the current billing period.
    pub current_period_end: DateTime<Utc>,
}

/// Set subscription response.
#[derive(Debug, Serialize)]
pub struct SetSubscriptionResponse {
    /// The updated user.
    pub user_id: UserId,
    /// The stored plan.
    pub plan_id: String,
    /// The stored status.
    pub status: SubscriptionStatus,
}

/// Set or replace a user's subscription.
pub async fn set_subscription(
    State(state): State<Arc<AppState>>,
    _service_auth: ServiceAuth,
    Json(body): Json<SetSubscriptionRequest>,
) -> Result<Json<SetSubscriptionResponse>, ApiError> {
    state.engine.set_subscription(
        body.user_id,
        &body.plan_id,
        body.status,
        body.current_period_start,
        body.current_period_end,
    )?;

    Ok(Json(SetSubscriptionResponse {
        user_id: body.user_id,
        plan_id: body.plan_id,
        status: body.status,
    }))
}
