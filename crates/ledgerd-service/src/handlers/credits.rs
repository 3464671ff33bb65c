//! Credit balance and event history handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use ledgerd_core::{CreditEvent, EventType};
use ledgerd_engine::BalanceProjection;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Get the current credit balance.
///
/// Users without an account yet see zero balances, not a 404; accounts are
/// created lazily on the first grant or subscription write.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<BalanceProjection>, ApiError> {
    let projection = state.engine.balance(auth.user_id)?;
    Ok(Json(projection))
}

/// Event list query parameters.
#[derive(Debug, Deserialize)]
pub struct ListEventsQuery {
    /// Maximum number of events to return (default: 50).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

/// Event response.
#[derive(Debug, Serialize)]
pub struct EventResponse {
    /// Event ID.
    pub id: String,
    /// What happened.
    pub event_type: EventType,
    /// Credits moved by the event (always positive).
    pub credits: i64,
    /// Available balance after the event.
    pub balance_after: i64,
    /// What the event references (reservation, charge, ...).
    pub reference_type: String,
    /// Identifier of the referenced entity.
    pub reference_id: String,
    /// Timestamp.
    pub created_at: String,
}

impl From<&CreditEvent> for EventResponse {
    fn from(event: &CreditEvent) -> Self {
        Self {
            id: event.id.to_string(),
            event_type: event.event_type,
            credits: event.credits,
            balance_after: event.balance_after,
            reference_type: event.reference_type.clone(),
            reference_id: event.reference_id.clone(),
            created_at: event.created_at.to_rfc3339(),
        }
    }
}

/// List events response.
#[derive(Debug, Serialize)]
pub struct ListEventsResponse {
    /// Events (newest first).
    pub events: Vec<EventResponse>,
    /// Whether there are more events.
    pub has_more: bool,
}

/// List the credit event history, newest first.
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<ListEventsQuery>,
) -> Result<Json<ListEventsResponse>, ApiError> {
    // Fetch one more than requested to determine has_more
    let limit = query.limit.min(100);
    let events = state
        .engine
        .store()
        .list_events_by_user(&auth.user_id, limit + 1, query.offset)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let has_more = events.len() > limit;
    let events: Vec<_> = events.iter().take(limit).map(EventResponse::from).collect();

    Ok(Json(ListEventsResponse { events, has_more }))
}
