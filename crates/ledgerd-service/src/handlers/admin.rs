//! Operator handlers: reconciliation and reserved-balance inspection.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use ledgerd_core::UserId;
use ledgerd_engine::{ReconcileReport, ReservedAccount};

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Reconcile request.
#[derive(Debug, Deserialize)]
pub struct ReconcileRequest {
    /// The account to reconcile.
    pub user_id: UserId,
}

/// Recompute a user's reserved balance from open reservations and correct
/// any drift.
pub async fn reconcile(
    State(state): State<Arc<AppState>>,
    _service_auth: ServiceAuth,
    Json(body): Json<ReconcileRequest>,
) -> Result<Json<ReconcileReport>, ApiError> {
    let report = state.engine.reconcile(body.user_id)?;
    Ok(Json(report))
}

/// Reserved accounts response.
#[derive(Debug, Serialize)]
pub struct ReservedAccountsResponse {
    /// Accounts with credits still held, in key order.
    pub accounts: Vec<ReservedAccount>,
}

/// List every account with a nonzero reserved balance.
pub async fn list_reserved(
    State(state): State<Arc<AppState>>,
    _service_auth: ServiceAuth,
) -> Result<Json<ReservedAccountsResponse>, ApiError> {
    let accounts = state.engine.list_users_with_reserved()?;
    Ok(Json(ReservedAccountsResponse { accounts }))
}
