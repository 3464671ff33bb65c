//! Reservation lifecycle handlers.
//!
//! Generation backends call these before and after each paid job: reserve
//! an estimate up front, optionally bind the provider's request id, then
//! finalize with the job's terminal status. Every endpoint is safe to
//! retry.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use ledgerd_core::{GenerationService, ReservationId, UserId};
use ledgerd_engine::{FinalizeOutcome, FinalizeRequest, ReleaseAllOutcome, ReserveOutcome, ReserveRequest};

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Create reservation request.
#[derive(Debug, Deserialize)]
pub struct CreateReservationRequest {
    /// The user paying for the job.
    pub user_id: UserId,
    /// The backend running the job.
    pub service: GenerationService,
    /// The model the job will run.
    pub model_id: String,
    /// Estimated cost in credits; fractions round up.
    pub estimated_credits: f64,
    /// Caller-supplied reservation id for retry-safe creation.
    #[serde(default)]
    pub reservation_id: Option<String>,
}

/// Reserve credits ahead of a generation job.
pub async fn create_reservation(
    State(state): State<Arc<AppState>>,
    service_auth: ServiceAuth,
    Json(body): Json<CreateReservationRequest>,
) -> Result<Json<ReserveOutcome>, ApiError> {
    tracing::debug!(
        caller = %service_auth.service_name,
        user_id = %body.user_id,
        service = %body.service,
        model_id = %body.model_id,
        estimated_credits = %body.estimated_credits,
        "Reservation requested"
    );

    let outcome = state.engine.reserve(ReserveRequest {
        user_id: body.user_id,
        service: body.service,
        model_id: body.model_id,
        estimated_credits: body.estimated_credits,
        reservation_id: body.reservation_id.map(|id| ReservationId::new(&id)),
    })?;

    Ok(Json(outcome))
}

/// Attach external id request.
#[derive(Debug, Deserialize)]
pub struct AttachExternalIdRequest {
    /// The provider's request identifier.
    pub external_request_id: String,
}

/// Attach external id response.
#[derive(Debug, Serialize)]
pub struct AttachExternalIdResponse {
    /// The reservation the id was attached to.
    pub reservation_id: String,
    /// The attached id.
    pub external_request_id: String,
}

/// Bind a provider request id to a reservation.
///
/// Set-once: re-attaching the same id is a no-op, a different id is a
/// conflict.
pub async fn attach_external_id(
    State(state): State<Arc<AppState>>,
    _service_auth: ServiceAuth,
    Path(id): Path<String>,
    Json(body): Json<AttachExternalIdRequest>,
) -> Result<Json<AttachExternalIdResponse>, ApiError> {
    let reservation_id = ReservationId::new(&id);
    state
        .engine
        .attach_external_request_id(&reservation_id, &body.external_request_id)?;

    Ok(Json(AttachExternalIdResponse {
        reservation_id: reservation_id.to_string(),
        external_request_id: body.external_request_id,
    }))
}

/// Finalize request body.
#[derive(Debug, Deserialize)]
pub struct FinalizeBody {
    /// The reservation to settle.
    #[serde(default)]
    pub reservation_id: Option<String>,
    /// Alternative lookup by provider request id.
    #[serde(default)]
    pub external_request_id: Option<String>,
    /// Expected owner; mismatch is rejected.
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// Whether the job succeeded.
    pub success: bool,
    /// Actual cost reported by the provider, if known.
    #[serde(default)]
    pub actual_credits: Option<f64>,
}

/// Finalize response body.
#[derive(Debug, Serialize)]
pub struct FinalizeResponse {
    /// The settled reservation, when one resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation_id: Option<String>,
    /// "captured", "released", "noop", or "unknown".
    pub status: &'static str,
    /// Credits permanently consumed.
    pub captured_credits: i64,
    /// Credits returned to the spendable balance.
    pub released_credits: i64,
    /// Spendable balance after settlement.
    pub available_credits: i64,
    /// Held balance after settlement.
    pub reserved_credits: i64,
}

impl From<FinalizeOutcome> for FinalizeResponse {
    fn from(outcome: FinalizeOutcome) -> Self {
        Self {
            reservation_id: Some(outcome.reservation_id.to_string()),
            status: outcome.status.as_str(),
            captured_credits: outcome.captured_credits,
            released_credits: outcome.released_credits,
            available_credits: outcome.available_credits,
            reserved_credits: outcome.reserved_credits,
        }
    }
}

/// Settle a reservation once the job's outcome is known.
///
/// Success captures (clamped to the estimate, remainder refunded); failure
/// releases the full hold. Duplicate webhooks settle into no-ops, and ids
/// that resolve to nothing get a benign `"unknown"` body rather than an
/// error so blind retries terminate.
pub async fn finalize(
    State(state): State<Arc<AppState>>,
    _service_auth: ServiceAuth,
    Json(body): Json<FinalizeBody>,
) -> Result<Json<FinalizeResponse>, ApiError> {
    if body.reservation_id.is_none() && body.external_request_id.is_none() {
        return Err(ApiError::BadRequest(
            "reservation_id or external_request_id is required".into(),
        ));
    }

    let requested_id = body.reservation_id.clone();
    let outcome = state.engine.finalize(&FinalizeRequest {
        reservation_id: body.reservation_id.map(|id| ReservationId::new(&id)),
        external_request_id: body.external_request_id,
        user_id: body.user_id,
        success: body.success,
        actual_credits: body.actual_credits,
    })?;

    let response = match outcome {
        Some(outcome) => outcome.into(),
        None => FinalizeResponse {
            reservation_id: requested_id,
            status: "unknown",
            captured_credits: 0,
            released_credits: 0,
            available_credits: 0,
            reserved_credits: 0,
        },
    };

    Ok(Json(response))
}

/// Release-all request body.
#[derive(Debug, Deserialize)]
pub struct ReleaseAllRequest {
    /// The user whose open reservations are swept.
    pub user_id: UserId,
    /// Optional filter to one backend's reservations.
    #[serde(default)]
    pub service: Option<GenerationService>,
}

/// Release every open reservation for a user.
pub async fn release_all(
    State(state): State<Arc<AppState>>,
    service_auth: ServiceAuth,
    Json(body): Json<ReleaseAllRequest>,
) -> Result<Json<ReleaseAllOutcome>, ApiError> {
    tracing::info!(
        caller = %service_auth.service_name,
        user_id = %body.user_id,
        service = ?body.service,
        "Releasing all open reservations"
    );

    let outcome = state.engine.release_all_reserved(body.user_id, body.service)?;
    Ok(Json(outcome))
}
