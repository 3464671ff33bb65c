//! Request and response types for the ledgerd client.

use serde::{Deserialize, Serialize};

/// Reserve credits request.
#[derive(Debug, Clone, Serialize)]
pub struct ReserveRequest {
    /// User ID paying for the job.
    pub user_id: String,
    /// The backend running the job (e.g. "fal", "replicate").
    pub service: String,
    /// The model the job will run.
    pub model_id: String,
    /// Estimated cost in credits; fractions round up.
    pub estimated_credits: f64,
    /// Caller-supplied reservation id for retry-safe creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation_id: Option<String>,
}

/// Reservation response.
#[derive(Debug, Clone, Deserialize)]
pub struct ReservationResponse {
    /// The reservation id to finalize later.
    pub reservation_id: String,
    /// The held estimate after rounding.
    pub estimated_credits: i64,
    /// Spendable balance after the hold.
    pub available_credits: i64,
    /// Held balance after the hold.
    pub reserved_credits: i64,
    /// True when an identical reservation already existed.
    pub was_idempotent: bool,
}

/// Finalize request.
#[derive(Debug, Clone, Serialize)]
pub struct FinalizeRequest {
    /// The reservation to settle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation_id: Option<String>,
    /// Alternative lookup by provider request id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_request_id: Option<String>,
    /// Expected owner; mismatch is rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Whether the job succeeded.
    pub success: bool,
    /// Actual cost reported by the provider, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_credits: Option<f64>,
}

impl FinalizeRequest {
    /// A successful finalize by reservation id with a known actual cost.
    #[must_use]
    pub fn success(reservation_id: impl Into<String>, actual_credits: f64) -> Self {
        Self {
            reservation_id: Some(reservation_id.into()),
            external_request_id: None,
            user_id: None,
            success: true,
            actual_credits: Some(actual_credits),
        }
    }

    /// A failed finalize by reservation id; the full hold is returned.
    #[must_use]
    pub fn failure(reservation_id: impl Into<String>) -> Self {
        Self {
            reservation_id: Some(reservation_id.into()),
            external_request_id: None,
            user_id: None,
            success: false,
            actual_credits: None,
        }
    }
}

/// Finalize response.
#[derive(Debug, Clone, Deserialize)]
pub struct FinalizeResponse {
    /// The settled reservation; absent when no reservation resolved.
    #[serde(default)]
    pub reservation_id: Option<String>,
    /// How the call resolved: "captured", "released", "noop" or "unknown".
    ///
    /// "unknown" means neither identifier resolved to a reservation; the
    /// server applied nothing and the call is safe to drop.
    pub status: String,
    /// Credits permanently consumed.
    pub captured_credits: i64,
    /// Credits returned to the spendable balance.
    pub released_credits: i64,
    /// Spendable balance after settlement.
    pub available_credits: i64,
    /// Held balance after settlement.
    pub reserved_credits: i64,
}

/// Release-all request.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseAllRequest {
    /// The user whose open reservations are swept.
    pub user_id: String,
    /// Optional filter to one backend's reservations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

/// Release-all response.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAllResponse {
    /// Reservations released by this sweep.
    pub released_count: usize,
    /// Credits returned by this sweep.
    pub released_credits: i64,
    /// Spendable balance after the sweep.
    pub available_credits: i64,
    /// Held balance after the sweep.
    pub reserved_credits: i64,
}

/// Charge grant request.
#[derive(Debug, Clone, Serialize)]
pub struct ChargeGrantRequest {
    /// The subscriber to provision.
    pub user_id: String,
    /// The charged plan.
    pub plan_id: String,
    /// The billing provider's charge id.
    pub charge_id: String,
}

/// Grant response.
#[derive(Debug, Clone, Deserialize)]
pub struct GrantResponse {
    /// The provisioned plan.
    pub plan: String,
    /// The plan's monthly credit allotment.
    pub granted_credits: i64,
    /// Spendable balance after the call.
    pub available_credits: i64,
    /// Held balance after the call.
    pub reserved_credits: i64,
    /// True when the grant already fired under this charge.
    pub was_idempotent: bool,
}

/// Set subscription request.
#[derive(Debug, Clone, Serialize)]
pub struct SetSubscriptionRequest {
    /// The subscriber.
    pub user_id: String,
    /// The subscribed plan.
    pub plan_id: String,
    /// Subscription status: "active", "cancelled" or "past_due".
    pub status: String,
    /// Start of the current billing period (RFC 3339).
    pub current_period_start: String,
    /// End of the current billing period (RFC 3339).
    pub current_period_end: String,
}

/// Set subscription response.
#[derive(Debug, Clone, Deserialize)]
pub struct SetSubscriptionResponse {
    /// The updated user.
    pub user_id: String,
    /// The stored plan.
    pub plan_id: String,
    /// The stored status.
    pub status: String,
}

/// Reconcile response.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileResponse {
    /// The reconciled user.
    pub user_id: String,
    /// Stored reserved balance before the run.
    pub reserved_before: i64,
    /// Reserved balance recomputed from open reservations.
    pub reserved_after: i64,
    /// Spendable balance before the run.
    pub available_before: i64,
    /// Spendable balance after the run.
    pub available_after: i64,
    /// Correction applied to the spendable balance.
    pub delta: i64,
    /// Whether the run changed anything.
    pub adjusted: bool,
}

/// Balance response (user-facing).
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceResponse {
    /// Spendable balance.
    pub available_credits: i64,
    /// Held balance.
    pub reserved_credits: i64,
    /// Available plus reserved.
    pub total_credits: i64,
    /// Whether the user holds an active subscription.
    pub has_active_subscription: bool,
    /// The subscribed plan id, if any.
    #[serde(default)]
    pub plan_id: Option<String>,
    /// End of the current billing period, if subscribed (RFC 3339).
    #[serde(default)]
    pub next_billing_date: Option<String>,
}

/// API error response body.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    /// The error payload.
    pub error: ApiErrorBody,
}

/// API error details.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Structured details, if any.
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}
