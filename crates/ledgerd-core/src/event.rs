//! Credit event types for ledgerd.
//!
//! Every state-changing effect on an account appends exactly one credit
//! event. The event's idempotency key is globally unique, and its presence
//! is the single source of truth that the keyed effect already ran. Events
//! are never updated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EventId, UserId};

/// An append-only audit record of one balance-changing effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditEvent {
    /// Unique event id (ULID for time-ordering).
    pub id: EventId,

    /// The user whose balance changed.
    pub user_id: UserId,

    /// What kind of effect this records.
    pub event_type: EventType,

    /// Magnitude of the effect in credits. Always positive; the type
    /// determines direction.
    pub credits: i64,

    /// Available balance after the effect.
    pub balance_after: i64,

    /// Kind of entity the event references ("reservation", "charge", ...).
    pub reference_type: String,

    /// Id of the referenced entity.
    pub reference_id: String,

    /// Globally unique key deduplicating the triggering action.
    pub idempotency_key: String,

    /// When the event was recorded.
    pub created_at: DateTime<Utc>,
}

impl CreditEvent {
    fn record(
        user_id: UserId,
        event_type: EventType,
        credits: i64,
        balance_after: i64,
        reference_type: impl Into<String>,
        reference_id: impl Into<String>,
        idempotency_key: impl Into<String>,
    ) -> Self {
        Self {
            id: EventId::generate(),
            user_id,
            event_type,
            credits,
            balance_after,
            reference_type: reference_type.into(),
            reference_id: reference_id.into(),
            idempotency_key: idempotency_key.into(),
            created_at: Utc::now(),
        }
    }

    /// A plan grant resetting the account to its monthly allotment.
    #[must_use]
    pub fn grant(
        user_id: UserId,
        credits: i64,
        balance_after: i64,
        reference_type: impl Into<String>,
        reference_id: impl Into<String>,
        idempotency_key: impl Into<String>,
    ) -> Self {
        Self::record(
            user_id,
            EventType::Grant,
            credits,
            balance_after,
            reference_type,
            reference_id,
            idempotency_key,
        )
    }

    /// Credits moved from available into reserve.
    #[must_use]
    pub fn reserve(
        user_id: UserId,
        credits: i64,
        balance_after: i64,
        reservation_id: impl Into<String>,
        idempotency_key: impl Into<String>,
    ) -> Self {
        Self::record(
            user_id,
            EventType::Reserve,
            credits,
            balance_after,
            "reservation",
            reservation_id,
            idempotency_key,
        )
    }

    /// Credits permanently consumed by a successful job.
    #[must_use]
    pub fn capture(
        user_id: UserId,
        credits: i64,
        balance_after: i64,
        reservation_id: impl Into<String>,
        idempotency_key: impl Into<String>,
    ) -> Self {
        Self::record(
            user_id,
            EventType::Capture,
            credits,
            balance_after,
            "reservation",
            reservation_id,
            idempotency_key,
        )
    }

    /// Reserved credits returned to available.
    #[must_use]
    pub fn release(
        user_id: UserId,
        credits: i64,
        balance_after: i64,
        reservation_id: impl Into<String>,
        idempotency_key: impl Into<String>,
    ) -> Self {
        Self::record(
            user_id,
            EventType::Release,
            credits,
            balance_after,
            "reservation",
            reservation_id,
            idempotency_key,
        )
    }

    /// A reconciliation correction. `credits` carries the absolute delta.
    #[must_use]
    pub fn adjustment(
        user_id: UserId,
        credits: i64,
        balance_after: i64,
        idempotency_key: impl Into<String>,
    ) -> Self {
        Self::record(
            user_id,
            EventType::Adjustment,
            credits,
            balance_after,
            "account",
            user_id.to_string(),
            idempotency_key,
        )
    }
}

/// Kind of balance-changing effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Plan credits provisioned.
    Grant,

    /// Credits moved from available into reserve.
    Reserve,

    /// Reserved credits permanently consumed.
    Capture,

    /// Reserved credits returned to available.
    Release,

    /// Reconciliation corrected drift between account and reservations.
    Adjustment,
}
