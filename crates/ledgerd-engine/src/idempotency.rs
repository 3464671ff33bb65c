//! Idempotency key derivation and replay lookup.
//!
//! Every balance-mutating operation derives its key deterministically from
//! a stable identifier of the triggering action, so replays of the same
//! external trigger always collide on the same key and become no-ops. The
//! event stored under a key is the proof the effect already ran.

use ledgerd_core::{CreditEvent, LedgerError, Plan, ReservationId, UserId};
use ledgerd_store::Store;

use crate::store_err;

/// Key for the initial hold of a reservation.
#[must_use]
pub fn reserve_key(id: &ReservationId) -> String {
    format!("reserve:{id}")
}

/// Key for the permanent consumption of a captured reservation.
#[must_use]
pub fn capture_key(id: &ReservationId) -> String {
    format!("capture:{id}")
}

/// Key for a full release of a reservation.
#[must_use]
pub fn release_key(id: &ReservationId) -> String {
    format!("release:{id}")
}

/// Key for the refunded remainder of a capture.
///
/// Distinct from [`release_key`] so a capture-with-refund composes safely
/// with the pure-release key space.
#[must_use]
pub fn refund_key(id: &ReservationId) -> String {
    format!("refund:{id}")
}

/// Key for a grant anchored to a successful charge.
#[must_use]
pub fn charge_grant_key(charge_id: &str) -> String {
    format!("subscription_grant:{charge_id}")
}

/// Key for a backfill grant.
#[must_use]
pub fn backfill_key(user_id: UserId, plan: Plan) -> String {
    format!("backfill:{user_id}:{plan}")
}

/// Key for a reconciliation adjustment over one account snapshot.
#[must_use]
pub fn reconcile_key(user_id: UserId, snapshot_millis: i64) -> String {
    format!("reconcile:{user_id}:{snapshot_millis}")
}

/// Return the prior event if the keyed effect was already applied.
///
/// # Errors
///
/// Returns `LedgerError::Store` if the lookup fails.
pub fn applied(store: &dyn Store, key: &str) -> Result<Option<CreditEvent>, LedgerError> {
    store.get_event(key).map_err(store_err)
}
