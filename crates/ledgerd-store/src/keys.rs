//! Key encoding utilities for `RocksDB`.

use chrono::{DateTime, Utc};
use ledgerd_core::{CreditReservation, EventId, ReservationId, UserId};

/// Create an account key from a user id.
#[must_use]
pub fn account_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create a reservation key from a reservation id.
#[must_use]
pub fn reservation_key(id: &ReservationId) -> Vec<u8> {
    id.as_str().as_bytes().to_vec()
}

/// Create a user-reservation index key.
///
/// Format: `user_id (16) || created_at_millis (8, big-endian) ||
/// reservation_id`. Big-endian millis make forward iteration yield the
/// user's reservations oldest first.
#[must_use]
pub fn user_reservation_key(
    user_id: &UserId,
    created_at: DateTime<Utc>,
    id: &ReservationId,
) -> Vec<u8> {
    let id_bytes = id.as_str().as_bytes();
    let mut key = Vec::with_capacity(24 + id_bytes.len());
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(&created_at.timestamp_millis().to_be_bytes());
    key.extend_from_slice(id_bytes);
    key
}

/// The index key for an existing reservation row.
#[must_use]
pub fn user_reservation_key_for(reservation: &CreditReservation) -> Vec<u8> {
    user_reservation_key(
        &reservation.user_id,
        reservation.created_at,
        &reservation.reservation_id,
    )
}

/// Prefix for iterating all reservations of a user.
#[must_use]
pub fn user_reservations_prefix(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Extract the reservation id from a user-reservation index key.
///
/// # Panics
///
/// Panics if the key is shorter than the 24-byte prefix or the id is not
/// valid UTF-8; both only occur on index corruption.
#[must_use]
pub fn extract_reservation_id_from_user_key(key: &[u8]) -> ReservationId {
    let id = std::str::from_utf8(&key[24..]).expect("valid reservation id bytes");
    ReservationId::new(id)
}

/// Create an event key from an idempotency key.
#[must_use]
pub fn event_key(idempotency_key: &str) -> Vec<u8> {
    idempotency_key.as_bytes().to_vec()
}

/// Create a user-event index key.
///
/// Format: `user_id (16) || event_id (16)`. ULIDs are time-ordered, so the
/// index sorts a user's events chronologically.
#[must_use]
pub fn user_event_key(user_id: &UserId, event_id: &EventId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(&event_id.to_bytes());
    key
}

/// Prefix for iterating all events of a user.
#[must_use]
pub fn user_events_prefix(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create an external-id key.
#[must_use]
pub fn external_id_key(external_id: &str) -> Vec<u8> {
    external_id.as_bytes().to_vec()
}
