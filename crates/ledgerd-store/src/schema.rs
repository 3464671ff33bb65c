//! Database schema definitions and column families.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Account records, keyed by `user_id`.
    pub const ACCOUNTS: &str = "accounts";

    /// Reservation records, keyed by `reservation_id`.
    pub const RESERVATIONS: &str = "reservations";

    /// Index: reservations by user, keyed by
    /// `user_id || created_at_millis || reservation_id`. Value is empty.
    pub const RESERVATIONS_BY_USER: &str = "reservations_by_user";

    /// Credit events, keyed by idempotency key.
    pub const EVENTS: &str = "events";

    /// Index: events by user, keyed by `user_id || event_id` (ULID).
    /// Value is the idempotency key.
    pub const EVENTS_BY_USER: &str = "events_by_user";

    /// External request id → reservation id.
    pub const EXTERNAL_IDS: &str = "external_ids";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::ACCOUNTS,
        cf::RESERVATIONS,
        cf::RESERVATIONS_BY_USER,
        cf::EVENTS,
        cf::EVENTS_BY_USER,
        cf::EXTERNAL_IDS,
    ]
}
