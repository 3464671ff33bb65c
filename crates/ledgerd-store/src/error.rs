//! Error types for ledgerd storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind ("account", "reservation", ...).
        entity: &'static str,
        /// The missing key.
        id: String,
    },

    /// An event already exists under this idempotency key.
    #[error("duplicate event: {key}")]
    DuplicateEvent {
        /// The colliding idempotency key.
        key: String,
    },

    /// A reservation with this id already exists.
    #[error("reservation already exists: {id}")]
    ReservationExists {
        /// The colliding reservation id.
        id: String,
    },

    /// The stored reservation already reached a terminal state; a late
    /// update must not rewrite it.
    #[error("reservation already settled: {id}")]
    ReservationClosed {
        /// The settled reservation id.
        id: String,
    },

    /// The external request id is bound to a different reservation.
    #[error("external request id already bound: {external_id}")]
    ExternalIdConflict {
        /// The colliding external id.
        external_id: String,
    },
}
