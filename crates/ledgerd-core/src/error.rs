//! Domain error types for ledgerd.

/// Errors surfaced by ledger operations.
///
/// Idempotent replays and terminal-state finalizations are not errors; they
/// return the previously-recorded outcome with a distinguishing flag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// A credit amount was non-finite or non-positive.
    #[error("invalid credit amount: {0}")]
    InvalidAmount(String),

    /// The operation requires an active subscription.
    #[error("an active subscription is required")]
    SubscriptionRequired,

    /// The account cannot cover the requested reservation.
    #[error("insufficient credits: available={available}, required={required}")]
    InsufficientCredits {
        /// Spendable balance at the time of the attempt.
        available: i64,
        /// Credits the operation needed.
        required: i64,
    },

    /// The caller does not own the referenced reservation.
    #[error("forbidden: reservation belongs to a different user")]
    Forbidden,

    /// The referenced reservation or plan does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// An external request id reassignment or invalid state transition.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The plan id is not a known plan.
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    /// The underlying store failed.
    #[error("store error: {0}")]
    Store(String),
}
