//! Client error types.

/// Errors that can occur when using the ledgerd client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
    },

    /// Insufficient credits for the requested reservation.
    #[error("insufficient credits: balance={balance}, required={required}")]
    InsufficientCredits {
        /// Current spendable balance.
        balance: i64,
        /// Credits the reservation needs.
        required: i64,
    },

    /// The user holds no active subscription.
    #[error("active subscription required")]
    SubscriptionRequired,

    /// The caller is not the owner of the resource.
    #[error("forbidden")]
    Forbidden,

    /// Invalid state transition or contested identifier.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
