//! Client SDK for the ledgerd service.
//!
//! Generation backends use this crate to drive the reservation lifecycle:
//! reserve credits before a paid job, bind the provider's request id, and
//! finalize with the job's terminal status.
//!
//! # Example
//!
//! ```no_run
//! use ledgerd_client::{LedgerClient, ReserveRequest};
//!
//! # async fn example() -> Result<(), ledgerd_client::ClientError> {
//! let client = LedgerClient::new(
//!     "http://ledgerd.billing.svc:8080",
//!     "your-service-api-key",
//! );
//!
//! let reservation = client.reserve(ReserveRequest {
//!     user_id: "user-uuid".to_string(),
//!     service: "fal".to_string(),
//!     model_id: "flux-pro".to_string(),
//!     estimated_credits: 30.0,
//!     reservation_id: None,
//! }).await?;
//!
//! println!("Held {} credits", reservation.estimated_credits);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::{ClientOptions, LedgerClient};
pub use error::ClientError;
pub use types::*;
