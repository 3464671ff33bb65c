//! HTTP API service for the ledgerd credit ledger.
//!
//! Exposes the reservation lifecycle, plan grants, subscription upkeep and
//! reconciliation over an Axum router. Generation backends authenticate
//! with a service API key; end users with a bearer token.

#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
