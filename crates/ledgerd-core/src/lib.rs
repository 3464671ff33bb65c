//! Core domain types for the ledgerd credit ledger.
//!
//! This crate defines accounts, reservations, credit events, plan pricing,
//! and the identifier and amount types shared by the store, engine, and
//! service crates. It performs no I/O.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod amount;
pub mod error;
pub mod event;
pub mod ids;
pub mod pricing;
pub mod reservation;

pub use account::{CreditAccount, Subscription, SubscriptionStatus};
pub use amount::{clamp_captured, normalize_credits};
pub use error::LedgerError;
pub use event::{CreditEvent, EventType};
pub use ids::{EventId, IdError, ReservationId, UserId};
pub use pricing::{Plan, PricingConfig};
pub use reservation::{CreditReservation, GenerationService, ReservationStatus};
