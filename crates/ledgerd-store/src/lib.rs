//! `RocksDB` storage layer for ledgerd.
//!
//! This crate provides persistent storage for credit accounts, reservations,
//! and credit events using `RocksDB` with column families for indexing.
//!
//! # Architecture
//!
//! The storage uses the following column families:
//!
//! - `accounts`: account records, keyed by `user_id`
//! - `reservations`: reservation records, keyed by `reservation_id`
//! - `reservations_by_user`: index for listing a user's reservations oldest
//!   first
//! - `events`: credit events, keyed by idempotency key — keying the primary
//!   record by the idempotency key is itself the uniqueness constraint
//! - `events_by_user`: index for listing a user's events in time order
//! - `external_ids`: external request id → reservation id, enforcing the
//!   at-most-one-holder rule
//!
//! All writes belonging to one ledger operation go through
//! [`Store::commit`], which re-checks the operation's uniqueness guards and
//! applies everything in a single `WriteBatch`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;
pub mod write;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;
pub use write::{LedgerWrite, ReservationWrite};

use ledgerd_core::{
    CreditAccount, CreditEvent, CreditReservation, GenerationService, ReservationId, UserId,
};

/// The storage trait defining all ledger database operations.
///
/// This trait abstracts the storage layer so the engine can run against
/// different backends. It is object safe; the engine holds an
/// `Arc<dyn Store>`.
pub trait Store: Send + Sync {
    // =========================================================================
    // Accounts
    // =========================================================================

    /// Insert or update an account record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_account(&self, account: &CreditAccount) -> Result<()>;

    /// Get an account by user id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_account(&self, user_id: &UserId) -> Result<Option<CreditAccount>>;

    /// List accounts with a nonzero reserved balance.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_accounts_with_reserved(&self) -> Result<Vec<CreditAccount>>;

    /// List accounts holding an active subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_accounts_with_active_subscription(&self) -> Result<Vec<CreditAccount>>;

    // =========================================================================
    // Reservations
    // =========================================================================

    /// Get a reservation by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_reservation(&self, id: &ReservationId) -> Result<Option<CreditReservation>>;

    /// Resolve a reservation through its attached external request id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_reservation_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<CreditReservation>>;

    /// List a user's still-open reservations, oldest first, optionally
    /// filtered by service.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_open_reservations(
        &self,
        user_id: &UserId,
        service: Option<GenerationService>,
    ) -> Result<Vec<CreditReservation>>;

    // =========================================================================
    // Events
    // =========================================================================

    /// Look up a credit event by its idempotency key.
    ///
    /// A `Some` result is proof the keyed effect was already applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_event(&self, idempotency_key: &str) -> Result<Option<CreditEvent>>;

    /// List a user's events, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_events_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditEvent>>;

    // =========================================================================
    // Compound commit
    // =========================================================================

    /// Atomically apply one ledger operation's writes.
    ///
    /// Re-checks the operation's uniqueness guards inside the write path:
    ///
    /// - no event may already exist under any of the write's idempotency
    ///   keys (`DuplicateEvent`)
    /// - a reservation marked `new` must not already exist
    ///   (`ReservationExists`)
    /// - a reservation update must find the stored row still open; settled
    ///   rows are immutable (`ReservationClosed`)
    /// - an external-id binding must be free or already point at the same
    ///   reservation (`ExternalIdConflict`)
    ///
    /// # Errors
    ///
    /// Returns the guard errors above, or a database error.
    fn commit(&self, write: LedgerWrite) -> Result<()>;
}
