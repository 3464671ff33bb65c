//! The compound write unit for one ledger operation.

use ledgerd_core::{CreditAccount, CreditEvent, CreditReservation};

/// Everything one ledger operation writes, applied atomically by
/// [`crate::Store::commit`].
#[derive(Debug, Clone)]
pub struct LedgerWrite {
    /// The account row after the operation. `None` for writes that do not
    /// touch balances, so a stale in-memory account can never clobber the
    /// stored one.
    pub account: Option<CreditAccount>,

    /// The reservation touched by the operation, if any.
    pub reservation: Option<ReservationWrite>,

    /// Bind an external request id to the reservation being written.
    pub external_id: Option<String>,

    /// The events this operation records. Empty only for writes that do not
    /// change balances (subscription upkeep).
    pub events: Vec<CreditEvent>,
}

impl LedgerWrite {
    /// A write touching only the account row.
    #[must_use]
    pub fn account_only(account: CreditAccount) -> Self {
        Self {
            account: Some(account),
            reservation: None,
            external_id: None,
            events: Vec::new(),
        }
    }

    /// A write with events but no reservation change.
    #[must_use]
    pub fn with_events(account: CreditAccount, events: Vec<CreditEvent>) -> Self {
        Self {
            account: Some(account),
            reservation: None,
            external_id: None,
            events,
        }
    }
}

/// A reservation upsert inside a [`LedgerWrite`].
#[derive(Debug, Clone)]
pub struct ReservationWrite {
    /// The full reservation row to write.
    pub reservation: CreditReservation,

    /// Whether this is an insert. New reservations must not collide with an
    /// existing id, and get an index entry.
    pub new: bool,
}

impl ReservationWrite {
    /// An insert of a freshly created reservation.
    #[must_use]
    pub fn insert(reservation: CreditReservation) -> Self {
        Self {
            reservation,
            new: true,
        }
    }

    /// An update of an existing reservation.
    #[must_use]
    pub fn update(reservation: CreditReservation) -> Self {
        Self {
            reservation,
            new: false,
        }
    }
}
