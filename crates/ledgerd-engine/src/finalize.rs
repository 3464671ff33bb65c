//! Reservation finalization: capture, release, external-id linking, and the
//! administrative release sweep.

use ledgerd_core::{
    clamp_captured, normalize_credits, CreditAccount, CreditEvent, CreditReservation,
    GenerationService, LedgerError, ReservationId, ReservationStatus, UserId,
};
use ledgerd_store::{LedgerWrite, ReservationWrite, StoreError};
use serde::Serialize;

use crate::idempotency;
use crate::{store_err, LedgerEngine};

/// Inputs for finalizing a reservation.
///
/// The reservation is located by whichever identifier is supplied; when
/// neither resolves, there is nothing to finalize and the call returns
/// `None` rather than erroring (duplicate and out-of-order deliveries are
/// expected).
#[derive(Debug, Clone)]
pub struct FinalizeRequest {
    /// Locate by reservation id.
    pub reservation_id: Option<ReservationId>,
    /// Locate by the downstream job id.
    pub external_request_id: Option<String>,
    /// When supplied, must match the reservation's owner.
    pub user_id: Option<UserId>,
    /// Whether the job succeeded.
    pub success: bool,
    /// Reported actual usage; clamped into `[1, estimated]` on capture.
    pub actual_credits: Option<f64>,
}

/// How a finalize call resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeStatus {
    /// Credits were captured by this call.
    Captured,
    /// Credits were released by this call.
    Released,
    /// The reservation was already terminal; nothing was applied.
    Noop,
}

impl FinalizeStatus {
    /// The wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Captured => "captured",
            Self::Released => "released",
            Self::Noop => "noop",
        }
    }
}

/// The result of a finalize call.
#[derive(Debug, Clone, Serialize)]
pub struct FinalizeOutcome {
    /// The reservation that was finalized.
    pub reservation_id: ReservationId,
    /// Whether this call captured, released, or replayed.
    pub status: FinalizeStatus,
    /// Credits permanently consumed.
    pub captured_credits: i64,
    /// Credits returned to available.
    pub released_credits: i64,
    /// Spendable balance after the call.
    pub available_credits: i64,
    /// Reserved balance after the call.
    pub reserved_credits: i64,
}

/// The result of an administrative release sweep.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseAllOutcome {
    /// Reservations released by the sweep.
    pub released_count: usize,
    /// Total credits returned to available.
    pub released_credits: i64,
    /// Spendable balance after the sweep.
    pub available_credits: i64,
    /// Reserved balance after the sweep.
    pub reserved_credits: i64,
}

impl LedgerEngine {
    /// Attach the downstream job id to a reservation.
    ///
    /// Set-once: attaching the same id again is a silent no-op.
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown reservation
    /// - `Conflict` when a different external id is already attached, the
    ///   id is bound to another reservation, or the reservation settled
    ///   before the id could be attached
    pub fn attach_external_request_id(
        &self,
        reservation_id: &ReservationId,
        external_id: &str,
    ) -> Result<(), LedgerError> {
        let mut reservation = self
            .store()
            .get_reservation(reservation_id)
            .map_err(store_err)?
            .ok_or_else(|| LedgerError::NotFound(format!("reservation {reservation_id}")))?;

        if !reservation.attach_external_id(external_id)? {
            return Ok(());
        }

        // No balance changes here; the write carries no account row so a
        // concurrent finalize cannot be undone by this commit.
        let commit = self.store().commit(LedgerWrite {
            account: None,
            reservation: Some(ReservationWrite::update(reservation)),
            external_id: Some(external_id.to_string()),
            events: vec![],
        });

        match commit {
            Ok(()) => Ok(()),
            Err(StoreError::ExternalIdConflict { external_id }) => Err(LedgerError::Conflict(
                format!("external request id {external_id} is bound to another reservation"),
            )),
            // The reservation settled inside our read-commit window. The
            // settled row is authoritative; only report success if the id
            // made it on before settlement.
            Err(StoreError::ReservationClosed { .. }) => {
                let settled = self
                    .store()
                    .get_reservation(reservation_id)
                    .map_err(store_err)?
                    .ok_or_else(|| {
                        LedgerError::NotFound(format!("reservation {reservation_id}"))
                    })?;
                if settled.external_request_id.as_deref() == Some(external_id) {
                    Ok(())
                } else {
                    Err(LedgerError::Conflict(format!(
                        "reservation {reservation_id} is already settled"
                    )))
                }
            }
            Err(err) => Err(store_err(err)),
        }
    }

    /// Finalize a reservation once the job's terminal status is known.
    ///
    /// Returns `Ok(None)` when neither identifier resolves. An already
    /// terminal reservation returns the previously-recorded outcome with
    /// status `Noop` and no mutation.
    ///
    /// # Errors
    ///
    /// - `Forbidden` when `user_id` disagrees with the reservation's owner
    /// - `InvalidAmount` when a supplied `actual_credits` is non-finite or
    ///   non-positive
    pub fn finalize(
        &self,
        request: &FinalizeRequest,
    ) -> Result<Option<FinalizeOutcome>, LedgerError> {
        let Some(reservation) = self.resolve(request)? else {
            return Ok(None);
        };

        if let Some(user_id) = request.user_id {
            if user_id != reservation.user_id {
                return Err(LedgerError::Forbidden);
            }
        }

        if reservation.is_terminal() {
            return Ok(Some(self.noop_outcome(&reservation)?));
        }

        let account = self.load_or_create_account(reservation.user_id)?;
        let outcome = if request.success {
            let requested = match request.actual_credits {
                Some(actual) => normalize_credits(actual)?,
                None => reservation.estimated_credits,
            };
            self.capture(account, reservation, requested)?
        } else {
            self.release(account, reservation)?
        };

        Ok(Some(outcome))
    }

    /// Release every open reservation for a user, oldest first.
    ///
    /// Administrative sweep for jobs that died without reporting a terminal
    /// status. Each release applies exactly as the failure path of
    /// [`Self::finalize`].
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` if the store fails.
    pub fn release_all_reserved(
        &self,
        user_id: UserId,
        service: Option<GenerationService>,
    ) -> Result<ReleaseAllOutcome, LedgerError> {
        let open = self
            .store()
            .list_open_reservations(&user_id, service)
            .map_err(store_err)?;

        let mut released_count = 0;
        let mut released_credits = 0;

        for reservation in open {
            let account = self.load_or_create_account(user_id)?;
            let estimated = reservation.estimated_credits;
            match self.release(account, reservation) {
                Ok(outcome) if outcome.status == FinalizeStatus::Released => {
                    released_count += 1;
                    released_credits += estimated;
                }
                Ok(_) => {}
                // Lost a race against a concurrent finalize; that release
                // already returned the credits.
                Err(LedgerError::Conflict(_)) => {}
                Err(err) => return Err(err),
            }
        }

        let account = self.load_or_create_account(user_id)?;
        tracing::info!(
            user_id = %user_id,
            released_count = %released_count,
            released_credits = %released_credits,
            "Released all reserved credits"
        );

        Ok(ReleaseAllOutcome {
            released_count,
            released_credits,
            available_credits: account.available_credits,
            reserved_credits: account.reserved_credits,
        })
    }

    fn resolve(
        &self,
        request: &FinalizeRequest,
    ) -> Result<Option<CreditReservation>, LedgerError> {
        if let Some(id) = &request.reservation_id {
            if let Some(reservation) = self.store().get_reservation(id).map_err(store_err)? {
                return Ok(Some(reservation));
            }
        }
        if let Some(external_id) = &request.external_request_id {
            return self
                .store()
                .get_reservation_by_external_id(external_id)
                .map_err(store_err);
        }
        Ok(None)
    }

    /// The previously-recorded outcome of a terminal reservation.
    fn noop_outcome(
        &self,
        reservation: &CreditReservation,
    ) -> Result<FinalizeOutcome, LedgerError> {
        let account = self.load_or_create_account(reservation.user_id)?;
        let (captured, released) = match reservation.status {
            ReservationStatus::Captured => {
                let captured = reservation.actual_credits.unwrap_or(0);
                (captured, reservation.estimated_credits - captured)
            }
            ReservationStatus::Released => (0, reservation.estimated_credits),
            ReservationStatus::Reserved => (0, 0),
        };
        Ok(FinalizeOutcome {
            reservation_id: reservation.reservation_id.clone(),
            status: FinalizeStatus::Noop,
            captured_credits: captured,
            released_credits: released,
            available_credits: account.available_credits,
            reserved_credits: account.reserved_credits,
        })
    }

    /// Success path: consume `captured` permanently, refund the remainder.
    fn capture(
        &self,
        mut account: CreditAccount,
        reservation: CreditReservation,
        requested: i64,
    ) -> Result<FinalizeOutcome, LedgerError> {
        let estimated = reservation.estimated_credits;
        let captured = clamp_captured(requested, estimated);
        let refund = estimated - captured;
        let user_id = reservation.user_id;
        let reservation_id = reservation.reservation_id.clone();

        account.reserved_credits = (account.reserved_credits - estimated).max(0);
        account.available_credits += refund;
        account.updated_at = chrono::Utc::now();

        let reservation = reservation.capture(captured, account.updated_at)?;

        let mut events = vec![CreditEvent::capture(
            user_id,
            captured,
            account.available_credits,
            reservation_id.to_string(),
            idempotency::capture_key(&reservation_id),
        )];
        if refund > 0 {
            events.push(CreditEvent::release(
                user_id,
                refund,
                account.available_credits,
                reservation_id.to_string(),
                idempotency::refund_key(&reservation_id),
            ));
        }

        let available = account.available_credits;
        let reserved = account.reserved_credits;

        let commit = self.store().commit(LedgerWrite {
            account: Some(account),
            reservation: Some(ReservationWrite::update(reservation)),
            external_id: None,
            events,
        });

        match commit {
            Ok(()) => {
                tracing::info!(
                    user_id = %user_id,
                    reservation_id = %reservation_id,
                    captured_credits = %captured,
                    refunded_credits = %refund,
                    "Reservation captured"
                );
                Ok(FinalizeOutcome {
                    reservation_id,
                    status: FinalizeStatus::Captured,
                    captured_credits: captured,
                    released_credits: refund,
                    available_credits: available,
                    reserved_credits: reserved,
                })
            }
            Err(StoreError::DuplicateEvent { .. } | StoreError::ReservationClosed { .. }) => {
                self.replay_terminal(&reservation_id)
            }
            Err(err) => Err(store_err(err)),
        }
    }

    /// Failure path: return the full estimate to available.
    fn release(
        &self,
        mut account: CreditAccount,
        reservation: CreditReservation,
    ) -> Result<FinalizeOutcome, LedgerError> {
        let estimated = reservation.estimated_credits;
        let user_id = reservation.user_id;
        let reservation_id = reservation.reservation_id.clone();

        account.available_credits += estimated;
        account.reserved_credits = (account.reserved_credits - estimated).max(0);
        account.updated_at = chrono::Utc::now();

        let reservation = reservation.release(account.updated_at)?;

        let event = CreditEvent::release(
            user_id,
            estimated,
            account.available_credits,
            reservation_id.to_string(),
            idempotency::release_key(&reservation_id),
        );

        let available = account.available_credits;
        let reserved = account.reserved_credits;

        let commit = self.store().commit(LedgerWrite {
            account: Some(account),
            reservation: Some(ReservationWrite::update(reservation)),
            external_id: None,
            events: vec![event],
        });

        match commit {
            Ok(()) => {
                tracing::info!(
                    user_id = %user_id,
                    reservation_id = %reservation_id,
                    released_credits = %estimated,
                    "Reservation released"
                );
                Ok(FinalizeOutcome {
                    reservation_id,
                    status: FinalizeStatus::Released,
                    captured_credits: 0,
                    released_credits: estimated,
                    available_credits: available,
                    reserved_credits: reserved,
                })
            }
            Err(StoreError::DuplicateEvent { .. } | StoreError::ReservationClosed { .. }) => {
                self.replay_terminal(&reservation_id)
            }
            Err(err) => Err(store_err(err)),
        }
    }

    /// Lost a finalize race: report the winner's outcome.
    fn replay_terminal(&self, reservation_id: &ReservationId) -> Result<FinalizeOutcome, LedgerError> {
        let winner = self
            .store()
            .get_reservation(reservation_id)
            .map_err(store_err)?
            .ok_or_else(|| LedgerError::NotFound(format!("reservation {reservation_id}")))?;
        self.noop_outcome(&winner)
    }
}
