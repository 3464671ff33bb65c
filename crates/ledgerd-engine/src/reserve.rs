//! Reservation creation.

use ledgerd_core::{
    normalize_credits, CreditEvent, CreditReservation, GenerationService, LedgerError,
    ReservationId, UserId,
};
use ledgerd_store::{LedgerWrite, ReservationWrite, StoreError};
use serde::Serialize;

use crate::idempotency;
use crate::{store_err, LedgerEngine};

/// Inputs for reserving credits ahead of a paid generation job.
#[derive(Debug, Clone)]
pub struct ReserveRequest {
    /// The user paying for the job.
    pub user_id: UserId,
    /// The provider the job will run against.
    pub service: GenerationService,
    /// The model the job targets.
    pub model_id: String,
    /// Estimated cost in credits; normalized (finite, > 0, rounded up).
    pub estimated_credits: f64,
    /// Caller-supplied reservation id; generated when absent.
    pub reservation_id: Option<ReservationId>,
}

/// The result of a reserve call.
#[derive(Debug, Clone, Serialize)]
pub struct ReserveOutcome {
    /// The reservation holding the credits.
    pub reservation_id: ReservationId,
    /// Credits held.
    pub estimated_credits: i64,
    /// Spendable balance after the hold.
    pub available_credits: i64,
    /// Reserved balance after the hold.
    pub reserved_credits: i64,
    /// True when the reservation already existed and nothing was applied.
    pub was_idempotent: bool,
}

impl LedgerEngine {
    /// Reserve credits for a paid job before it is dispatched.
    ///
    /// Atomically moves the estimate from `available` to `reserved`,
    /// inserts the reservation row, and records a `reserve` event. Calling
    /// again with the same reservation id returns the existing numbers
    /// unchanged.
    ///
    /// # Errors
    ///
    /// - `SubscriptionRequired` without an active subscription
    /// - `InvalidAmount` for a non-finite or non-positive estimate
    /// - `Forbidden` when the reservation id belongs to another user
    /// - `InsufficientCredits` when `available` cannot cover the estimate
    pub fn reserve(&self, request: ReserveRequest) -> Result<ReserveOutcome, LedgerError> {
        let mut account = self.load_or_create_account(request.user_id)?;
        if !account.has_active_subscription() {
            return Err(LedgerError::SubscriptionRequired);
        }

        let estimated = normalize_credits(request.estimated_credits)?;

        let reservation_id = request
            .reservation_id
            .clone()
            .unwrap_or_else(ReservationId::generate);

        // Idempotent replay: an existing row under this id wins outright.
        if let Some(existing) = self
            .store()
            .get_reservation(&reservation_id)
            .map_err(store_err)?
        {
            return self.replay_reserve(&existing, request.user_id);
        }

        if !account.has_available(estimated) {
            return Err(LedgerError::InsufficientCredits {
                available: account.available_credits,
                required: estimated,
            });
        }

        account.available_credits -= estimated;
        account.reserved_credits += estimated;
        account.updated_at = chrono::Utc::now();

        let reservation = CreditReservation::new(
            reservation_id.clone(),
            request.user_id,
            request.service,
            request.model_id.clone(),
            estimated,
        );

        let event = CreditEvent::reserve(
            request.user_id,
            estimated,
            account.available_credits,
            reservation_id.to_string(),
            idempotency::reserve_key(&reservation_id),
        );

        let available = account.available_credits;
        let reserved = account.reserved_credits;

        let commit = self.store().commit(LedgerWrite {
            account: Some(account),
            reservation: Some(ReservationWrite::insert(reservation)),
            external_id: None,
            events: vec![event],
        });

        match commit {
            Ok(()) => {
                tracing::info!(
                    user_id = %request.user_id,
                    reservation_id = %reservation_id,
                    service = %request.service,
                    model_id = %request.model_id,
                    estimated_credits = %estimated,
                    available_credits = %available,
                    "Credits reserved"
                );
                Ok(ReserveOutcome {
                    reservation_id,
                    estimated_credits: estimated,
                    available_credits: available,
                    reserved_credits: reserved,
                    was_idempotent: false,
                })
            }
            // Insert race: the winner's row is authoritative.
            Err(StoreError::ReservationExists { .. } | StoreError::DuplicateEvent { .. }) => {
                let winner = self
                    .store()
                    .get_reservation(&reservation_id)
                    .map_err(store_err)?
                    .ok_or_else(|| {
                        LedgerError::NotFound(format!("reservation {reservation_id}"))
                    })?;
                self.replay_reserve(&winner, request.user_id)
            }
            Err(err) => Err(store_err(err)),
        }
    }

    /// Return an existing reservation's numbers without applying anything.
    fn replay_reserve(
        &self,
        existing: &CreditReservation,
        caller: UserId,
    ) -> Result<ReserveOutcome, LedgerError> {
        if existing.user_id != caller {
            return Err(LedgerError::Forbidden);
        }
        let account = self.load_or_create_account(caller)?;
        Ok(ReserveOutcome {
            reservation_id: existing.reservation_id.clone(),
            estimated_credits: existing.estimated_credits,
            available_credits: account.available_credits,
            reserved_credits: account.reserved_credits,
            was_idempotent: true,
        })
    }
}
