//! Reserved-balance reconciliation.
//!
//! Reservation and account mutations are two separate writes; this job is
//! the backstop against any sequence that leaves them inconsistent (crash
//! between writes, partial retries). It recomputes the reserved balance
//! from the open reservations and corrects the account. Drift is an
//! expected, recoverable condition, never an error.

use ledgerd_core::{CreditEvent, LedgerError, UserId};
use ledgerd_store::{LedgerWrite, StoreError};
use serde::Serialize;

use crate::idempotency;
use crate::{store_err, LedgerEngine};

/// Before/after snapshot of one reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    /// The reconciled user.
    pub user_id: UserId,
    /// Stored reserved balance before the run.
    pub reserved_before: i64,
    /// Reserved balance recomputed from open reservations.
    pub reserved_after: i64,
    /// Spendable balance before the run.
    pub available_before: i64,
    /// Spendable balance after the run.
    pub available_after: i64,
    /// `reserved_before - reserved_after`; positive means a leak was
    /// returned to available.
    pub delta: i64,
    /// Whether the run changed anything.
    pub adjusted: bool,
}

impl LedgerEngine {
    /// Recompute a user's reserved balance from open reservations and
    /// correct any drift.
    ///
    /// A surplus (stored > computed) is returned to available; a shortfall
    /// reduces available, floored at zero. The reserved balance is always
    /// overwritten with the computed value. An `adjustment` event is
    /// recorded only on a nonzero delta, keyed by the pre-fix account
    /// snapshot so a rerun over unchanged state is a true no-op.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` if the store fails.
    pub fn reconcile(&self, user_id: UserId) -> Result<ReconcileReport, LedgerError> {
        let mut account = self.load_or_create_account(user_id)?;

        let computed: i64 = self
            .store()
            .list_open_reservations(&user_id, None)
            .map_err(store_err)?
            .iter()
            .map(|r| r.estimated_credits)
            .sum();

        let reserved_before = account.reserved_credits;
        let available_before = account.available_credits;
        let delta = reserved_before - computed;

        if delta == 0 {
            return Ok(ReconcileReport {
                user_id,
                reserved_before,
                reserved_after: computed,
                available_before,
                available_after: available_before,
                adjusted: false,
                delta: 0,
            });
        }

        let snapshot_millis = account.updated_at.timestamp_millis();

        account.available_credits = (account.available_credits + delta).max(0);
        account.reserved_credits = computed;
        account.updated_at = chrono::Utc::now();

        let event = CreditEvent::adjustment(
            user_id,
            delta.abs(),
            account.available_credits,
            idempotency::reconcile_key(user_id, snapshot_millis),
        );

        let available_after = account.available_credits;

        tracing::warn!(
            user_id = %user_id,
            reserved_before = %reserved_before,
            reserved_computed = %computed,
            delta = %delta,
            "Reserved balance drift corrected"
        );

        let commit = self
            .store()
            .commit(LedgerWrite::with_events(account, vec![event]));

        match commit {
            Ok(()) => Ok(ReconcileReport {
                user_id,
                reserved_before,
                reserved_after: computed,
                available_before,
                available_after,
                delta,
                adjusted: true,
            }),
            // A concurrent run over the same snapshot already fixed it.
            Err(StoreError::DuplicateEvent { .. }) => {
                let account = self.load_or_create_account(user_id)?;
                Ok(ReconcileReport {
                    user_id,
                    reserved_before,
                    reserved_after: account.reserved_credits,
                    available_before,
                    available_after: account.available_credits,
                    delta,
                    adjusted: false,
                })
            }
            Err(err) => Err(store_err(err)),
        }
    }
}
