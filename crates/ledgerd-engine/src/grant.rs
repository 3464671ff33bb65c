//! Plan credit grants.
//!
//! A grant always re-provisions the account to the plan's fixed monthly
//! allotment (`available = plan credits`, `reserved = 0`) rather than
//! adding to the prior balance, so missed or duplicated billing cycles can
//! never compound credits.

use ledgerd_core::{CreditEvent, LedgerError, Plan, UserId};
use ledgerd_store::{LedgerWrite, StoreError};
use serde::Serialize;

use crate::idempotency;
use crate::{store_err, LedgerEngine};

/// The result of a grant call.
#[derive(Debug, Clone, Serialize)]
pub struct GrantOutcome {
    /// The plan that was provisioned.
    pub plan: Plan,
    /// The plan's monthly credit allotment.
    pub granted_credits: i64,
    /// Spendable balance after the call.
    pub available_credits: i64,
    /// Reserved balance after the call.
    pub reserved_credits: i64,
    /// True when the grant already fired under this key.
    pub was_idempotent: bool,
}

/// Summary of a backfill run over all active subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct BackfillOutcome {
    /// Accounts examined.
    pub subscribers: usize,
    /// Accounts newly provisioned by this run.
    pub granted: usize,
    /// Accounts whose backfill key had already fired.
    pub already_granted: usize,
}

impl LedgerEngine {
    /// Apply a plan grant under a caller-derived idempotency key.
    ///
    /// Replays under an existing key return the current balances unchanged
    /// with `was_idempotent = true`; a grant that already fired never adds
    /// more credits.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPlan` for an unknown plan id.
    pub fn grant_plan_credits(
        &self,
        user_id: UserId,
        plan_id: &str,
        idempotency_key: &str,
        reference_type: &str,
        reference_id: &str,
    ) -> Result<GrantOutcome, LedgerError> {
        let plan: Plan = plan_id.parse()?;
        let granted = self.pricing().plan_credits(plan);

        if idempotency::applied(self.store().as_ref(), idempotency_key)?.is_some() {
            return self.replay_grant(user_id, plan, granted);
        }

        let mut account = self.load_or_create_account(user_id)?;
        account.available_credits = granted;
        account.reserved_credits = 0;
        account.updated_at = chrono::Utc::now();

        let event = CreditEvent::grant(
            user_id,
            granted,
            account.available_credits,
            reference_type,
            reference_id,
            idempotency_key,
        );

        let commit = self
            .store()
            .commit(LedgerWrite::with_events(account, vec![event]));

        match commit {
            Ok(()) => {
                tracing::info!(
                    user_id = %user_id,
                    plan = %plan,
                    granted_credits = %granted,
                    reference_type = %reference_type,
                    reference_id = %reference_id,
                    "Plan credits granted"
                );
                Ok(GrantOutcome {
                    plan,
                    granted_credits: granted,
                    available_credits: granted,
                    reserved_credits: 0,
                    was_idempotent: false,
                })
            }
            Err(StoreError::DuplicateEvent { .. }) => self.replay_grant(user_id, plan, granted),
            Err(err) => Err(store_err(err)),
        }
    }

    /// Grant anchored to a successful recurring charge.
    ///
    /// The charge id is the idempotency anchor: at most one grant per
    /// charge, regardless of webhook retries.
    ///
    /// # Errors
    ///
    /// Same as [`Self::grant_plan_credits`].
    pub fn grant_for_charge(
        &self,
        user_id: UserId,
        plan_id: &str,
        charge_id: &str,
    ) -> Result<GrantOutcome, LedgerError> {
        self.grant_plan_credits(
            user_id,
            plan_id,
            &idempotency::charge_grant_key(charge_id),
            "charge",
            charge_id,
        )
    }

    /// One-off backfill grant for a subscriber.
    ///
    /// # Errors
    ///
    /// Same as [`Self::grant_plan_credits`].
    pub fn grant_backfill(&self, user_id: UserId, plan_id: &str) -> Result<GrantOutcome, LedgerError> {
        let plan: Plan = plan_id.parse()?;
        self.grant_plan_credits(
            user_id,
            plan_id,
            &idempotency::backfill_key(user_id, plan),
            "backfill",
            plan.as_str(),
        )
    }

    /// Backfill every account holding an active subscription.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` if the store fails.
    pub fn backfill_all_active(&self) -> Result<BackfillOutcome, LedgerError> {
        let subscribers = self
            .store()
            .list_accounts_with_active_subscription()
            .map_err(store_err)?;

        let mut granted = 0;
        let mut already_granted = 0;
        let total = subscribers.len();

        for account in subscribers {
            let Some(plan) = account.current_plan() else {
                continue;
            };
            let outcome = self.grant_backfill(account.user_id, plan.as_str())?;
            if outcome.was_idempotent {
                already_granted += 1;
            } else {
                granted += 1;
            }
        }

        tracing::info!(
            subscribers = %total,
            granted = %granted,
            already_granted = %already_granted,
            "Backfill completed"
        );

        Ok(BackfillOutcome {
            subscribers: total,
            granted,
            already_granted,
        })
    }

    /// Replay: the grant already fired; report current balances.
    fn replay_grant(
        &self,
        user_id: UserId,
        plan: Plan,
        granted: i64,
    ) -> Result<GrantOutcome, LedgerError> {
        let account = self.load_or_create_account(user_id)?;
        Ok(GrantOutcome {
            plan,
            granted_credits: granted,
            available_credits: account.available_credits,
            reserved_credits: account.reserved_credits,
            was_idempotent: true,
        })
    }
}
