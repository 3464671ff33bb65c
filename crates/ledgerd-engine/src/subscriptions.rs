//! Subscription upkeep for the billing collaborator.
//!
//! Subscription state is an input to reserve and the balance projection;
//! setting or clearing it changes no balances and writes no event.

use chrono::{DateTime, Utc};
use ledgerd_core::{LedgerError, Plan, Subscription, SubscriptionStatus, UserId};
use ledgerd_store::LedgerWrite;

use crate::{store_err, LedgerEngine};

impl LedgerEngine {
    /// Set or replace a user's subscription.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPlan` for an unknown plan id.
    pub fn set_subscription(
        &self,
        user_id: UserId,
        plan_id: &str,
        status: SubscriptionStatus,
        current_period_start: DateTime<Utc>,
        current_period_end: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let plan: Plan = plan_id.parse()?;

        let mut account = self.load_or_create_account(user_id)?;
        account.subscription = Some(Subscription {
            plan,
            status,
            current_period_start,
            current_period_end,
        });
        account.updated_at = Utc::now();

        self.store()
            .commit(LedgerWrite::account_only(account))
            .map_err(store_err)?;

        tracing::info!(user_id = %user_id, plan = %plan, ?status, "Subscription updated");
        Ok(())
    }

    /// Remove a user's subscription.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` if the store fails.
    pub fn clear_subscription(&self, user_id: UserId) -> Result<(), LedgerError> {
        let mut account = self.load_or_create_account(user_id)?;
        if account.subscription.is_none() {
            return Ok(());
        }
        account.subscription = None;
        account.updated_at = Utc::now();

        self.store()
            .commit(LedgerWrite::account_only(account))
            .map_err(store_err)?;

        tracing::info!(user_id = %user_id, "Subscription cleared");
        Ok(())
    }
}
