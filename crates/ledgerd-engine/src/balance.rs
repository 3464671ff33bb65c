//! Read-only balance projections.

use chrono::{DateTime, Utc};
use ledgerd_core::{LedgerError, UserId};
use serde::Serialize;

use crate::{store_err, LedgerEngine};

/// The dashboard view of an account: balances joined with subscription
/// status. Defaults to zero balances when no account exists yet.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceProjection {
    /// Spendable balance.
    pub available_credits: i64,
    /// Credits held against open reservations.
    pub reserved_credits: i64,
    /// Available plus reserved.
    pub total_credits: i64,
    /// Whether the user holds an active subscription.
    pub has_active_subscription: bool,
    /// The subscribed plan id, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    /// End of the current billing period, if subscribed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_billing_date: Option<DateTime<Utc>>,
}

/// An operator-view row for accounts with credits still held.
#[derive(Debug, Clone, Serialize)]
pub struct ReservedAccount {
    /// The account's user.
    pub user_id: UserId,
    /// Spendable balance.
    pub available_credits: i64,
    /// Held balance.
    pub reserved_credits: i64,
}

impl LedgerEngine {
    /// The balance projection for a user.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` if the store fails.
    pub fn balance(&self, user_id: UserId) -> Result<BalanceProjection, LedgerError> {
        let account = self.store().get_account(&user_id).map_err(store_err)?;

        let Some(account) = account else {
            return Ok(BalanceProjection {
                available_credits: 0,
                reserved_credits: 0,
                total_credits: 0,
                has_active_subscription: false,
                plan_id: None,
                next_billing_date: None,
            });
        };

        let subscription = account.subscription.as_ref();
        Ok(BalanceProjection {
            available_credits: account.available_credits,
            reserved_credits: account.reserved_credits,
            total_credits: account.total_credits(),
            has_active_subscription: account.has_active_subscription(),
            plan_id: subscription.map(|s| s.plan.as_str().to_string()),
            next_billing_date: subscription.map(|s| s.current_period_end),
        })
    }

    /// All accounts with a nonzero reserved balance.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Store` if the store fails.
    pub fn list_users_with_reserved(&self) -> Result<Vec<ReservedAccount>, LedgerError> {
        let accounts = self
            .store()
            .list_accounts_with_reserved()
            .map_err(store_err)?;

        Ok(accounts
            .into_iter()
            .map(|account| ReservedAccount {
                user_id: account.user_id,
                available_credits: account.available_credits,
                reserved_credits: account.reserved_credits,
            })
            .collect())
    }
}
