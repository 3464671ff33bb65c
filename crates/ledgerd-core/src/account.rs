//! Credit account types for ledgerd.
//!
//! An account tracks a split balance: credits spendable now (`available`)
//! and credits provisionally held against open reservations (`reserved`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pricing::Plan;
use crate::UserId;

/// A prepaid-credit account for a user.
///
/// Accounts are created lazily with zero balances on first access and are
/// never deleted. The sum `available + reserved` equals everything ever
/// granted minus everything captured (captures permanently remove credits;
/// releases return them to `available`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditAccount {
    /// The user this account belongs to.
    pub user_id: UserId,

    /// Spendable credit balance. Never negative.
    pub available_credits: i64,

    /// Credits held against open reservations. Never negative.
    pub reserved_credits: i64,

    /// Current subscription, if any.
    pub subscription: Option<Subscription>,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the account was last mutated.
    pub updated_at: DateTime<Utc>,
}

impl CreditAccount {
    /// Create a new account with zero balances.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            available_credits: 0,
            reserved_credits: 0,
            subscription: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Total credits on the account, available plus reserved.
    #[must_use]
    pub const fn total_credits(&self) -> i64 {
        self.available_credits + self.reserved_credits
    }

    /// Check whether the account can cover a reservation estimate.
    #[must_use]
    pub const fn has_available(&self, credits: i64) -> bool {
        self.available_credits >= credits
    }

    /// Check if the account has an active subscription.
    #[must_use]
    pub fn has_active_subscription(&self) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(|s| s.status == SubscriptionStatus::Active)
    }

    /// The current plan, if subscribed.
    #[must_use]
    pub fn current_plan(&self) -> Option<Plan> {
        self.subscription.as_ref().map(|s| s.plan)
    }
}

/// A subscription to a billing plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    /// The subscribed plan.
    pub plan: Plan,

    /// Current status of the subscription.
    pub status: SubscriptionStatus,

    /// Start of the current billing period.
    pub current_period_start: DateTime<Utc>,

    /// End of the current billing period; the next billing date.
    pub current_period_end: DateTime<Utc>,
}

/// Status of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Subscription is active.
    Active,

    /// Subscription was cancelled (no longer grants or reserves).
    Cancelled,

    /// Payment failed, subscription is past due.
    PastDue,
}
