//! Plan pricing for ledgerd.
//!
//! Plans carry a fixed monthly price; the credit rate converts that price
//! into the plan's monthly credit allotment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LedgerError;

/// Available billing plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    /// Basic plan: $10/month.
    Basic,

    /// Standard plan: $25/month.
    Standard,

    /// Pro plan: $60/month.
    Pro,
}

impl Plan {
    /// The monthly price in cents.
    #[must_use]
    pub const fn monthly_price_cents(&self) -> i64 {
        match self {
            Self::Basic => 1_000,
            Self::Standard => 2_500,
            Self::Pro => 6_000,
        }
    }

    /// The plan id used on the wire and in idempotency keys.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Standard => "standard",
            Self::Pro => "pro",
        }
    }
}

impl FromStr for Plan {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Self::Basic),
            "standard" => Ok(Self::Standard),
            "pro" => Ok(Self::Pro),
            other => Err(LedgerError::InvalidPlan(other.to_string())),
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pricing configuration: the fixed currency-to-credit exchange rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Price of one credit in USD (0.01 = 1 credit per cent).
    pub credit_rate_usd: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            credit_rate_usd: 0.01,
        }
    }
}

impl PricingConfig {
    /// The fixed monthly credit allotment for a plan.
    ///
    /// Converts the plan's monthly price through the credit rate, rounding
    /// up so a plan never grants fewer credits than its price is worth.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn plan_credits(&self, plan: Plan) -> i64 {
        let price_usd = plan.monthly_price_cents() as f64 / 100.0;
        (price_usd / self.credit_rate_usd).ceil() as i64
    }
}
