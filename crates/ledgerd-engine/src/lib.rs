//! The credit ledger and reservation engine.
//!
//! Every public operation runs as one atomic unit: read current
//! account/reservation state, compute the complete next state, and commit
//! the entity mutation together with its audit event in a single store
//! write. There is no locking primitive; safety comes from the store's
//! uniqueness guards (reservation id, idempotency key, external request id)
//! and the terminal-state check in finalize. The loser of a race sees a
//! typed store error or a terminal row and returns the winner's outcome
//! instead of corrupting state.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod balance;
pub mod finalize;
pub mod grant;
pub mod idempotency;
pub mod reconcile;
pub mod reserve;
pub mod subscriptions;

pub use balance::{BalanceProjection, ReservedAccount};
pub use finalize::{FinalizeOutcome, FinalizeRequest, FinalizeStatus, ReleaseAllOutcome};
pub use grant::{BackfillOutcome, GrantOutcome};
pub use reconcile::ReconcileReport;
pub use reserve::{ReserveOutcome, ReserveRequest};

use std::sync::Arc;

use ledgerd_core::{CreditAccount, LedgerError, PricingConfig, UserId};
use ledgerd_store::{Store, StoreError};

/// The ledger engine. Cheap to clone; all state lives in the store.
#[derive(Clone)]
pub struct LedgerEngine {
    store: Arc<dyn Store>,
    pricing: PricingConfig,
}

impl LedgerEngine {
    /// Create an engine over a store with the given pricing.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, pricing: PricingConfig) -> Self {
        Self { store, pricing }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// The pricing configuration.
    #[must_use]
    pub fn pricing(&self) -> &PricingConfig {
        &self.pricing
    }

    /// Load the account for a user, creating it lazily with zero balances.
    pub(crate) fn load_or_create_account(
        &self,
        user_id: UserId,
    ) -> Result<CreditAccount, LedgerError> {
        Ok(self
            .store
            .get_account(&user_id)
            .map_err(store_err)?
            .unwrap_or_else(|| CreditAccount::new(user_id)))
    }
}

/// Map a store failure into the domain error.
pub(crate) fn store_err(err: StoreError) -> LedgerError {
    LedgerError::Store(err.to_string())
}
