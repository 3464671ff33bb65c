//! Credit reservation types for ledgerd.
//!
//! A reservation holds credits against one attempted paid generation job.
//! State transitions are whole-state functions: each returns the complete
//! next reservation so invariants stay checkable in one place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::LedgerError;
use crate::{ReservationId, UserId};

/// A credit reservation for a single paid generation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditReservation {
    /// Globally unique reservation id.
    pub reservation_id: ReservationId,

    /// The owning user.
    pub user_id: UserId,

    /// The generation provider the job runs against.
    pub service: GenerationService,

    /// The model the job targets.
    pub model_id: String,

    /// Credits debited from `available` and held in `reserved` at creation.
    /// Always positive.
    pub estimated_credits: i64,

    /// Lifecycle state.
    pub status: ReservationStatus,

    /// The downstream job id, once reported. Set at most once.
    pub external_request_id: Option<String>,

    /// Credits actually consumed; set only on capture, in `[1, estimated]`.
    pub actual_credits: Option<i64>,

    /// When the reservation was created.
    pub created_at: DateTime<Utc>,

    /// When the reservation reached a terminal state.
    pub finalized_at: Option<DateTime<Utc>>,
}

impl CreditReservation {
    /// Create a new reservation in the `Reserved` state.
    #[must_use]
    pub fn new(
        reservation_id: ReservationId,
        user_id: UserId,
        service: GenerationService,
        model_id: impl Into<String>,
        estimated_credits: i64,
    ) -> Self {
        Self {
            reservation_id,
            user_id,
            service,
            model_id: model_id.into(),
            estimated_credits,
            status: ReservationStatus::Reserved,
            external_request_id: None,
            actual_credits: None,
            created_at: Utc::now(),
            finalized_at: None,
        }
    }

    /// Whether the reservation has reached a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            ReservationStatus::Captured | ReservationStatus::Released
        )
    }

    /// Transition to `Captured`, recording the captured amount.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Conflict` if the reservation is not in the
    /// `Reserved` state. Callers are expected to treat terminal rows as
    /// replays before reaching this point.
    pub fn capture(self, actual_credits: i64, at: DateTime<Utc>) -> Result<Self, LedgerError> {
        if self.status != ReservationStatus::Reserved {
            return Err(LedgerError::Conflict(format!(
                "reservation {} is already {}",
                self.reservation_id, self.status
            )));
        }
        Ok(Self {
            status: ReservationStatus::Captured,
            actual_credits: Some(actual_credits),
            finalized_at: Some(at),
            ..self
        })
    }

    /// Transition to `Released`, returning the full estimate to the owner.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Conflict` if the reservation is not in the
    /// `Reserved` state.
    pub fn release(self, at: DateTime<Utc>) -> Result<Self, LedgerError> {
        if self.status != ReservationStatus::Reserved {
            return Err(LedgerError::Conflict(format!(
                "reservation {} is already {}",
                self.reservation_id, self.status
            )));
        }
        Ok(Self {
            status: ReservationStatus::Released,
            finalized_at: Some(at),
            ..self
        })
    }

    /// Attach the downstream job id. One-directional: attaching the same id
    /// again is a no-op reporting `false`; a different id is a conflict.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Conflict` if a different external id is
    /// already attached.
    pub fn attach_external_id(
        &mut self,
        external_id: impl Into<String>,
    ) -> Result<bool, LedgerError> {
        let external_id = external_id.into();
        match &self.external_request_id {
            Some(existing) if *existing == external_id => Ok(false),
            Some(existing) => Err(LedgerError::Conflict(format!(
                "reservation {} is already linked to external request {existing}",
                self.reservation_id
            ))),
            None => {
                self.external_request_id = Some(external_id);
                Ok(true)
            }
        }
    }
}

/// Lifecycle state of a reservation.
///
/// `Captured` and `Released` are terminal; a reservation transitions out of
/// `Reserved` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// Credits are held; the job outcome is not yet known.
    Reserved,

    /// The job succeeded; credits were permanently consumed.
    Captured,

    /// The job failed or was unwound; credits went back to available.
    Released,
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Reserved => "reserved",
            Self::Captured => "captured",
            Self::Released => "released",
        };
        f.write_str(s)
    }
}

/// Supported generation providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationService {
    /// fal.ai hosted models.
    Fal,

    /// Replicate hosted models.
    Replicate,

    /// OpenAI image/video generation.
    OpenAi,

    /// Stability AI.
    Stability,
}

impl fmt::Display for GenerationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Fal => "fal",
            Self::Replicate => "replicate",
            Self::OpenAi => "openai",
            Self::Stability => "stability",
        };
        f.write_str(s)
    }
}
