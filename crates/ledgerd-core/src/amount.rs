//! Credit amount validation.

use crate::error::LedgerError;

/// Normalize a caller-supplied credit amount.
///
/// The amount must be finite and greater than zero; fractional amounts are
/// rounded up to the next whole credit.
///
/// # Errors
///
/// Returns `LedgerError::InvalidAmount` for non-finite or non-positive
/// input.
#[allow(clippy::cast_possible_truncation)]
pub fn normalize_credits(amount: f64) -> Result<i64, LedgerError> {
    if !amount.is_finite() {
        return Err(LedgerError::InvalidAmount(format!(
            "credit amount must be finite, got {amount}"
        )));
    }
    if amount <= 0.0 {
        return Err(LedgerError::InvalidAmount(format!(
            "credit amount must be positive, got {amount}"
        )));
    }
    Ok(amount.ceil() as i64)
}

/// Clamp a reported actual-usage figure into `[1, estimated]`.
///
/// A successful job always costs at least 1 credit and never more than what
/// was reserved, regardless of what the caller reports.
#[must_use]
pub fn clamp_captured(requested: i64, estimated: i64) -> i64 {
    requested.clamp(1, estimated)
}
