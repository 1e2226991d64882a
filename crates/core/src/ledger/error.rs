//! Ledger error types.

use freightbill_shared::types::{AdjustmentId, LineItemId, ParcelId};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised while editing a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// No line with this id exists on the invoice.
    #[error("Line item not found: {0}")]
    LineNotFound(LineItemId),

    /// No adjustment with this id exists on the invoice.
    #[error("Adjustment not found: {0}")]
    AdjustmentNotFound(AdjustmentId),

    /// The parcel is already billed on another line of the same invoice.
    #[error("Parcel {parcel_id} is already billed on line {line_id}")]
    DuplicateParcel {
        /// Parcel that was added twice.
        parcel_id: ParcelId,
        /// Line that already bills it.
        line_id: LineItemId,
    },

    /// Adjustment amounts are unsigned; direction is carried by the kind.
    #[error("Adjustment amount must not be negative, got {0}")]
    NegativeAdjustment(Decimal),

    /// A bulk operation needs at least one line.
    #[error("Selection is empty")]
    EmptySelection,

    /// Cannot solve a rate when the selected lines weigh nothing.
    #[error("Selected lines have zero shipping weight, cannot solve a rate")]
    ZeroWeightSelection,

    /// A weight, amount or total is too large to compute.
    #[error("Weight or amount out of range")]
    OutOfRange {
        /// Offending line, when a single line caused it.
        line_id: Option<LineItemId>,
    },
}

impl LedgerError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::LineNotFound(_) => "LINE_NOT_FOUND",
            Self::AdjustmentNotFound(_) => "ADJUSTMENT_NOT_FOUND",
            Self::DuplicateParcel { .. } => "DUPLICATE_PARCEL",
            Self::NegativeAdjustment(_) => "NEGATIVE_ADJUSTMENT",
            Self::EmptySelection => "EMPTY_SELECTION",
            Self::ZeroWeightSelection => "ZERO_WEIGHT_SELECTION",
            Self::OutOfRange { .. } => "VALUE_OUT_OF_RANGE",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::LineNotFound(_) | Self::AdjustmentNotFound(_) => 404,
            Self::DuplicateParcel { .. } => 409,
            Self::NegativeAdjustment(_) | Self::EmptySelection | Self::ZeroWeightSelection => 400,
            Self::OutOfRange { .. } => 422,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            LedgerError::ZeroWeightSelection.error_code(),
            "ZERO_WEIGHT_SELECTION"
        );
        assert_eq!(
            LedgerError::LineNotFound(LineItemId::from_uuid(Uuid::nil())).http_status_code(),
            404
        );
        assert_eq!(LedgerError::EmptySelection.http_status_code(), 400);
        assert_eq!(LedgerError::OutOfRange { line_id: None }.http_status_code(), 422);
    }
}
