//! Ownership error types.

use freightbill_shared::types::{InvoiceId, ParcelId};
use thiserror::Error;

use super::types::ClaimConflict;

/// Errors raised by the ownership guard and claim stores.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OwnershipError {
    /// The parcel belongs to another invoice.
    #[error("Parcel {parcel_id} is already billed on invoice {current_owner}")]
    Conflict {
        /// The contested parcel.
        parcel_id: ParcelId,
        /// Invoice that holds it.
        current_owner: InvoiceId,
    },

    /// Several parcels of a bulk claim are held elsewhere. Nothing was claimed.
    #[error("{} parcel(s) are already billed on other invoices", .0.len())]
    Conflicts(Vec<ClaimConflict>),

    /// A reassignment named the wrong losing invoice.
    #[error("Parcel {parcel_id} is not owned by invoice {expected}")]
    NotOwnedBy {
        /// The parcel.
        parcel_id: ParcelId,
        /// Invoice the caller thought owned it.
        expected: InvoiceId,
        /// Actual owner, if any.
        actual: Option<InvoiceId>,
    },

    /// Reassigning a parcel onto the invoice that already has it.
    #[error("Cannot reassign parcels from invoice {0} to itself")]
    SameInvoice(InvoiceId),

    /// The parcel does not exist for this tenant.
    #[error("Parcel not found: {0}")]
    ParcelNotFound(ParcelId),

    /// The claim kept changing under us.
    #[error("Parcel {0} changed owner repeatedly while claiming; retry")]
    ContentionExhausted(ParcelId),

    /// The store could not be reached.
    #[error("Parcel store unavailable: {0}")]
    StoreUnavailable(String),
}

impl OwnershipError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Conflict { .. } | Self::Conflicts(_) => "PARCEL_ALREADY_CLAIMED",
            Self::NotOwnedBy { .. } => "PARCEL_NOT_OWNED_BY_INVOICE",
            Self::SameInvoice(_) => "SAME_INVOICE",
            Self::ParcelNotFound(_) => "PARCEL_NOT_FOUND",
            Self::ContentionExhausted(_) => "CONCURRENT_MODIFICATION",
            Self::StoreUnavailable(_) => "PARCEL_STORE_UNAVAILABLE",
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ContentionExhausted(_) | Self::StoreUnavailable(_))
    }

    /// Every conflicting parcel this error names.
    #[must_use]
    pub fn conflicts(&self) -> Vec<ClaimConflict> {
        match self {
            Self::Conflict {
                parcel_id,
                current_owner,
            } => vec![ClaimConflict {
                parcel_id: *parcel_id,
                current_owner: *current_owner,
            }],
            Self::Conflicts(list) => list.clone(),
            _ => Vec::new(),
        }
    }
}
