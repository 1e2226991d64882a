//! Ownership domain types.

use freightbill_shared::types::{ClientId, InvoiceId, ParcelId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::rating::Dimensions;

/// The fields of a parcel this engine consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParcelInfo {
    /// Parcel identifier.
    pub id: ParcelId,
    /// Client the parcel was shipped for.
    pub client_id: ClientId,
    /// Human-readable label, e.g. the tracking number.
    pub description: String,
    /// Measured weight in kg.
    pub weight: Decimal,
    /// Dimensions in cm.
    pub dimensions: Dimensions,
    /// Invoice currently billing this parcel.
    pub invoice_id: Option<InvoiceId>,
}

/// Result of a successful claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The parcel was free and now belongs to the invoice.
    Claimed,
    /// The invoice already owned the parcel.
    AlreadyOwned,
}

/// A parcel that could not be claimed because another invoice holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClaimConflict {
    /// The contested parcel.
    pub parcel_id: ParcelId,
    /// Invoice that currently owns it.
    pub current_owner: InvoiceId,
}

/// One parcel that a reassignment would move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReassignmentWarning {
    /// Parcel to move.
    pub parcel_id: ParcelId,
    /// Invoice it currently belongs to.
    pub current_invoice: InvoiceId,
}

/// The confirmation step of a reassignment.
///
/// Returned to the caller unconfirmed; executing it is a separate call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReassignmentPlan {
    /// Invoice losing the parcels.
    pub from_invoice: InvoiceId,
    /// Invoice gaining them.
    pub to_invoice: InvoiceId,
    /// Every affected parcel with its current owner.
    pub warnings: Vec<ReassignmentWarning>,
}

impl ReassignmentPlan {
    /// Parcels covered by this plan.
    #[must_use]
    pub fn parcel_ids(&self) -> Vec<ParcelId> {
        self.warnings.iter().map(|w| w.parcel_id).collect()
    }
}
