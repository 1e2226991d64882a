//! Results of engine operations.

use freightbill_shared::types::{InvoiceId, LineItemId, Money, ParcelId};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::lifecycle::InvoiceStatus;
use crate::ownership::ReassignmentPlan;

/// Parcels added to a draft by an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportOutcome {
    /// New lines, in the order the parcels were given.
    pub added_lines: Vec<LineItemId>,
    /// Parcels that were already on this invoice.
    pub skipped: Vec<ParcelId>,
}

/// Parcels whose back-reference could not be cleared yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReleaseReport {
    /// Cleared.
    pub released: Vec<ParcelId>,
    /// Still pointing at the invoice; must be retried.
    pub pending: Vec<ParcelId>,
}

impl ReleaseReport {
    /// Nothing left to retry.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }
}

/// A request to move parcels between two draft invoices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReassignmentRequest {
    /// Parcels to move.
    pub parcel_ids: Vec<ParcelId>,
    /// Invoice losing them.
    pub from_invoice: InvoiceId,
    /// Invoice gaining them.
    pub to_invoice: InvoiceId,
    /// The caller has seen the warning list and agreed.
    pub confirmed: bool,
    /// Rate for the new lines; the old line's rate when absent.
    pub rate: Option<Decimal>,
}

/// Result of a reassignment request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReassignmentOutcome {
    /// Nothing moved; show these warnings and ask again with `confirmed`.
    NeedsConfirmation {
        /// What would move.
        plan: ReassignmentPlan,
    },
    /// Parcels moved and lines rebuilt on the target.
    Completed {
        /// What moved.
        plan: ReassignmentPlan,
        /// Lines removed from the losing invoice.
        removed_lines: Vec<LineItemId>,
        /// Lines created on the target invoice.
        added_lines: Vec<LineItemId>,
    },
}

/// Totals projected into a display currency and rounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayTotals {
    /// Subtotal.
    pub subtotal: Money,
    /// Signed adjustments.
    pub adjustment_total: Money,
    /// Grand total.
    pub total: Money,
    /// Paid so far.
    pub paid_amount: Money,
    /// Still owed.
    pub outstanding: Money,
}

/// How an invoice reads at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceView {
    /// Overdue-aware status.
    pub status: InvoiceStatus,
    /// Recomputed subtotal, ledger currency.
    pub subtotal: Decimal,
    /// Recomputed adjustments, ledger currency.
    pub adjustment_total: Decimal,
    /// Recomputed total, ledger currency.
    pub total: Decimal,
    /// Paid so far, ledger currency.
    pub paid_amount: Decimal,
    /// Still owed, ledger currency.
    pub outstanding: Decimal,
    /// Projection requested by the caller.
    pub display: Option<DisplayTotals>,
}
