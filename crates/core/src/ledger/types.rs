//! Ledger value types.

use freightbill_shared::types::{AdjustmentId, LineItemId, ParcelId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::rating::Dimensions;

/// One billed row on an invoice.
///
/// `amount` is derived and always equals `shipping_weight × rate`
/// for the calculator the ledger was built with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Line identifier.
    pub id: LineItemId,
    /// Parcel this line bills, `None` for manual lines.
    pub parcel_id: Option<ParcelId>,
    /// Free-text description.
    pub description: String,
    /// Piece count. Informational, does not affect the amount.
    pub quantity: Decimal,
    /// Measured weight in kg.
    pub actual_weight: Decimal,
    /// Parcel dimensions in cm.
    pub dimensions: Dimensions,
    /// Price per billable kg in the ledger currency.
    pub rate: Decimal,
    /// Unrounded line amount in the ledger currency.
    pub amount: Decimal,
}

/// Input for a new line.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewLineItem {
    /// Parcel to bill.
    pub parcel_id: Option<ParcelId>,
    /// Free-text description.
    pub description: String,
    /// Piece count.
    pub quantity: Decimal,
    /// Measured weight in kg.
    pub actual_weight: Decimal,
    /// Parcel dimensions in cm.
    pub dimensions: Dimensions,
    /// Price per billable kg.
    pub rate: Decimal,
}

/// A partial edit of an existing line. `None` fields are left alone.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LineItemPatch {
    /// New description.
    pub description: Option<String>,
    /// New piece count.
    pub quantity: Option<Decimal>,
    /// New measured weight.
    pub actual_weight: Option<Decimal>,
    /// New dimensions.
    pub dimensions: Option<Dimensions>,
    /// New rate.
    pub rate: Option<Decimal>,
}

/// Direction of an adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    /// Surcharge, added to the subtotal.
    Addition,
    /// Discount, subtracted from the subtotal.
    Deduction,
}

impl AdjustmentKind {
    /// Returns the string representation used in storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Addition => "addition",
            Self::Deduction => "deduction",
        }
    }

    /// `true` for surcharges.
    #[must_use]
    pub const fn is_addition(&self) -> bool {
        matches!(self, Self::Addition)
    }
}

/// A signed modification to the invoice subtotal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjustment {
    /// Adjustment identifier.
    pub id: AdjustmentId,
    /// Why it was applied.
    pub description: String,
    /// Unsigned amount in the ledger currency.
    pub amount: Decimal,
    /// Addition or deduction.
    pub kind: AdjustmentKind,
}

impl Adjustment {
    /// `+amount` for additions, `-amount` for deductions.
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        if self.kind.is_addition() {
            self.amount
        } else {
            -self.amount
        }
    }
}

/// Input for a new adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAdjustment {
    /// Why it is applied.
    pub description: String,
    /// Unsigned amount.
    pub amount: Decimal,
    /// Addition or deduction.
    pub kind: AdjustmentKind,
}

/// Aggregates of a ledger, all unrounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LedgerTotals {
    /// Sum of line amounts.
    pub subtotal: Decimal,
    /// Sum of signed adjustments.
    pub adjustment_total: Decimal,
    /// `subtotal + adjustment_total`.
    pub total: Decimal,
    /// Sum of piece counts.
    pub total_quantity: Decimal,
    /// Sum of billable weights.
    pub total_shipping_weight: Decimal,
}

/// A line taken off the ledger, with the parcel that must now be released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedLine {
    /// The removed line.
    pub line: LineItem,
    /// Parcel whose back-reference must be cleared, if any.
    pub release: Option<ParcelId>,
}
