//! The invoice ledger and its bulk pricing operations.

use std::collections::HashSet;

use freightbill_shared::types::{AdjustmentId, LineItemId, ParcelId};
use rust_decimal::Decimal;

use super::error::LedgerError;
use super::types::{
    Adjustment, LedgerTotals, LineItem, LineItemPatch, NewAdjustment, NewLineItem, RemovedLine,
};
use crate::rating::{RateCalculator, sanitize};

/// Recomputes a line's amount from its own weight, dimensions and rate.
///
/// Pure: returns the updated line instead of mutating shared state.
pub fn recompute_line(mut line: LineItem, calculator: &RateCalculator) -> Result<LineItem, LedgerError> {
    line.quantity = sanitize(line.quantity);
    line.actual_weight = sanitize(line.actual_weight);
    line.dimensions = line.dimensions.sanitized();
    line.rate = sanitize(line.rate);
    line.amount = calculator
        .line_amount(line.actual_weight, &line.dimensions, line.rate)
        .map_err(|_| LedgerError::OutOfRange {
            line_id: Some(line.id),
        })?;
    Ok(line)
}

fn checked_sum(values: impl IntoIterator<Item = Decimal>) -> Result<Decimal, LedgerError> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, Decimal::checked_add)
        .ok_or(LedgerError::OutOfRange { line_id: None })
}

/// Lines and adjustments of a single invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceLedger {
    calculator: RateCalculator,
    lines: Vec<LineItem>,
    adjustments: Vec<Adjustment>,
}

impl InvoiceLedger {
    /// An empty ledger.
    #[must_use]
    pub const fn new(calculator: RateCalculator) -> Self {
        Self {
            calculator,
            lines: Vec::new(),
            adjustments: Vec::new(),
        }
    }

    /// Rebuilds a ledger from stored rows.
    ///
    /// Stored amounts are kept as persisted so that a locked invoice never
    /// changes value when the volumetric divisor is reconfigured.
    #[must_use]
    pub const fn from_parts(
        calculator: RateCalculator,
        lines: Vec<LineItem>,
        adjustments: Vec<Adjustment>,
    ) -> Self {
        Self {
            calculator,
            lines,
            adjustments,
        }
    }

    /// The calculator used for every recomputation.
    #[must_use]
    pub const fn calculator(&self) -> &RateCalculator {
        &self.calculator
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    /// Adjustments in insertion order.
    #[must_use]
    pub fn adjustments(&self) -> &[Adjustment] {
        &self.adjustments
    }

    /// Looks up a line.
    #[must_use]
    pub fn line(&self, id: LineItemId) -> Option<&LineItem> {
        self.lines.iter().find(|l| l.id == id)
    }

    /// The line billing `parcel_id`, if any.
    #[must_use]
    pub fn line_for_parcel(&self, parcel_id: ParcelId) -> Option<&LineItem> {
        self.lines.iter().find(|l| l.parcel_id == Some(parcel_id))
    }

    /// Every parcel referenced by this ledger.
    #[must_use]
    pub fn parcel_ids(&self) -> Vec<ParcelId> {
        self.lines.iter().filter_map(|l| l.parcel_id).collect()
    }

    /// `true` when there are no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Billable weight of a line under this ledger's calculator.
    pub fn shipping_weight(&self, line: &LineItem) -> Result<Decimal, LedgerError> {
        self.calculator
            .shipping_weight(line.actual_weight, &line.dimensions)
            .map_err(|_| LedgerError::OutOfRange {
                line_id: Some(line.id),
            })
    }

    /// Appends a line and computes its amount.
    pub fn add_line(&mut self, input: NewLineItem) -> Result<LineItemId, LedgerError> {
        if let Some(parcel_id) = input.parcel_id
            && let Some(existing) = self.line_for_parcel(parcel_id)
        {
            return Err(LedgerError::DuplicateParcel {
                parcel_id,
                line_id: existing.id,
            });
        }

        let line = recompute_line(
            LineItem {
                id: LineItemId::new(),
                parcel_id: input.parcel_id,
                description: input.description,
                quantity: input.quantity,
                actual_weight: input.actual_weight,
                dimensions: input.dimensions,
                rate: input.rate,
                amount: Decimal::ZERO,
            },
            &self.calculator,
        )?;
        let id = line.id;
        self.lines.push(line);
        Ok(id)
    }

    /// Applies a partial edit and recomputes the amount.
    pub fn update_line(
        &mut self,
        id: LineItemId,
        patch: LineItemPatch,
    ) -> Result<&LineItem, LedgerError> {
        let calculator = self.calculator;
        let index = self.index_of(id)?;
        let mut line = self.lines[index].clone();
        if let Some(description) = patch.description {
            line.description = description;
        }
        if let Some(quantity) = patch.quantity {
            line.quantity = quantity;
        }
        if let Some(weight) = patch.actual_weight {
            line.actual_weight = weight;
        }
        if let Some(dimensions) = patch.dimensions {
            line.dimensions = dimensions;
        }
        if let Some(rate) = patch.rate {
            line.rate = rate;
        }
        self.lines[index] = recompute_line(line, &calculator)?;
        Ok(&self.lines[index])
    }

    /// Removes a line. The caller is responsible for releasing the returned parcel.
    pub fn remove_line(&mut self, id: LineItemId) -> Result<RemovedLine, LedgerError> {
        let index = self.index_of(id)?;
        let line = self.lines.remove(index);
        Ok(RemovedLine {
            release: line.parcel_id,
            line,
        })
    }

    /// Appends an adjustment.
    pub fn add_adjustment(&mut self, input: NewAdjustment) -> Result<AdjustmentId, LedgerError> {
        if input.amount.is_sign_negative() && !input.amount.is_zero() {
            return Err(LedgerError::NegativeAdjustment(input.amount));
        }
        let adjustment = Adjustment {
            id: AdjustmentId::new(),
            description: input.description,
            amount: input.amount,
            kind: input.kind,
        };
        let id = adjustment.id;
        self.adjustments.push(adjustment);
        Ok(id)
    }

    /// Removes an adjustment.
    pub fn remove_adjustment(&mut self, id: AdjustmentId) -> Result<Adjustment, LedgerError> {
        let index = self
            .adjustments
            .iter()
            .position(|a| a.id == id)
            .ok_or(LedgerError::AdjustmentNotFound(id))?;
        Ok(self.adjustments.remove(index))
    }

    /// A copy with every line recomputed from its own inputs.
    pub fn recomputed(&self) -> Result<Self, LedgerError> {
        let lines = self
            .lines
            .iter()
            .cloned()
            .map(|line| recompute_line(line, &self.calculator))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            calculator: self.calculator,
            lines,
            adjustments: self.adjustments.clone(),
        })
    }

    /// Subtotal, adjustments and grand total, unrounded.
    pub fn totals(&self) -> Result<LedgerTotals, LedgerError> {
        let subtotal = checked_sum(self.lines.iter().map(|l| l.amount))?;
        let adjustment_total = checked_sum(self.adjustments.iter().map(Adjustment::signed_amount))?;
        let weights = self
            .lines
            .iter()
            .map(|l| self.shipping_weight(l))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(LedgerTotals {
            subtotal,
            adjustment_total,
            total: checked_sum([subtotal, adjustment_total])?,
            total_quantity: checked_sum(self.lines.iter().map(|l| l.quantity))?,
            total_shipping_weight: checked_sum(weights)?,
        })
    }

    /// Sets one rate on every selected line and recomputes their amounts.
    ///
    /// All ids and new amounts are checked before anything changes.
    pub fn apply_rate_to_selection(
        &mut self,
        line_ids: &[LineItemId],
        rate: Decimal,
    ) -> Result<usize, LedgerError> {
        let indexes = self.resolve_selection(Some(line_ids))?;
        let rate = sanitize(rate);
        let repriced = indexes
            .iter()
            .map(|&index| {
                let mut line = self.lines[index].clone();
                line.rate = rate;
                recompute_line(line, &self.calculator)
            })
            .collect::<Result<Vec<_>, _>>()?;
        for (&index, line) in indexes.iter().zip(repriced) {
            self.lines[index] = line;
        }
        Ok(indexes.len())
    }

    /// Rate that makes the selection add up to `target_total`.
    ///
    /// `None` selects every line.
    pub fn solve_rate(
        &self,
        target_total: Decimal,
        line_ids: Option<&[LineItemId]>,
    ) -> Result<Decimal, LedgerError> {
        let indexes = self.resolve_selection(line_ids)?;
        let weights = indexes
            .iter()
            .map(|&i| self.shipping_weight(&self.lines[i]))
            .collect::<Result<Vec<_>, _>>()?;
        let weight = checked_sum(weights)?;
        if weight.is_zero() {
            return Err(LedgerError::ZeroWeightSelection);
        }
        sanitize(target_total)
            .checked_div(weight)
            .ok_or(LedgerError::OutOfRange { line_id: None })
    }

    /// Solves the rate for `target_total` and applies it to the selection.
    pub fn apply_target_total(
        &mut self,
        target_total: Decimal,
        line_ids: Option<&[LineItemId]>,
    ) -> Result<Decimal, LedgerError> {
        let rate = self.solve_rate(target_total, line_ids)?;
        let selected: Vec<LineItemId> = match line_ids {
            Some(ids) => ids.to_vec(),
            None => self.lines.iter().map(|l| l.id).collect(),
        };
        self.apply_rate_to_selection(&selected, rate)?;
        Ok(rate)
    }

    fn index_of(&self, id: LineItemId) -> Result<usize, LedgerError> {
        self.lines
            .iter()
            .position(|l| l.id == id)
            .ok_or(LedgerError::LineNotFound(id))
    }

    fn resolve_selection(&self, line_ids: Option<&[LineItemId]>) -> Result<Vec<usize>, LedgerError> {
        let indexes: Vec<usize> = match line_ids {
            None => (0..self.lines.len()).collect(),
            Some(ids) => {
                let mut seen = HashSet::new();
                let mut indexes = Vec::with_capacity(ids.len());
                for &id in ids {
                    if seen.insert(id) {
                        indexes.push(self.index_of(id)?);
                    }
                }
                indexes
            }
        };
        if indexes.is_empty() {
            return Err(LedgerError::EmptySelection);
        }
        Ok(indexes)
    }
}
