//! The editing session for one invoice and its dirty-state guard.
//!
//! Every mutation goes through the draft so the lock gate is checked in
//! one place. The draft remembers a snapshot of what was last persisted;
//! [`InvoiceDraft::is_dirty`] compares the current shape against it.

use freightbill_shared::types::{AdjustmentId, InvoiceId, LineItemId};
use rust_decimal::Decimal;

use super::types::{Invoice, InvoiceHeader};
use crate::error::EngineError;
use crate::ledger::{
    Adjustment, InvoiceLedger, LedgerError, LedgerTotals, LineItem, LineItemPatch, NewAdjustment,
    NewLineItem, RemovedLine,
};
use crate::lifecycle::{InvoiceStatus, LifecycleAction, LifecycleService};
use crate::rating::RateCalculator;

/// The line fields that make a draft dirty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineFingerprint {
    /// Description.
    pub description: String,
    /// Piece count.
    pub quantity: Decimal,
    /// Rate.
    pub rate: Decimal,
    /// Amount.
    pub amount: Decimal,
}

/// The adjustment fields that make a draft dirty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjustmentFingerprint {
    /// Description.
    pub description: String,
    /// Unsigned amount.
    pub amount: Decimal,
    /// Surcharge or discount.
    pub is_addition: bool,
}

/// Immutable picture of a draft, compared structurally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftSnapshot {
    header: InvoiceHeader,
    lines: Vec<LineFingerprint>,
    adjustments: Vec<AdjustmentFingerprint>,
}

impl DraftSnapshot {
    /// Captures the fields that matter from a header and ledger.
    #[must_use]
    pub fn capture(header: &InvoiceHeader, ledger: &InvoiceLedger) -> Self {
        Self {
            header: header.clone(),
            lines: ledger.lines().iter().map(fingerprint_line).collect(),
            adjustments: ledger
                .adjustments()
                .iter()
                .map(fingerprint_adjustment)
                .collect(),
        }
    }
}

fn fingerprint_line(line: &LineItem) -> LineFingerprint {
    LineFingerprint {
        description: line.description.clone(),
        quantity: line.quantity,
        rate: line.rate,
        amount: line.amount,
    }
}

fn fingerprint_adjustment(adjustment: &Adjustment) -> AdjustmentFingerprint {
    AdjustmentFingerprint {
        description: adjustment.description.clone(),
        amount: adjustment.amount,
        is_addition: adjustment.kind.is_addition(),
    }
}

/// What the user picked when leaving a dirty draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationChoice {
    /// Drop local changes.
    Discard,
    /// Persist, then leave.
    SaveAndLeave,
    /// Cancel the navigation.
    Stay,
}

/// What the caller should do with a navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationDecision {
    /// Nothing to lose; go.
    Leave,
    /// Unsaved changes; ask the user.
    Prompt,
    /// Save first, then go.
    SaveThenLeave,
    /// Stay on the draft.
    Stay,
}

/// Pure decision for leaving a draft.
#[must_use]
pub const fn guard_navigation(dirty: bool, choice: Option<NavigationChoice>) -> NavigationDecision {
    match (dirty, choice) {
        (false, _) | (true, Some(NavigationChoice::Discard)) => NavigationDecision::Leave,
        (true, None) => NavigationDecision::Prompt,
        (true, Some(NavigationChoice::SaveAndLeave)) => NavigationDecision::SaveThenLeave,
        (true, Some(NavigationChoice::Stay)) => NavigationDecision::Stay,
    }
}

/// One invoice being edited.
#[derive(Debug, Clone)]
pub struct InvoiceDraft {
    invoice_id: InvoiceId,
    status: InvoiceStatus,
    header: InvoiceHeader,
    ledger: InvoiceLedger,
    saved: DraftSnapshot,
}

impl InvoiceDraft {
    /// A fresh draft. Its empty state counts as saved.
    #[must_use]
    pub fn new(invoice_id: InvoiceId, header: InvoiceHeader, calculator: RateCalculator) -> Self {
        let ledger = InvoiceLedger::new(calculator);
        let saved = DraftSnapshot::capture(&header, &ledger);
        Self {
            invoice_id,
            status: InvoiceStatus::Draft,
            header,
            ledger,
            saved,
        }
    }

    /// Opens a stored invoice for editing.
    #[must_use]
    pub fn from_invoice(invoice: &Invoice, calculator: RateCalculator) -> Self {
        let ledger = invoice.ledger(calculator);
        let saved = DraftSnapshot::capture(&invoice.header, &ledger);
        Self {
            invoice_id: invoice.id,
            status: invoice.status,
            header: invoice.header.clone(),
            ledger,
            saved,
        }
    }

    /// Invoice being edited.
    #[must_use]
    pub const fn invoice_id(&self) -> InvoiceId {
        self.invoice_id
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> InvoiceStatus {
        self.status
    }

    /// Header fields.
    #[must_use]
    pub const fn header(&self) -> &InvoiceHeader {
        &self.header
    }

    /// Lines and adjustments.
    #[must_use]
    pub const fn ledger(&self) -> &InvoiceLedger {
        &self.ledger
    }

    /// Totals of the current ledger.
    pub fn totals(&self) -> Result<LedgerTotals, LedgerError> {
        self.ledger.totals()
    }

    /// Fails with `InvoiceLocked` unless the invoice is a draft.
    pub fn ensure_editable(&self) -> Result<(), EngineError> {
        LifecycleService::ensure_editable(self.invoice_id, self.status)?;
        Ok(())
    }

    /// Replaces the header.
    pub fn set_header(&mut self, header: InvoiceHeader) -> Result<(), EngineError> {
        self.ensure_editable()?;
        self.header = header;
        Ok(())
    }

    /// Adds a line.
    pub fn add_line(&mut self, input: NewLineItem) -> Result<LineItemId, EngineError> {
        self.ensure_editable()?;
        Ok(self.ledger.add_line(input)?)
    }

    /// Edits a line.
    pub fn update_line(
        &mut self,
        id: LineItemId,
        patch: LineItemPatch,
    ) -> Result<&LineItem, EngineError> {
        self.ensure_editable()?;
        Ok(self.ledger.update_line(id, patch)?)
    }

    /// Removes a line locally. Releasing its parcel is the caller's next step.
    pub fn remove_line(&mut self, id: LineItemId) -> Result<RemovedLine, EngineError> {
        self.ensure_editable()?;
        Ok(self.ledger.remove_line(id)?)
    }

    /// Adds an adjustment.
    pub fn add_adjustment(&mut self, input: NewAdjustment) -> Result<AdjustmentId, EngineError> {
        self.ensure_editable()?;
        Ok(self.ledger.add_adjustment(input)?)
    }

    /// Removes an adjustment.
    pub fn remove_adjustment(&mut self, id: AdjustmentId) -> Result<Adjustment, EngineError> {
        self.ensure_editable()?;
        Ok(self.ledger.remove_adjustment(id)?)
    }

    /// Sets one rate on the selected lines.
    pub fn apply_rate_to_selection(
        &mut self,
        line_ids: &[LineItemId],
        rate: Decimal,
    ) -> Result<usize, EngineError> {
        self.ensure_editable()?;
        Ok(self.ledger.apply_rate_to_selection(line_ids, rate)?)
    }

    /// Solves and applies the rate that yields `target_total`.
    pub fn apply_target_total(
        &mut self,
        target_total: Decimal,
        line_ids: Option<&[LineItemId]>,
    ) -> Result<Decimal, EngineError> {
        self.ensure_editable()?;
        Ok(self.ledger.apply_target_total(target_total, line_ids)?)
    }

    /// Runs a programmatic bulk edit that is persisted immediately, then
    /// re-snapshots so it does not read as unsaved work.
    ///
    /// On error the ledger is left exactly as before.
    pub fn commit_bulk<T, F>(&mut self, edit: F) -> Result<T, EngineError>
    where
        F: FnOnce(&mut InvoiceLedger) -> Result<T, LedgerError>,
    {
        self.ensure_editable()?;
        let mut working = self.ledger.clone();
        let value = edit(&mut working)?;
        self.ledger = working;
        self.mark_saved();
        Ok(value)
    }

    /// Records that the current shape has been persisted.
    pub fn mark_saved(&mut self) {
        self.saved = self.snapshot();
    }

    /// Drops local edits by reloading the persisted invoice.
    pub fn discard(&mut self, persisted: &Invoice) {
        *self = Self::from_invoice(persisted, *self.ledger.calculator());
    }

    /// Snapshot of the current in-memory shape.
    #[must_use]
    pub fn snapshot(&self) -> DraftSnapshot {
        DraftSnapshot::capture(&self.header, &self.ledger)
    }

    /// `true` when the current shape differs from the last persisted one.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.snapshot() != self.saved
    }

    /// Decision for leaving this draft.
    #[must_use]
    pub fn leave(&self, choice: Option<NavigationChoice>) -> NavigationDecision {
        guard_navigation(self.is_dirty(), choice)
    }

    /// Applies the status a lifecycle action produced.
    pub fn apply(&mut self, action: &LifecycleAction) {
        self.status = action.new_status();
    }

    /// Applies a status recomputed from payments.
    pub fn set_status(&mut self, status: InvoiceStatus) {
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::AdjustmentKind;
    use crate::error::ErrorKind;
    use crate::lifecycle::UserRole;
    use chrono::NaiveDate;
    use freightbill_shared::types::{ClientId, CurrencyCode, UserId};
    use rust_decimal_macros::dec;

    fn header() -> InvoiceHeader {
        InvoiceHeader {
            client_id: Some(ClientId::new()),
            trip_id: None,
            display_currency: CurrencyCode::parse("USD").unwrap(),
            issue_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            due_date: None,
            payment_terms: None,
            notes: None,
        }
    }

    fn line(weight: Decimal, rate: Decimal) -> NewLineItem {
        NewLineItem {
            description: "Carton".to_string(),
            quantity: dec!(1),
            actual_weight: weight,
            rate,
            ..NewLineItem::default()
        }
    }

    fn draft() -> InvoiceDraft {
        InvoiceDraft::new(InvoiceId::new(), header(), RateCalculator::default())
    }

    #[test]
    fn test_new_draft_is_clean() {
        assert!(!draft().is_dirty());
        assert_eq!(draft().leave(None), NavigationDecision::Leave);
    }

    #[test]
    fn test_manual_edit_makes_dirty() {
        let mut d = draft();
        d.add_line(line(dec!(10), dec!(5))).unwrap();
        assert!(d.is_dirty());
        assert_eq!(d.leave(None), NavigationDecision::Prompt);
        assert_eq!(
            d.leave(Some(NavigationChoice::SaveAndLeave)),
            NavigationDecision::SaveThenLeave
        );

        d.mark_saved();
        assert!(!d.is_dirty());
    }

    #[test]
    fn test_bulk_commit_is_not_dirty() {
        let mut d = draft();
        d.commit_bulk(|ledger| {
            ledger.add_line(line(dec!(1), dec!(2)))?;
            ledger.add_line(line(dec!(3), dec!(4)))
        })
        .unwrap();
        assert_eq!(d.ledger().lines().len(), 2);
        assert!(!d.is_dirty());
    }

    #[test]
    fn test_failed_bulk_edit_changes_nothing() {
        let mut d = draft();
        let missing = LineItemId::new();
        let err = d
            .commit_bulk(|ledger| {
                ledger.add_line(line(dec!(1), dec!(2)))?;
                ledger.remove_line(missing)
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::Ledger(LedgerError::LineNotFound(id)) if id == missing));
        assert!(d.ledger().is_empty());
    }

    #[test]
    fn test_reverting_an_edit_is_clean() {
        let mut d = draft();
        let id = d.commit_bulk(|l| l.add_line(line(dec!(10), dec!(5)))).unwrap();

        d.update_line(id, LineItemPatch { rate: Some(dec!(6)), ..LineItemPatch::default() })
            .unwrap();
        assert!(d.is_dirty());
        d.update_line(id, LineItemPatch { rate: Some(dec!(5)), ..LineItemPatch::default() })
            .unwrap();
        assert!(!d.is_dirty());
    }

    #[test]
    fn test_adjustment_toggle_is_dirty() {
        let mut d = draft();
        let id = d
            .commit_bulk(|l| {
                l.add_adjustment(NewAdjustment {
                    description: "Fuel".to_string(),
                    amount: dec!(20),
                    kind: AdjustmentKind::Addition,
                })
            })
            .unwrap();
        d.remove_adjustment(id).unwrap();
        d.add_adjustment(NewAdjustment {
            description: "Fuel".to_string(),
            amount: dec!(20),
            kind: AdjustmentKind::Deduction,
        })
        .unwrap();
        assert!(d.is_dirty());
    }

    #[test]
    fn test_edit_locked_then_unlock() {
        let mut d = draft();
        let id = d.commit_bulk(|l| l.add_line(line(dec!(10), dec!(85)))).unwrap();
        d.set_status(InvoiceStatus::Sent);

        let patch = LineItemPatch {
            rate: Some(dec!(90)),
            ..LineItemPatch::default()
        };
        let err = d.update_line(id, patch.clone()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Locked);

        let action = LifecycleService::unlock(d.status(), UserRole::Admin, UserId::new()).unwrap();
        d.apply(&action);
        assert_eq!(d.update_line(id, patch).unwrap().amount, dec!(900));
    }

    #[test]
    fn test_navigation_choices() {
        assert_eq!(guard_navigation(false, None), NavigationDecision::Leave);
        assert_eq!(
            guard_navigation(true, Some(NavigationChoice::Discard)),
            NavigationDecision::Leave
        );
        assert_eq!(
            guard_navigation(true, Some(NavigationChoice::Stay)),
            NavigationDecision::Stay
        );
    }
}
