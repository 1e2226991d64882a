//! Operations that combine the engine's components for one request.
//!
//! `BillingEngine` holds only configuration. Storage is reached through a
//! [`ParcelOwnershipGuard`]; everything else works on values the caller
//! loaded and will persist.

pub mod types;

use std::collections::HashSet;

use chrono::NaiveDate;
use freightbill_shared::BillingConfig;
use freightbill_shared::types::{CurrencyCode, InvoiceId, LineItemId, ParcelId, PaymentId, UserId};
use rust_decimal::Decimal;

use crate::currency::CurrencyProjector;
use crate::error::EngineError;
use crate::invoice::{Invoice, InvoiceDraft, InvoiceValidator, ValidationError};
use crate::ledger::{LedgerTotals, NewLineItem};
use crate::lifecycle::{FinalizeCheck, LifecycleAction, LifecycleService, UserRole};
use crate::ownership::{ParcelClaimStore, ParcelInfo, ParcelOwnershipGuard};
use crate::payment::{
    NewPayment, Payment, PaymentError, ReconciliationService, ReconciliationSummary,
};
use crate::rating::RateCalculator;
use crate::TOTAL_TOLERANCE;

pub use types::{
    DisplayTotals, ImportOutcome, InvoiceView, ReassignmentOutcome, ReassignmentRequest,
    ReleaseReport,
};

/// Configured entry point for billing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingEngine {
    calculator: RateCalculator,
    tolerance: Decimal,
    display_precision: u32,
}

impl Default for BillingEngine {
    fn default() -> Self {
        Self {
            calculator: RateCalculator::default(),
            tolerance: TOTAL_TOLERANCE,
            display_precision: 2,
        }
    }
}

impl BillingEngine {
    /// Builds an engine from the `billing` config section.
    pub fn from_config(config: &BillingConfig) -> Result<Self, EngineError> {
        Ok(Self {
            calculator: RateCalculator::new(config.volumetric_divisor)?,
            tolerance: config.total_tolerance,
            display_precision: config.display_precision,
        })
    }

    /// The rate calculator.
    #[must_use]
    pub const fn calculator(&self) -> RateCalculator {
        self.calculator
    }

    /// Allowed drift between two totals.
    #[must_use]
    pub const fn tolerance(&self) -> Decimal {
        self.tolerance
    }

    /// Validates a draft for saving and returns the totals to store.
    pub fn validate_for_save(
        &self,
        draft: &InvoiceDraft,
        submitted_total: Option<Decimal>,
    ) -> Result<LedgerTotals, EngineError> {
        draft.ensure_editable()?;
        Ok(InvoiceValidator::validate_for_save(
            draft.header(),
            draft.ledger(),
            submitted_total,
            self.tolerance,
        )?)
    }

    /// Line for a parcel at `rate`.
    #[must_use]
    pub fn parcel_line(parcel: &ParcelInfo, rate: Decimal) -> NewLineItem {
        NewLineItem {
            parcel_id: Some(parcel.id),
            description: parcel.description.clone(),
            quantity: Decimal::ONE,
            actual_weight: parcel.weight,
            dimensions: parcel.dimensions,
            rate,
        }
    }

    /// Claims parcels for a draft and adds one line per parcel.
    ///
    /// All-or-nothing: a conflict on any parcel claims none and lists every
    /// conflict. The draft snapshot is committed so the import does not read
    /// as unsaved work.
    pub async fn import_parcels<S>(
        &self,
        guard: &ParcelOwnershipGuard<'_, S>,
        draft: &mut InvoiceDraft,
        parcels: &[ParcelInfo],
        rate: Decimal,
    ) -> Result<ImportOutcome, EngineError>
    where
        S: ParcelClaimStore + ?Sized,
    {
        draft.ensure_editable()?;
        let invoice_client = draft.header().client_id.ok_or(ValidationError::MissingClient)?;
        if let Some(parcel) = parcels.iter().find(|p| p.client_id != invoice_client) {
            return Err(ValidationError::ParcelClientMismatch {
                parcel_id: parcel.id,
                parcel_client: parcel.client_id,
                invoice_client,
            }
            .into());
        }

        let mut seen = HashSet::new();
        let (skipped, fresh): (Vec<&ParcelInfo>, Vec<&ParcelInfo>) = parcels
            .iter()
            .filter(|p| seen.insert(p.id))
            .partition(|p| draft.ledger().line_for_parcel(p.id).is_some());
        let fresh_ids: Vec<ParcelId> = fresh.iter().map(|p| p.id).collect();

        let claimed = guard.claim_all(&fresh_ids, draft.invoice_id()).await?;

        let added = draft.commit_bulk(|ledger| {
            fresh
                .iter()
                .map(|p| ledger.add_line(Self::parcel_line(p, rate)))
                .collect::<Result<Vec<LineItemId>, _>>()
        });
        match added {
            Ok(added_lines) => Ok(ImportOutcome {
                added_lines,
                skipped: skipped.iter().map(|p| p.id).collect(),
            }),
            Err(err) => {
                self.release_parcels(guard, draft.invoice_id(), &claimed).await;
                Err(err)
            }
        }
    }

    /// Clears back-references after lines were removed or the invoice deleted.
    ///
    /// Failures never undo the local removal; they come back as `pending`.
    pub async fn release_parcels<S>(
        &self,
        guard: &ParcelOwnershipGuard<'_, S>,
        invoice_id: InvoiceId,
        parcel_ids: &[ParcelId],
    ) -> ReleaseReport
    where
        S: ParcelClaimStore + ?Sized,
    {
        let mut report = ReleaseReport::default();
        for &parcel_id in parcel_ids {
            match guard.release(parcel_id, invoice_id).await {
                Ok(_) => report.released.push(parcel_id),
                Err(_) => report.pending.push(parcel_id),
            }
        }
        report
    }

    /// Moves parcels from one draft to another in two steps.
    ///
    /// Unconfirmed requests only return the warning list. Confirmed ones drop
    /// the lines from the losing draft, rebuild them on the target, then move
    /// the back-references. Both drafts are committed; the caller persists
    /// them together. Any failure leaves both drafts and every claim as they
    /// were.
    pub async fn reassign_parcels<S>(
        &self,
        guard: &ParcelOwnershipGuard<'_, S>,
        request: &ReassignmentRequest,
        from: &mut InvoiceDraft,
        to: &mut InvoiceDraft,
    ) -> Result<ReassignmentOutcome, EngineError>
    where
        S: ParcelClaimStore + ?Sized,
    {
        from.ensure_editable()?;
        to.ensure_editable()?;

        let plan = guard
            .plan_reassignment(&request.parcel_ids, from.invoice_id(), to.invoice_id())
            .await?;
        if !request.confirmed {
            return Ok(ReassignmentOutcome::NeedsConfirmation { plan });
        }

        let moving: Vec<_> = plan
            .parcel_ids()
            .into_iter()
            .filter_map(|p| from.ledger().line_for_parcel(p).cloned())
            .collect();

        let mut staged_from = from.clone();
        let mut staged_to = to.clone();
        let removed_lines = staged_from.commit_bulk(|ledger| {
            moving
                .iter()
                .map(|line| ledger.remove_line(line.id).map(|removed| removed.line.id))
                .collect::<Result<Vec<_>, _>>()
        })?;
        let added_lines = staged_to.commit_bulk(|ledger| {
            moving
                .iter()
                .map(|line| {
                    ledger.add_line(NewLineItem {
                        parcel_id: line.parcel_id,
                        description: line.description.clone(),
                        quantity: line.quantity,
                        actual_weight: line.actual_weight,
                        dimensions: line.dimensions,
                        rate: request.rate.unwrap_or(line.rate),
                    })
                })
                .collect::<Result<Vec<_>, _>>()
        })?;

        guard.reassign(&plan).await?;
        *from = staged_from;
        *to = staged_to;

        Ok(ReassignmentOutcome::Completed {
            plan,
            removed_lines,
            added_lines,
        })
    }

    /// Parcels to release once a draft is deleted.
    ///
    /// Fails on locked invoices, and on drafts that were unlocked after
    /// taking payments: the payment log is append-only.
    pub fn prepare_delete(
        &self,
        draft: &InvoiceDraft,
        payments: &[Payment],
    ) -> Result<Vec<ParcelId>, EngineError> {
        LifecycleService::ensure_deletable(draft.invoice_id(), draft.status())?;
        if !payments.is_empty() {
            return Err(PaymentError::InvoiceHasPayments(draft.invoice_id()).into());
        }
        Ok(draft.ledger().parcel_ids())
    }

    /// Finalizes a draft against the total stored for it and, when sent,
    /// the total the caller last displayed.
    ///
    /// Line amounts are recomputed from their weights and rates first, so
    /// stale stored amounts cannot pass the check.
    pub fn finalize(
        &self,
        draft: &mut InvoiceDraft,
        persisted_total: Decimal,
        submitted_total: Option<Decimal>,
        paid_amount: Decimal,
        finalized_by: UserId,
    ) -> Result<LifecycleAction, EngineError> {
        let recomputed = draft.ledger().recomputed()?;
        let check = FinalizeCheck {
            line_count: recomputed.lines().len(),
            computed_total: recomputed.totals()?.total,
            persisted_total,
            submitted_total,
            paid_amount,
        };
        let action = LifecycleService::finalize(
            draft.invoice_id(),
            draft.status(),
            check,
            self.tolerance,
            finalized_by,
        )?;
        draft.apply(&action);
        Ok(action)
    }

    /// Unlocks a finalized invoice for editing.
    pub fn unlock(
        &self,
        draft: &mut InvoiceDraft,
        role: UserRole,
        unlocked_by: UserId,
    ) -> Result<LifecycleAction, EngineError> {
        let action = LifecycleService::unlock(draft.status(), role, unlocked_by)?;
        draft.apply(&action);
        Ok(action)
    }

    /// Builds a payment and the balances after appending it to `history`.
    pub fn record_payment(
        &self,
        invoice: &Invoice,
        history: &[Payment],
        input: NewPayment,
        recorded_by: UserId,
    ) -> Result<(Payment, ReconciliationSummary), EngineError> {
        let payment =
            ReconciliationService::prepare_payment(invoice.id, invoice.status, input, recorded_by)?;
        let summary = self.summary_with(invoice, history, &payment);
        Ok((payment, summary))
    }

    /// Builds a reversing entry and the balances after appending it.
    pub fn reverse_payment(
        &self,
        invoice: &Invoice,
        history: &[Payment],
        original: PaymentId,
        notes: Option<String>,
        recorded_by: UserId,
    ) -> Result<(Payment, ReconciliationSummary), EngineError> {
        let payment = ReconciliationService::prepare_reversal(
            invoice.id,
            invoice.status,
            original,
            history,
            notes,
            recorded_by,
        )?;
        let summary = self.summary_with(invoice, history, &payment);
        Ok((payment, summary))
    }

    /// Balances of an invoice given its full payment history.
    #[must_use]
    pub fn reconcile(&self, invoice: &Invoice, payments: &[Payment]) -> ReconciliationSummary {
        ReconciliationService::reconcile(invoice.status, invoice.total, payments, self.tolerance)
    }

    /// Read model of an invoice, optionally projected into `display_currency`.
    pub fn view(
        &self,
        invoice: &Invoice,
        projector: &CurrencyProjector,
        display_currency: Option<&CurrencyCode>,
        today: NaiveDate,
    ) -> Result<InvoiceView, EngineError> {
        let totals = invoice.ledger(self.calculator).totals()?;
        let outstanding = ReconciliationService::outstanding(totals.total, invoice.paid_amount);
        let display = display_currency
            .map(|currency| {
                let show = |amount| projector.display(amount, currency, self.display_precision);
                Ok::<_, EngineError>(DisplayTotals {
                    subtotal: show(totals.subtotal)?,
                    adjustment_total: show(totals.adjustment_total)?,
                    total: show(totals.total)?,
                    paid_amount: show(invoice.paid_amount)?,
                    outstanding: show(outstanding)?,
                })
            })
            .transpose()?;

        Ok(InvoiceView {
            status: invoice.effective_status(today),
            subtotal: totals.subtotal,
            adjustment_total: totals.adjustment_total,
            total: totals.total,
            paid_amount: invoice.paid_amount,
            outstanding,
            display,
        })
    }

    fn summary_with(
        &self,
        invoice: &Invoice,
        history: &[Payment],
        payment: &Payment,
    ) -> ReconciliationSummary {
        let mut all = history.to_vec();
        all.push(payment.clone());
        ReconciliationService::reconcile(invoice.status, invoice.total, &all, self.tolerance)
    }
}
