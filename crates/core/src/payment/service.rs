//! Payment recording and balance derivation.

use chrono::Utc;
use freightbill_shared::types::{InvoiceId, PaymentId, UserId};
use rust_decimal::Decimal;

use super::error::PaymentError;
use super::types::{NewPayment, Payment, ReconciliationSummary};
use crate::lifecycle::{InvoiceStatus, LifecycleService};
use crate::MAX_AMOUNT;

/// Stateless service for payments.
pub struct ReconciliationService;

impl ReconciliationService {
    /// Sum of payment amounts. Order does not matter.
    #[must_use]
    pub fn paid_amount(payments: &[Payment]) -> Decimal {
        payments
            .iter()
            .map(|p| p.amount)
            .fold(Decimal::ZERO, Decimal::saturating_add)
    }

    /// `max(0, total - paid)`.
    #[must_use]
    pub fn outstanding(total: Decimal, paid_amount: Decimal) -> Decimal {
        total.saturating_sub(paid_amount).max(Decimal::ZERO)
    }

    /// Validates and builds a payment to append.
    pub fn prepare_payment(
        invoice_id: InvoiceId,
        status: InvoiceStatus,
        input: NewPayment,
        recorded_by: UserId,
    ) -> Result<Payment, PaymentError> {
        if status.is_editable() {
            return Err(PaymentError::InvoiceIsDraft(invoice_id));
        }
        if input.amount <= Decimal::ZERO {
            return Err(PaymentError::NonPositiveAmount(input.amount));
        }
        if input.amount > MAX_AMOUNT {
            return Err(PaymentError::AmountOutOfRange(input.amount));
        }
        Ok(Payment {
            id: PaymentId::new(),
            invoice_id,
            amount: input.amount,
            date: input.date,
            method: input.method,
            reference: input.reference,
            notes: input.notes,
            reverses: None,
            recorded_by,
            recorded_at: Utc::now(),
        })
    }

    /// Builds the reversing entry for `original_id`.
    ///
    /// `history` is every payment already recorded on the invoice.
    pub fn prepare_reversal(
        invoice_id: InvoiceId,
        status: InvoiceStatus,
        original_id: PaymentId,
        history: &[Payment],
        notes: Option<String>,
        recorded_by: UserId,
    ) -> Result<Payment, PaymentError> {
        if status.is_editable() {
            return Err(PaymentError::InvoiceIsDraft(invoice_id));
        }
        let original = history
            .iter()
            .find(|p| p.id == original_id && p.invoice_id == invoice_id)
            .ok_or(PaymentError::PaymentNotFound(original_id))?;
        if original.is_reversal() {
            return Err(PaymentError::CannotReverseReversal(original_id));
        }
        if let Some(existing) = history.iter().find(|p| p.reverses == Some(original_id)) {
            return Err(PaymentError::AlreadyReversed {
                original: original_id,
                reversal: existing.id,
            });
        }
        let today = Utc::now().date_naive();
        Ok(Payment {
            id: PaymentId::new(),
            invoice_id,
            amount: -original.amount,
            date: today,
            method: original.method,
            reference: original.reference.clone(),
            notes,
            reverses: Some(original_id),
            recorded_by,
            recorded_at: Utc::now(),
        })
    }

    /// Balances and stored status of an invoice given all its payments.
    #[must_use]
    pub fn reconcile(
        status: InvoiceStatus,
        total: Decimal,
        payments: &[Payment],
        tolerance: Decimal,
    ) -> ReconciliationSummary {
        let paid_amount = Self::paid_amount(payments);
        ReconciliationSummary {
            total,
            paid_amount,
            outstanding: Self::outstanding(total, paid_amount),
            status: LifecycleService::reconcile_status(status, total, paid_amount, tolerance),
        }
    }
}
