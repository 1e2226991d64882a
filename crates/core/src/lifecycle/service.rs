//! Lifecycle service for invoice status transitions.
//!
//! All methods are associated functions: they validate a transition against
//! the current state and return the action to persist, or an error.

use chrono::{NaiveDate, Utc};
use freightbill_shared::types::{InvoiceId, UserId};
use rust_decimal::Decimal;

use super::error::LifecycleError;
use super::role::UserRole;
use super::types::{InvoiceStatus, LifecycleAction};

/// Facts about a draft that finalizing must check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalizeCheck {
    /// Number of line items.
    pub line_count: usize,
    /// Total folded from lines and adjustments now.
    pub computed_total: Decimal,
    /// Total cached on the stored invoice.
    pub persisted_total: Decimal,
    /// Total the caller last showed the user, when it sent one.
    pub submitted_total: Option<Decimal>,
    /// Sum of payments already recorded.
    pub paid_amount: Decimal,
}

/// `true` when two totals differ by more than `tolerance`, or cannot be compared.
#[must_use]
pub fn totals_differ(a: Decimal, b: Decimal, tolerance: Decimal) -> bool {
    a.checked_sub(b).is_none_or(|diff| diff.abs() > tolerance)
}

/// Stateless service for invoice lifecycle transitions.
pub struct LifecycleService;

impl LifecycleService {
    /// Fails with `InvoiceLocked` unless the invoice is a draft.
    pub fn ensure_editable(invoice_id: InvoiceId, status: InvoiceStatus) -> Result<(), LifecycleError> {
        if status.is_editable() {
            Ok(())
        } else {
            Err(LifecycleError::InvoiceLocked { invoice_id, status })
        }
    }

    /// Deletion is only allowed while draft.
    pub fn ensure_deletable(invoice_id: InvoiceId, status: InvoiceStatus) -> Result<(), LifecycleError> {
        Self::ensure_editable(invoice_id, status)
    }

    /// Explicit transitions. Payment-driven status changes go through
    /// [`Self::reconcile_status`] instead.
    #[must_use]
    pub const fn is_valid_transition(from: InvoiceStatus, to: InvoiceStatus) -> bool {
        match (from, to) {
            (InvoiceStatus::Draft, InvoiceStatus::Sent) => true,
            (from, InvoiceStatus::Draft) => from.is_locked(),
            _ => false,
        }
    }

    /// Issue a draft and lock it.
    ///
    /// Requires at least one line, and a recomputed total that matches both
    /// the persisted total and the caller's total (when sent) within
    /// `tolerance`. Payments recorded before an unlock carry over, so the
    /// resulting status may already be partial or paid.
    pub fn finalize(
        invoice_id: InvoiceId,
        current_status: InvoiceStatus,
        check: FinalizeCheck,
        tolerance: Decimal,
        finalized_by: UserId,
    ) -> Result<LifecycleAction, LifecycleError> {
        if !Self::is_valid_transition(current_status, InvoiceStatus::Sent) {
            return Err(LifecycleError::InvalidTransition {
                from: current_status,
                to: InvoiceStatus::Sent,
            });
        }
        if check.line_count == 0 {
            return Err(LifecycleError::EmptyInvoice(invoice_id));
        }
        if totals_differ(check.computed_total, check.persisted_total, tolerance) {
            return Err(LifecycleError::TotalMismatch {
                computed: check.computed_total,
                persisted: check.persisted_total,
            });
        }
        if let Some(submitted) = check.submitted_total
            && totals_differ(check.computed_total, submitted, tolerance)
        {
            return Err(LifecycleError::StaleSubmittedTotal {
                computed: check.computed_total,
                submitted,
            });
        }

        Ok(LifecycleAction::Finalize {
            new_status: Self::reconcile_status(
                InvoiceStatus::Sent,
                check.computed_total,
                check.paid_amount,
                tolerance,
            ),
            finalized_by,
            locked_at: Utc::now(),
        })
    }

    /// Reopen a locked invoice. Admin or Owner only.
    ///
    /// Payments and lines are untouched.
    pub fn unlock(
        current_status: InvoiceStatus,
        role: UserRole,
        unlocked_by: UserId,
    ) -> Result<LifecycleAction, LifecycleError> {
        if !role.satisfies(UserRole::UNLOCK) {
            return Err(LifecycleError::InsufficientRole {
                role,
                required: UserRole::UNLOCK,
            });
        }
        if !Self::is_valid_transition(current_status, InvoiceStatus::Draft) {
            return Err(LifecycleError::InvalidTransition {
                from: current_status,
                to: InvoiceStatus::Draft,
            });
        }
        Ok(LifecycleAction::Unlock {
            new_status: InvoiceStatus::Draft,
            unlocked_by,
            unlocked_at: Utc::now(),
        })
    }

    /// Stored status of a locked invoice given its payments.
    ///
    /// Drafts stay drafts; payments never finalize an invoice.
    #[must_use]
    pub fn reconcile_status(
        current_status: InvoiceStatus,
        total: Decimal,
        paid_amount: Decimal,
        tolerance: Decimal,
    ) -> InvoiceStatus {
        if current_status.is_editable() {
            return current_status;
        }
        if paid_amount >= total.saturating_sub(tolerance) {
            InvoiceStatus::Paid
        } else if paid_amount > Decimal::ZERO {
            InvoiceStatus::Partial
        } else {
            InvoiceStatus::Sent
        }
    }

    /// Status as presented on read: open invoices past due show as overdue.
    #[must_use]
    pub fn effective_status(
        stored_status: InvoiceStatus,
        due_date: Option<NaiveDate>,
        today: NaiveDate,
    ) -> InvoiceStatus {
        match (stored_status, due_date) {
            (InvoiceStatus::Sent | InvoiceStatus::Partial, Some(due)) if due < today => {
                InvoiceStatus::Overdue
            }
            _ => stored_status,
        }
    }
}
