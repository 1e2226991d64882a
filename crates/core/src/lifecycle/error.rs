//! Lifecycle error types.

use freightbill_shared::types::InvoiceId;
use rust_decimal::Decimal;
use thiserror::Error;

use super::role::UserRole;
use super::types::InvoiceStatus;

/// Errors raised by status transitions and the lock gate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// A mutation was attempted on a non-draft invoice.
    #[error("Invoice {invoice_id} is locked ({status}); unlock it before editing")]
    InvoiceLocked {
        /// The locked invoice.
        invoice_id: InvoiceId,
        /// Its current status.
        status: InvoiceStatus,
    },

    /// The requested transition does not exist from the current status.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: InvoiceStatus,
        /// Requested status.
        to: InvoiceStatus,
    },

    /// The total the caller submitted disagrees with the recomputed one.
    #[error("Total mismatch: computed {computed}, submitted {submitted}")]
    StaleSubmittedTotal {
        /// Total folded from freshly recomputed lines.
        computed: Decimal,
        /// Total the caller sent.
        submitted: Decimal,
    },

    /// Finalizing requires at least one line.
    #[error("Invoice {0} has no line items")]
    EmptyInvoice(InvoiceId),

    /// The stored total disagrees with the recomputed one.
    #[error("Total mismatch: computed {computed}, persisted {persisted}")]
    TotalMismatch {
        /// Total folded from lines and adjustments.
        computed: Decimal,
        /// Total cached on the invoice.
        persisted: Decimal,
    },

    /// The caller's role is below what the transition needs.
    #[error("Role {role} cannot perform this action; requires {required}")]
    InsufficientRole {
        /// Caller's role.
        role: UserRole,
        /// Least role allowed.
        required: UserRole,
    },
}

impl LifecycleError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvoiceLocked { .. } => "INVOICE_LOCKED",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::EmptyInvoice(_) => "EMPTY_INVOICE",
            Self::TotalMismatch { .. } | Self::StaleSubmittedTotal { .. } => "TOTAL_MISMATCH",
            Self::InsufficientRole { .. } => "INSUFFICIENT_ROLE",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::InvoiceLocked { .. } => 423,
            Self::InvalidTransition { .. } => 409,
            Self::EmptyInvoice(_) | Self::TotalMismatch { .. } | Self::StaleSubmittedTotal { .. } => {
                400
            }
            Self::InsufficientRole { .. } => 403,
        }
    }
}
