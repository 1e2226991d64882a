//! Payment error types.

use freightbill_shared::types::{InvoiceId, PaymentId};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised while recording payments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    /// Drafts cannot take payments.
    #[error("Invoice {0} is still a draft; finalize it before recording payments")]
    InvoiceIsDraft(InvoiceId),

    /// Payment amounts must be strictly positive.
    #[error("Payment amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    /// Payment amount above the accepted maximum.
    #[error("Payment amount {0} is out of range")]
    AmountOutOfRange(Decimal),

    /// No such payment on this invoice.
    #[error("Payment not found: {0}")]
    PaymentNotFound(PaymentId),

    /// A reversal cannot itself be reversed.
    #[error("Payment {0} is a reversal and cannot be reversed")]
    CannotReverseReversal(PaymentId),

    /// The payment already has a reversing entry.
    #[error("Payment {original} was already reversed by {reversal}")]
    AlreadyReversed {
        /// The original payment.
        original: PaymentId,
        /// Its existing reversal.
        reversal: PaymentId,
    },

    /// Payments were recorded while the invoice was locked; it can no longer be deleted.
    #[error("Invoice {0} has recorded payments and cannot be deleted")]
    InvoiceHasPayments(InvoiceId),
}

impl PaymentError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvoiceIsDraft(_) => "INVOICE_IS_DRAFT",
            Self::NonPositiveAmount(_) => "NON_POSITIVE_AMOUNT",
            Self::AmountOutOfRange(_) => "VALUE_OUT_OF_RANGE",
            Self::PaymentNotFound(_) => "PAYMENT_NOT_FOUND",
            Self::CannotReverseReversal(_) => "CANNOT_REVERSE_REVERSAL",
            Self::AlreadyReversed { .. } => "PAYMENT_ALREADY_REVERSED",
            Self::InvoiceHasPayments(_) => "INVOICE_HAS_PAYMENTS",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::InvoiceIsDraft(_)
            | Self::AlreadyReversed { .. }
            | Self::InvoiceHasPayments(_) => 409,
            Self::NonPositiveAmount(_) | Self::CannotReverseReversal(_) => 400,
            Self::PaymentNotFound(_) => 404,
            Self::AmountOutOfRange(_) => 422,
        }
    }
}
