//! Engine-wide error taxonomy.
//!
//! Every module error converts into [`EngineError`], which classifies it
//! for callers: validation problems are fixed by the caller, conflicts name
//! the competing owner, lock errors carry the current status, and external
//! lookups say whether a retry may help.

use freightbill_shared::types::{ClientId, InvoiceId, TripId};
use serde_json::{Value, json};
use thiserror::Error;

use crate::currency::CurrencyError;
use crate::invoice::ValidationError;
use crate::ledger::LedgerError;
use crate::lifecycle::LifecycleError;
use crate::ownership::OwnershipError;
use crate::payment::PaymentError;
use crate::rating::RatingError;

/// Broad class of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input breaks an invariant. Nothing was persisted.
    Validation,
    /// Another invoice or a concurrent writer got there first.
    Conflict,
    /// The invoice is not a draft.
    Locked,
    /// A collaborator (client, parcel, rate, storage) was missing or unreachable.
    ExternalLookup,
    /// The caller's role does not allow the action.
    Forbidden,
    /// The addressed entity does not exist.
    NotFound,
    /// A number too large to compute with.
    OutOfRange,
    /// Misconfiguration or a bug.
    Internal,
}

/// Any error the billing engine can raise.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Save-time validation failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Ledger edit failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Parcel ownership rule violated.
    #[error(transparent)]
    Ownership(#[from] OwnershipError),

    /// Status transition refused.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Payment refused.
    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// Projection failed.
    #[error(transparent)]
    Currency(#[from] CurrencyError),

    /// Calculator misconfigured.
    #[error(transparent)]
    Rating(#[from] RatingError),

    /// No such invoice for this tenant.
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(InvoiceId),

    /// The referenced client does not exist.
    #[error("Client not found: {0}")]
    ClientNotFound(ClientId),

    /// The referenced trip does not exist.
    #[error("Trip not found: {0}")]
    TripNotFound(TripId),

    /// The invoice changed since the caller read it.
    #[error("Invoice {invoice_id} was modified concurrently (expected version {expected_version})")]
    ConcurrentModification {
        /// The invoice.
        invoice_id: InvoiceId,
        /// Version the caller based its change on.
        expected_version: i32,
    },

    /// Storage timed out or refused the connection.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Any other storage failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl EngineError {
    /// Classifies the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(ValidationError::TotalOutOfRange) => ErrorKind::OutOfRange,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Ledger(e) => match e {
                LedgerError::LineNotFound(_) | LedgerError::AdjustmentNotFound(_) => ErrorKind::NotFound,
                LedgerError::DuplicateParcel { .. } => ErrorKind::Conflict,
                LedgerError::NegativeAdjustment(_)
                | LedgerError::EmptySelection
                | LedgerError::ZeroWeightSelection => ErrorKind::Validation,
                LedgerError::OutOfRange { .. } => ErrorKind::OutOfRange,
            },
            Self::Ownership(e) => match e {
                OwnershipError::Conflict { .. }
                | OwnershipError::Conflicts(_)
                | OwnershipError::NotOwnedBy { .. }
                | OwnershipError::ContentionExhausted(_) => ErrorKind::Conflict,
                OwnershipError::SameInvoice(_) => ErrorKind::Validation,
                OwnershipError::ParcelNotFound(_) | OwnershipError::StoreUnavailable(_) => {
                    ErrorKind::ExternalLookup
                }
            },
            Self::Lifecycle(e) => match e {
                LifecycleError::InvoiceLocked { .. } => ErrorKind::Locked,
                LifecycleError::InvalidTransition { .. } => ErrorKind::Conflict,
                LifecycleError::EmptyInvoice(_)
                | LifecycleError::TotalMismatch { .. }
                | LifecycleError::StaleSubmittedTotal { .. } => ErrorKind::Validation,
                LifecycleError::InsufficientRole { .. } => ErrorKind::Forbidden,
            },
            Self::Payment(e) => match e {
                PaymentError::InvoiceIsDraft(_)
                | PaymentError::AlreadyReversed { .. }
                | PaymentError::InvoiceHasPayments(_) => ErrorKind::Conflict,
                PaymentError::NonPositiveAmount(_) | PaymentError::CannotReverseReversal(_) => {
                    ErrorKind::Validation
                }
                PaymentError::PaymentNotFound(_) => ErrorKind::NotFound,
                PaymentError::AmountOutOfRange(_) => ErrorKind::OutOfRange,
            },
            Self::Currency(e) => match e {
                CurrencyError::NoExchangeRate { .. } => ErrorKind::ExternalLookup,
                CurrencyError::ProjectionOutOfRange { .. } => ErrorKind::OutOfRange,
                CurrencyError::InvalidExchangeRate { .. } | CurrencyError::InvalidCurrencyCode(_) => {
                    ErrorKind::Validation
                }
            },
            Self::Rating(RatingError::Overflow) => ErrorKind::OutOfRange,
            Self::Rating(RatingError::NonPositiveDivisor(_)) | Self::Storage(_) => ErrorKind::Internal,
            Self::InvoiceNotFound(_) => ErrorKind::NotFound,
            Self::ClientNotFound(_) | Self::TripNotFound(_) | Self::StorageUnavailable(_) => {
                ErrorKind::ExternalLookup
            }
            Self::ConcurrentModification { .. } => ErrorKind::Conflict,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.error_code(),
            Self::Ledger(e) => e.error_code(),
            Self::Ownership(e) => e.error_code(),
            Self::Lifecycle(e) => e.error_code(),
            Self::Payment(e) => e.error_code(),
            Self::Currency(e) => e.error_code(),
            Self::Rating(RatingError::Overflow) => "VALUE_OUT_OF_RANGE",
            Self::Rating(RatingError::NonPositiveDivisor(_)) => "INVALID_BILLING_CONFIG",
            Self::InvoiceNotFound(_) => "INVOICE_NOT_FOUND",
            Self::ClientNotFound(_) => "CLIENT_NOT_FOUND",
            Self::TripNotFound(_) => "TRIP_NOT_FOUND",
            Self::ConcurrentModification { .. } => "CONCURRENT_MODIFICATION",
            Self::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            Self::Storage(_) => "DATABASE_ERROR",
        }
    }

    /// Returns true if this error is retryable.
    ///
    /// Transient failures only; a structural not-found never is.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Ownership(e) => e.is_retryable(),
            Self::ConcurrentModification { .. } | Self::StorageUnavailable(_) => true,
            _ => false,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Locked => 423,
            ErrorKind::ExternalLookup if self.is_retryable() => 503,
            ErrorKind::ExternalLookup | ErrorKind::OutOfRange => 422,
            ErrorKind::Internal => 500,
        }
    }

    /// The offending entities, for the caller to highlight.
    #[must_use]
    pub fn details(&self) -> Value {
        match self {
            Self::Validation(e) => e.details(),
            Self::Ledger(LedgerError::LineNotFound(id)) => json!({ "line_id": id }),
            Self::Ledger(LedgerError::AdjustmentNotFound(id)) => json!({ "adjustment_id": id }),
            Self::Ledger(LedgerError::OutOfRange { line_id: Some(id) }) => json!({ "line_id": id }),
            Self::Ledger(LedgerError::DuplicateParcel { parcel_id, line_id }) => {
                json!({ "parcel_id": parcel_id, "line_id": line_id })
            }
            Self::Ownership(OwnershipError::NotOwnedBy {
                parcel_id,
                expected,
                actual,
            }) => json!({ "parcel_id": parcel_id, "expected_owner": expected, "current_owner": actual }),
            Self::Ownership(OwnershipError::ParcelNotFound(id)) => json!({ "parcel_id": id }),
            Self::Ownership(e @ (OwnershipError::Conflict { .. } | OwnershipError::Conflicts(_))) => {
                json!({ "conflicts": e.conflicts() })
            }
            Self::Lifecycle(LifecycleError::InvoiceLocked { invoice_id, status }) => {
                json!({ "invoice_id": invoice_id, "status": status })
            }
            Self::Lifecycle(LifecycleError::InvalidTransition { from, to }) => {
                json!({ "from": from, "to": to })
            }
            Self::Lifecycle(LifecycleError::TotalMismatch { computed, persisted }) => {
                json!({ "computed_total": computed, "persisted_total": persisted })
            }
            Self::Lifecycle(LifecycleError::StaleSubmittedTotal { computed, submitted }) => {
                json!({ "computed_total": computed, "submitted_total": submitted })
            }
            Self::Lifecycle(LifecycleError::InsufficientRole { role, required }) => {
                json!({ "role": role, "required_role": required })
            }
            Self::Payment(PaymentError::AlreadyReversed { original, reversal }) => {
                json!({ "payment_id": original, "reversal_id": reversal })
            }
            Self::Payment(
                PaymentError::PaymentNotFound(id) | PaymentError::CannotReverseReversal(id),
            ) => json!({ "payment_id": id }),
            Self::Currency(CurrencyError::NoExchangeRate { ledger, target }) => {
                json!({ "ledger_currency": ledger, "currency": target })
            }
            Self::InvoiceNotFound(id) => json!({ "invoice_id": id }),
            Self::ClientNotFound(id) => json!({ "client_id": id }),
            Self::TripNotFound(id) => json!({ "trip_id": id }),
            Self::ConcurrentModification {
                invoice_id,
                expected_version,
            } => json!({ "invoice_id": invoice_id, "expected_version": expected_version }),
            _ => Value::Null,
        }
    }
}
