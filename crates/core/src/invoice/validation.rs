//! Save-time validation of an invoice draft.

use freightbill_shared::types::{ClientId, LineItemId, ParcelId};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use thiserror::Error;

use super::types::InvoiceHeader;
use crate::ledger::{InvoiceLedger, LedgerError, LedgerTotals};
use crate::lifecycle::totals_differ;

/// Reasons a draft cannot be saved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// No client selected.
    #[error("Invoice must have a client")]
    MissingClient,

    /// No line items.
    #[error("Invoice must have at least one line item")]
    EmptyLineItems,

    /// The total the caller submitted disagrees with the recomputed one.
    #[error("Total mismatch: computed {computed}, submitted {submitted}")]
    TotalMismatch {
        /// Total folded from the ledger.
        computed: Decimal,
        /// Total the caller sent.
        submitted: Decimal,
    },

    /// One line is malformed.
    #[error("Line {line_id}: {reason}")]
    InvalidLine {
        /// The offending line.
        line_id: LineItemId,
        /// What is wrong with it.
        reason: String,
    },

    /// Due date precedes issue date.
    #[error("Due date {due_date} is before issue date {issue_date}")]
    DueBeforeIssue {
        /// Issue date.
        issue_date: NaiveDate,
        /// Due date.
        due_date: NaiveDate,
    },

    /// The totals do not fit in a decimal.
    #[error("Invoice total is out of range")]
    TotalOutOfRange,

    /// A parcel shipped for another client.
    #[error("Parcel {parcel_id} belongs to client {parcel_client}, not {invoice_client}")]
    ParcelClientMismatch {
        /// The parcel.
        parcel_id: ParcelId,
        /// Its client.
        parcel_client: ClientId,
        /// The invoice's client.
        invoice_client: ClientId,
    },
}

impl ValidationError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingClient => "MISSING_CLIENT",
            Self::EmptyLineItems => "EMPTY_LINE_ITEMS",
            Self::TotalMismatch { .. } => "TOTAL_MISMATCH",
            Self::InvalidLine { .. } => "INVALID_LINE",
            Self::DueBeforeIssue { .. } => "DUE_BEFORE_ISSUE",
            Self::ParcelClientMismatch { .. } => "PARCEL_CLIENT_MISMATCH",
            Self::TotalOutOfRange => "VALUE_OUT_OF_RANGE",
        }
    }

    /// The offending entity, if any.
    #[must_use]
    pub fn details(&self) -> Value {
        match self {
            Self::MissingClient | Self::EmptyLineItems | Self::TotalOutOfRange => Value::Null,
            Self::TotalMismatch {
                computed,
                submitted,
            } => json!({ "computed_total": computed, "submitted_total": submitted }),
            Self::InvalidLine { line_id, reason } => json!({ "line_id": line_id, "reason": reason }),
            Self::DueBeforeIssue {
                issue_date,
                due_date,
            } => json!({ "issue_date": issue_date, "due_date": due_date }),
            Self::ParcelClientMismatch {
                parcel_id,
                parcel_client,
                invoice_client,
            } => json!({
                "parcel_id": parcel_id,
                "parcel_client_id": parcel_client,
                "invoice_client_id": invoice_client,
            }),
        }
    }
}

/// Stateless validator for invoice saves.
pub struct InvoiceValidator;

impl InvoiceValidator {
    /// Validates a draft before persisting it.
    ///
    /// Returns the recomputed totals so the caller stores exactly what was
    /// validated. `submitted_total`, when present, must match within `tolerance`.
    pub fn validate_for_save(
        header: &InvoiceHeader,
        ledger: &InvoiceLedger,
        submitted_total: Option<Decimal>,
        tolerance: Decimal,
    ) -> Result<LedgerTotals, ValidationError> {
        if header.client_id.is_none() {
            return Err(ValidationError::MissingClient);
        }
        if let Some(due_date) = header.due_date
            && due_date < header.issue_date
        {
            return Err(ValidationError::DueBeforeIssue {
                issue_date: header.issue_date,
                due_date,
            });
        }
        if ledger.is_empty() {
            return Err(ValidationError::EmptyLineItems);
        }
        if let Some(line) = ledger.lines().iter().find(|l| l.description.trim().is_empty()) {
            return Err(ValidationError::InvalidLine {
                line_id: line.id,
                reason: "description is required".to_string(),
            });
        }

        let totals = ledger.totals().map_err(|err| match err {
            LedgerError::OutOfRange {
                line_id: Some(line_id),
            } => ValidationError::InvalidLine {
                line_id,
                reason: "weight or amount out of range".to_string(),
            },
            _ => ValidationError::TotalOutOfRange,
        })?;
        if let Some(submitted) = submitted_total
            && totals_differ(totals.total, submitted, tolerance)
        {
            return Err(ValidationError::TotalMismatch {
                computed: totals.total,
                submitted,
            });
        }
        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::NewLineItem;
    use crate::rating::RateCalculator;
    use crate::TOTAL_TOLERANCE;
    use freightbill_shared::types::CurrencyCode;
    use rust_decimal_macros::dec;

    fn header() -> InvoiceHeader {
        InvoiceHeader {
            client_id: Some(ClientId::new()),
            trip_id: None,
            display_currency: CurrencyCode::parse("USD").unwrap(),
            issue_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2026, 3, 31),
            payment_terms: Some("Net 30".to_string()),
            notes: None,
        }
    }

    fn ledger_with(description: &str) -> InvoiceLedger {
        let mut ledger = InvoiceLedger::new(RateCalculator::default());
        ledger
            .add_line(NewLineItem {
                description: description.to_string(),
                quantity: dec!(1),
                actual_weight: dec!(10),
                rate: dec!(85),
                ..NewLineItem::default()
            })
            .unwrap();
        ledger
    }

    #[test]
    fn test_valid_draft_returns_totals() {
        let totals =
            InvoiceValidator::validate_for_save(&header(), &ledger_with("Pallet"), Some(dec!(850)), TOTAL_TOLERANCE)
                .unwrap();
        assert_eq!(totals.total, dec!(850));
    }

    #[test]
    fn test_missing_client() {
        let header = InvoiceHeader {
            client_id: None,
            ..header()
        };
        assert_eq!(
            InvoiceValidator::validate_for_save(&header, &ledger_with("x"), None, TOTAL_TOLERANCE),
            Err(ValidationError::MissingClient)
        );
    }

    #[test]
    fn test_empty_lines() {
        let ledger = InvoiceLedger::new(RateCalculator::default());
        assert_eq!(
            InvoiceValidator::validate_for_save(&header(), &ledger, None, TOTAL_TOLERANCE),
            Err(ValidationError::EmptyLineItems)
        );
    }

    #[test]
    fn test_stale_submitted_total() {
        let err = InvoiceValidator::validate_for_save(
            &header(),
            &ledger_with("Pallet"),
            Some(dec!(849.98)),
            TOTAL_TOLERANCE,
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "TOTAL_MISMATCH");
    }

    #[test]
    fn test_overflowing_total_is_out_of_range() {
        let mut ledger = InvoiceLedger::new(RateCalculator::default());
        for _ in 0..8 {
            ledger
                .add_line(NewLineItem {
                    description: "Bulk".to_string(),
                    quantity: dec!(1),
                    actual_weight: dec!(1000),
                    rate: dec!(1e25),
                    ..NewLineItem::default()
                })
                .unwrap();
        }

        let err = InvoiceValidator::validate_for_save(&header(), &ledger, None, TOTAL_TOLERANCE)
            .unwrap_err();
        assert_eq!(err, ValidationError::TotalOutOfRange);
        assert_eq!(err.error_code(), "VALUE_OUT_OF_RANGE");
    }

    #[test]
    fn test_blank_description_names_line() {
        let ledger = ledger_with("  ");
        let line_id = ledger.lines()[0].id;
        let err = InvoiceValidator::validate_for_save(&header(), &ledger, None, TOTAL_TOLERANCE).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidLine { line_id: id, .. } if id == line_id));
        assert_eq!(err.details()["line_id"], line_id.to_string());
    }

    #[test]
    fn test_due_before_issue() {
        let header = InvoiceHeader {
            due_date: NaiveDate::from_ymd_opt(2026, 2, 1),
            ..header()
        };
        let err = InvoiceValidator::validate_for_save(&header, &ledger_with("x"), None, TOTAL_TOLERANCE).unwrap_err();
        assert_eq!(err.error_code(), "DUE_BEFORE_ISSUE");
    }
}
