//! Invoice domain types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use freightbill_shared::types::{ClientId, CurrencyCode, InvoiceId, TenantId, TripId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::{Adjustment, InvoiceLedger, LineItem};
use crate::lifecycle::{InvoiceStatus, LifecycleService};
use crate::payment::ReconciliationService;
use crate::rating::RateCalculator;

/// Editable header fields of an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceHeader {
    /// Billed client. Required to save.
    pub client_id: Option<ClientId>,
    /// Trip the invoice belongs to.
    pub trip_id: Option<TripId>,
    /// Currency amounts are presented in. Never used for storage.
    pub display_currency: CurrencyCode,
    /// Issue date.
    pub issue_date: NaiveDate,
    /// Due date.
    pub due_date: Option<NaiveDate>,
    /// Payment terms, e.g. "Net 30".
    pub payment_terms: Option<String>,
    /// Free-text notes.
    pub notes: Option<String>,
}

/// A stored invoice with its children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    /// Invoice identifier.
    pub id: InvoiceId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Human-facing number, `INV-YYYY-NNNNN`.
    pub number: String,
    /// Header fields.
    pub header: InvoiceHeader,
    /// Currency every amount is stored in. Fixed at creation.
    pub ledger_currency: CurrencyCode,
    /// Line items in order.
    pub lines: Vec<LineItem>,
    /// Adjustments in order.
    pub adjustments: Vec<Adjustment>,
    /// Stored status. Never `Overdue`.
    pub status: InvoiceStatus,
    /// Cached total, checked against the recomputed one.
    pub total: Decimal,
    /// Cached sum of payments.
    pub paid_amount: Decimal,
    /// When the invoice left draft.
    pub locked_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency counter.
    pub version: i32,
    /// Creator.
    pub created_by: UserId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last editor.
    pub updated_by: Option<UserId>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Rebuilds the ledger from the stored children.
    #[must_use]
    pub fn ledger(&self, calculator: RateCalculator) -> InvoiceLedger {
        InvoiceLedger::from_parts(calculator, self.lines.clone(), self.adjustments.clone())
    }

    /// Status as presented on `today`, overdue-aware.
    #[must_use]
    pub fn effective_status(&self, today: NaiveDate) -> InvoiceStatus {
        LifecycleService::effective_status(self.status, self.header.due_date, today)
    }

    /// `max(0, total - paid)`.
    #[must_use]
    pub fn outstanding(&self) -> Decimal {
        ReconciliationService::outstanding(self.total, self.paid_amount)
    }
}

/// `INV-<YYYY>-<NNNNN>`, sequential per tenant and year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct InvoiceNumber {
    /// Calendar year of issue.
    pub year: i32,
    /// Sequence within the year, from 1.
    pub sequence: u32,
}

impl fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "INV-{:04}-{:05}", self.year, self.sequence)
    }
}

impl FromStr for InvoiceNumber {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('-');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some("INV"), Some(year), Some(seq), None) => Ok(Self {
                year: year.parse().map_err(|_| format!("bad year in {s}"))?,
                sequence: seq.parse().map_err(|_| format!("bad sequence in {s}"))?,
            }),
            _ => Err(format!("not an invoice number: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoice_number_format() {
        assert_eq!(InvoiceNumber { year: 2026, sequence: 42 }.to_string(), "INV-2026-00042");
    }

    #[test]
    fn test_invoice_number_parse() {
        let n: InvoiceNumber = "INV-2026-00042".parse().unwrap();
        assert_eq!(n, InvoiceNumber { year: 2026, sequence: 42 });
        assert!("INV-2026".parse::<InvoiceNumber>().is_err());
        assert!("BILL-2026-00001".parse::<InvoiceNumber>().is_err());
    }
}
