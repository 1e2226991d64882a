//! Payment domain types.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use freightbill_shared::types::{InvoiceId, PaymentId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::lifecycle::InvoiceStatus;

/// How the money arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash.
    Cash,
    /// Bank or wire transfer.
    BankTransfer,
    /// Card payment.
    Card,
    /// Cheque.
    Cheque,
    /// Anything else.
    Other,
}

impl PaymentMethod {
    /// Returns the string representation used in storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::BankTransfer => "bank_transfer",
            Self::Card => "card",
            Self::Cheque => "cheque",
            Self::Other => "other",
        }
    }

    /// Parses a method; unknown values read as `Other`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "cash" => Self::Cash,
            "bank_transfer" | "bank" | "transfer" => Self::BankTransfer,
            "card" => Self::Card,
            "cheque" | "check" => Self::Cheque,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A recorded payment. Negative amounts are reversals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Payment identifier.
    pub id: PaymentId,
    /// Invoice paid.
    pub invoice_id: InvoiceId,
    /// Signed amount in the ledger currency.
    pub amount: Decimal,
    /// Value date.
    pub date: NaiveDate,
    /// Method.
    pub method: PaymentMethod,
    /// External reference such as a transfer id.
    pub reference: Option<String>,
    /// Free-text notes.
    pub notes: Option<String>,
    /// The payment this entry reverses.
    pub reverses: Option<PaymentId>,
    /// Who recorded it.
    pub recorded_by: UserId,
    /// When it was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl Payment {
    /// `true` for a reversing entry.
    #[must_use]
    pub const fn is_reversal(&self) -> bool {
        self.reverses.is_some()
    }
}

/// Input for a new payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPayment {
    /// Amount received, strictly positive.
    pub amount: Decimal,
    /// Value date.
    pub date: NaiveDate,
    /// Method.
    pub method: PaymentMethod,
    /// External reference.
    pub reference: Option<String>,
    /// Notes.
    pub notes: Option<String>,
}

/// Balances of one invoice after folding its payments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconciliationSummary {
    /// Invoice total.
    pub total: Decimal,
    /// Sum of all payment amounts, reversals included.
    pub paid_amount: Decimal,
    /// `max(0, total - paid_amount)`.
    pub outstanding: Decimal,
    /// Stored status implied by the balances.
    pub status: InvoiceStatus,
}
