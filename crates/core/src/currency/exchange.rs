//! Exchange rate records.

use chrono::NaiveDate;
use freightbill_shared::types::CurrencyCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Rate from a ledger currency into a display currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    /// Ledger currency.
    pub from_currency: CurrencyCode,
    /// Display currency.
    pub to_currency: CurrencyCode,
    /// Units of `to_currency` per 1 unit of `from_currency`.
    pub rate: Decimal,
    /// Date this rate is effective.
    pub effective_date: NaiveDate,
}

impl ExchangeRate {
    /// Creates a new exchange rate.
    #[must_use]
    pub const fn new(
        from_currency: CurrencyCode,
        to_currency: CurrencyCode,
        rate: Decimal,
        effective_date: NaiveDate,
    ) -> Self {
        Self {
            from_currency,
            to_currency,
            rate,
            effective_date,
        }
    }

    /// Picks the most recent rate effective on or before `as_of` for each
    /// target currency.
    #[must_use]
    pub fn latest_as_of(rates: &[Self], as_of: NaiveDate) -> Vec<&Self> {
        let mut latest: Vec<&Self> = Vec::new();
        for rate in rates.iter().filter(|r| r.effective_date <= as_of) {
            match latest.iter_mut().find(|r| r.to_currency == rate.to_currency) {
                Some(slot) if slot.effective_date < rate.effective_date => *slot = rate,
                Some(_) => {}
                None => latest.push(rate),
            }
        }
        latest
    }
}
