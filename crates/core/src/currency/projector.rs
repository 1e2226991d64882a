//! Projects ledger amounts into a display currency and back.

use std::collections::HashMap;

use freightbill_shared::types::{CurrencyCode, Money};
use rust_decimal::Decimal;

use super::conversion::round_for_display;
use super::error::CurrencyError;
use super::exchange::ExchangeRate;

/// Rate table for one tenant.
///
/// Each rate is "units of that currency per 1 ledger unit". The ledger
/// currency always projects at exactly 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyProjector {
    ledger_currency: CurrencyCode,
    rates: HashMap<CurrencyCode, Decimal>,
}

impl CurrencyProjector {
    /// A projector that only knows the ledger currency.
    #[must_use]
    pub fn new(ledger_currency: CurrencyCode) -> Self {
        Self {
            ledger_currency,
            rates: HashMap::new(),
        }
    }

    /// Builds a projector from a `code -> rate` table.
    ///
    /// An entry for the ledger currency itself is ignored.
    pub fn from_table<'a, I>(ledger_currency: CurrencyCode, table: I) -> Result<Self, CurrencyError>
    where
        I: IntoIterator<Item = (&'a str, Decimal)>,
    {
        table
            .into_iter()
            .try_fold(Self::new(ledger_currency), |projector, (code, rate)| {
                let code = CurrencyCode::parse(code)
                    .map_err(|e| CurrencyError::InvalidCurrencyCode(e.0))?;
                projector.with_rate(code, rate)
            })
    }

    /// Builds a projector from stored rate records, latest per currency.
    pub fn from_rates(
        ledger_currency: CurrencyCode,
        rates: &[ExchangeRate],
        as_of: chrono::NaiveDate,
    ) -> Result<Self, CurrencyError> {
        let own: Vec<ExchangeRate> = rates
            .iter()
            .filter(|r| r.from_currency == ledger_currency)
            .cloned()
            .collect();
        ExchangeRate::latest_as_of(&own, as_of)
            .into_iter()
            .try_fold(Self::new(ledger_currency.clone()), |projector, r| {
                projector.with_rate(r.to_currency.clone(), r.rate)
            })
    }

    /// Adds or replaces one rate.
    pub fn with_rate(mut self, currency: CurrencyCode, rate: Decimal) -> Result<Self, CurrencyError> {
        if rate <= Decimal::ZERO {
            return Err(CurrencyError::InvalidExchangeRate {
                currency: currency.to_string(),
                rate,
            });
        }
        if currency != self.ledger_currency {
            self.rates.insert(currency, rate);
        }
        Ok(self)
    }

    /// The currency all amounts are stored in.
    #[must_use]
    pub const fn ledger_currency(&self) -> &CurrencyCode {
        &self.ledger_currency
    }

    /// Every currency this projector can display, ledger currency first.
    #[must_use]
    pub fn currencies(&self) -> Vec<CurrencyCode> {
        let mut others: Vec<CurrencyCode> = self.rates.keys().cloned().collect();
        others.sort();
        std::iter::once(self.ledger_currency.clone())
            .chain(others)
            .collect()
    }

    /// Rate for `currency`; exactly 1 for the ledger currency.
    pub fn rate_for(&self, currency: &CurrencyCode) -> Result<Decimal, CurrencyError> {
        if *currency == self.ledger_currency {
            return Ok(Decimal::ONE);
        }
        self.rates
            .get(currency)
            .copied()
            .ok_or_else(|| CurrencyError::NoExchangeRate {
                ledger: self.ledger_currency.to_string(),
                target: currency.to_string(),
            })
    }

    /// Ledger amount expressed in `target`, unrounded.
    pub fn project(&self, amount: Decimal, target: &CurrencyCode) -> Result<Decimal, CurrencyError> {
        amount
            .checked_mul(self.rate_for(target)?)
            .ok_or_else(|| CurrencyError::ProjectionOutOfRange {
                amount,
                currency: target.to_string(),
            })
    }

    /// Display amount in `source` converted back into the ledger currency, unrounded.
    pub fn unproject(&self, amount: Decimal, source: &CurrencyCode) -> Result<Decimal, CurrencyError> {
        amount
            .checked_div(self.rate_for(source)?)
            .ok_or_else(|| CurrencyError::ProjectionOutOfRange {
                amount,
                currency: source.to_string(),
            })
    }

    /// Projected and rounded half to even for display.
    pub fn display(
        &self,
        amount: Decimal,
        target: &CurrencyCode,
        decimal_places: u32,
    ) -> Result<Money, CurrencyError> {
        let projected = self.project(amount, target)?;
        Ok(Money::new(
            round_for_display(projected, decimal_places),
            target.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn code(s: &str) -> CurrencyCode {
        CurrencyCode::parse(s).unwrap()
    }

    fn projector() -> CurrencyProjector {
        CurrencyProjector::from_table(code("USD"), [("EUR", dec!(0.92)), ("aed", dec!(3.6725))])
            .unwrap()
    }

    #[test]
    fn test_project_into_display_currency() {
        let money = projector().display(dec!(850), &code("EUR"), 2).unwrap();
        assert_eq!(money.amount, dec!(782.00));
        assert_eq!(money.to_string(), "782.00 EUR");
    }

    #[test]
    fn test_ledger_currency_is_identity() {
        let p = projector();
        assert_eq!(p.project(dec!(123.456), &code("USD")).unwrap(), dec!(123.456));
        assert_eq!(p.unproject(dec!(123.456), &code("USD")).unwrap(), dec!(123.456));
    }

    #[test]
    fn test_unproject_recovers_ledger_amount() {
        let p = projector();
        assert_eq!(p.unproject(dec!(782), &code("EUR")).unwrap(), dec!(850));
    }

    #[test]
    fn test_unknown_currency() {
        let err = projector().project(dec!(1), &code("JPY")).unwrap_err();
        assert_eq!(
            err,
            CurrencyError::NoExchangeRate {
                ledger: "USD".to_string(),
                target: "JPY".to_string(),
            }
        );
    }

    #[test]
    fn test_projection_overflow_is_an_error() {
        let p = CurrencyProjector::new(code("USD"))
            .with_rate(code("IDR"), dec!(16000))
            .unwrap()
            .with_rate(code("XAU"), dec!(0.0000001))
            .unwrap();

        let err = p.display(Decimal::MAX, &code("IDR"), 2).unwrap_err();
        assert_eq!(err.error_code(), "VALUE_OUT_OF_RANGE");
        assert!(p.unproject(Decimal::MAX, &code("XAU")).is_err());
    }

    #[test]
    fn test_rejects_non_positive_rate() {
        let err = CurrencyProjector::new(code("USD"))
            .with_rate(code("EUR"), dec!(0))
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_EXCHANGE_RATE");
    }

    #[test]
    fn test_currencies_lists_ledger_first() {
        let listed = projector().currencies();
        assert_eq!(listed, vec![code("USD"), code("AED"), code("EUR")]);
    }

    #[test]
    fn test_from_rates_uses_latest() {
        let day = |d| chrono::NaiveDate::from_ymd_opt(2026, 5, d).unwrap();
        let rates = vec![
            ExchangeRate::new(code("USD"), code("EUR"), dec!(0.90), day(1)),
            ExchangeRate::new(code("USD"), code("EUR"), dec!(0.93), day(3)),
            ExchangeRate::new(code("GBP"), code("EUR"), dec!(1.17), day(3)),
        ];
        let p = CurrencyProjector::from_rates(code("USD"), &rates, day(4)).unwrap();
        assert_eq!(p.rate_for(&code("EUR")).unwrap(), dec!(0.93));
    }
}
