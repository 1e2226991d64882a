//! Money type with decimal precision and currency.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! This type wraps `rust_decimal::Decimal` for arbitrary precision.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// ISO 4217 currency code, stored upper-case.
///
/// Tenants configure their own currency set, so codes are validated by
/// shape rather than against a fixed list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

/// Returned when a string is not a three-letter currency code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown currency: {0}")]
pub struct InvalidCurrencyCode(pub String);

impl CurrencyCode {
    /// Parses and normalizes a currency code.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCurrencyCode` unless the input is exactly three ASCII letters.
    pub fn parse(code: &str) -> Result<Self, InvalidCurrencyCode> {
        let trimmed = code.trim();
        if trimmed.len() == 3 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Self(trimmed.to_ascii_uppercase()))
        } else {
            Err(InvalidCurrencyCode(code.to_string()))
        }
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CurrencyCode {
    type Err = InvalidCurrencyCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = InvalidCurrencyCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

/// Represents a monetary amount with currency.
///
/// Uses `Decimal` internally to avoid floating-point precision errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// The amount in major currency units.
    pub amount: Decimal,
    /// ISO 4217 currency code (e.g., "USD", "AED").
    pub currency: CurrencyCode,
}

impl Money {
    /// Creates a new Money instance.
    #[must_use]
    pub const fn new(amount: Decimal, currency: CurrencyCode) -> Self {
        Self { amount, currency }
    }

    /// Creates a zero amount in the specified currency.
    #[must_use]
    pub fn zero(currency: CurrencyCode) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// Returns true if the amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Returns true if the amount is negative.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn usd() -> CurrencyCode {
        CurrencyCode::parse("USD").unwrap()
    }

    #[test]
    fn test_money_zero() {
        let money = Money::zero(usd());
        assert!(money.is_zero());
        assert!(!money.is_negative());
    }

    #[test]
    fn test_money_is_negative() {
        assert!(Money::new(dec!(-10), usd()).is_negative());
        assert!(!Money::new(dec!(10), usd()).is_negative());
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::new(dec!(850.00), usd()).to_string(), "850.00 USD");
    }

    #[test]
    fn test_currency_code_normalizes_case() {
        assert_eq!(CurrencyCode::from_str("aed").unwrap().as_str(), "AED");
        assert_eq!(CurrencyCode::from_str(" eur ").unwrap().as_str(), "EUR");
    }

    #[test]
    fn test_currency_code_rejects_bad_shapes() {
        assert!(CurrencyCode::from_str("").is_err());
        assert!(CurrencyCode::from_str("EURO").is_err());
        assert!(CurrencyCode::from_str("U5D").is_err());
    }

    #[test]
    fn test_currency_code_serde() {
        let code: CurrencyCode = serde_json::from_str("\"sar\"").unwrap();
        assert_eq!(code.as_str(), "SAR");
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"SAR\"");
        assert!(serde_json::from_str::<CurrencyCode>("\"dollars\"").is_err());
    }
}
