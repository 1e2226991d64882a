//! Currency error types.

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised while projecting amounts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CurrencyError {
    /// No rate is configured for the requested display currency.
    #[error("No exchange rate configured from {ledger} to {target}")]
    NoExchangeRate {
        /// Ledger currency code.
        ledger: String,
        /// Requested display currency code.
        target: String,
    },

    /// Rates must be strictly positive.
    #[error("Invalid exchange rate {rate} for {currency}")]
    InvalidExchangeRate {
        /// Currency the rate was given for.
        currency: String,
        /// Offending rate.
        rate: Decimal,
    },

    /// The converted amount does not fit a decimal.
    #[error("Amount {amount} cannot be expressed in {currency}")]
    ProjectionOutOfRange {
        /// Amount that was being converted.
        amount: Decimal,
        /// Currency it was converted into or out of.
        currency: String,
    },

    /// The currency code is not three letters.
    #[error("Invalid currency code: {0}")]
    InvalidCurrencyCode(String),
}

impl CurrencyError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NoExchangeRate { .. } => "NO_EXCHANGE_RATE",
            Self::InvalidExchangeRate { .. } => "INVALID_EXCHANGE_RATE",
            Self::InvalidCurrencyCode(_) => "INVALID_CURRENCY_CODE",
            Self::ProjectionOutOfRange { .. } => "VALUE_OUT_OF_RANGE",
        }
    }
}
