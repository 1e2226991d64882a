//! Display-currency projection.
//!
//! Invoices are stored and computed in the tenant's ledger currency.
//! Other currencies are a presentation concern: amounts are multiplied by
//! the configured rate on the way out and divided on the way back in.

pub mod conversion;
pub mod error;
pub mod exchange;
pub mod projector;

#[cfg(test)]
mod projector_props;

pub use conversion::{convert_amount, round_for_display};
pub use error::CurrencyError;
pub use exchange::ExchangeRate;
pub use projector::CurrencyProjector;
