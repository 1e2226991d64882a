//! Append-only payments and the balances derived from them.
//!
//! A payment is never edited or deleted. A correction is a reversing entry:
//! a new payment with the negated amount that points at the original.

pub mod error;
pub mod service;
pub mod types;

#[cfg(test)]
mod service_props;

pub use error::PaymentError;
pub use service::ReconciliationService;
pub use types::{NewPayment, Payment, PaymentMethod, ReconciliationSummary};
