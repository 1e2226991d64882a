//! Core billing logic for Freightbill.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! All domain types, validation rules, and calculations live here.
//!
//! # Modules
//!
//! - `rating` - Volumetric/shipping weight and line amount calculation
//! - `ledger` - Line items, adjustments and invoice totals
//! - `currency` - Display-currency projection
//! - `ownership` - One-parcel-one-invoice claim guard
//! - `lifecycle` - Invoice status state machine and lock gate
//! - `payment` - Append-only payment reconciliation
//! - `invoice` - Invoice aggregate, save validation and the editing draft
//! - `engine` - Operations that combine the above for request handlers

pub mod currency;
pub mod engine;
pub mod error;
pub mod invoice;
pub mod ledger;
pub mod lifecycle;
pub mod ownership;
pub mod payment;
pub mod rating;

pub use engine::BillingEngine;
pub use error::{EngineError, ErrorKind};

use rust_decimal::Decimal;

/// Largest drift, in ledger currency units, tolerated between two totals
/// that are supposed to agree.
pub const TOTAL_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Largest weight (kg) or side (cm) accepted from callers.
pub const MAX_MEASURE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Largest rate, adjustment, payment or target total accepted from callers.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

/// Most decimal places accepted on any caller-supplied number.
pub const MAX_SCALE: u32 = 6;

#[cfg(test)]
mod limit_tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_limits() {
        assert_eq!(MAX_MEASURE, dec!(1000000));
        assert_eq!(MAX_AMOUNT, dec!(1000000000000));
    }
}
