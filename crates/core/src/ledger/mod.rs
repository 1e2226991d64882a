//! Invoice line items, adjustments and totals.
//!
//! The ledger owns the lines and adjustments of one invoice. Every line amount
//! is recomputed from its weight, dimensions and rate whenever those change,
//! so a ledger never holds a stale amount.

pub mod error;
pub mod service;
pub mod types;

#[cfg(test)]
mod service_props;

pub use error::LedgerError;
pub use service::{InvoiceLedger, recompute_line};
pub use types::{
    Adjustment, AdjustmentKind, LedgerTotals, LineItem, LineItemPatch, NewAdjustment, NewLineItem,
    RemovedLine,
};
