//! The invoice aggregate, save-time validation and the editing draft.

pub mod draft;
pub mod types;
pub mod validation;

#[cfg(test)]
mod draft_props;

pub use draft::{
    AdjustmentFingerprint, DraftSnapshot, InvoiceDraft, LineFingerprint, NavigationChoice,
    NavigationDecision, guard_navigation,
};
pub use types::{Invoice, InvoiceHeader, InvoiceNumber};
pub use validation::{InvoiceValidator, ValidationError};
