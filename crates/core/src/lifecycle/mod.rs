//! Invoice status machine and the lock gate.
//!
//! ```text
//! draft ──finalize──▶ sent ──payments──▶ partial ──payments──▶ paid
//!   ▲                   │                  │                    │
//!   └──────unlock (Admin/Owner)────────────┴────────────────────┘
//! ```
//!
//! `overdue` is never stored. It is how a `sent` or `partial` invoice past
//! its due date is presented.

pub mod error;
pub mod role;
pub mod service;
pub mod types;

#[cfg(test)]
mod service_props;

pub use error::LifecycleError;
pub use role::UserRole;
pub use service::{FinalizeCheck, LifecycleService, totals_differ};
pub use types::{InvoiceStatus, LifecycleAction};
