//! One parcel, at most one invoice.
//!
//! The guard never reads-then-writes: every claim, release and reassignment
//! is a compare-and-set on the parcel's `invoice_id` through a
//! [`ParcelClaimStore`]. A lost race surfaces as a conflict naming the
//! current owner.

pub mod error;
pub mod guard;
pub mod memory;
pub mod store;
pub mod types;

#[cfg(test)]
mod guard_props;

pub use error::OwnershipError;
pub use guard::ParcelOwnershipGuard;
pub use memory::InMemoryClaimStore;
pub use store::ParcelClaimStore;
pub use types::{ClaimConflict, ClaimOutcome, ParcelInfo, ReassignmentPlan, ReassignmentWarning};
