//! Storage seam for parcel back-references.

use async_trait::async_trait;
use freightbill_shared::types::{InvoiceId, ParcelId};

use super::error::OwnershipError;

/// Atomic access to `parcel.invoice_id`.
///
/// Implementations must make [`compare_and_set`](Self::compare_and_set) a
/// single conditional write, e.g. `UPDATE .. WHERE invoice_id IS NULL`.
#[async_trait]
pub trait ParcelClaimStore: Send + Sync {
    /// Current owner of the parcel.
    async fn current_owner(&self, parcel_id: ParcelId) -> Result<Option<InvoiceId>, OwnershipError>;

    /// Sets the owner to `new` only if it is still `expected`.
    ///
    /// Returns `Ok(false)` when the owner had changed; nothing is written then.
    async fn compare_and_set(
        &self,
        parcel_id: ParcelId,
        expected: Option<InvoiceId>,
        new: Option<InvoiceId>,
    ) -> Result<bool, OwnershipError>;
}
