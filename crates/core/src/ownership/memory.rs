//! In-process claim store.
//!
//! Backs the guard in tests and single-node tools. Each parcel's entry is
//! locked for the duration of a compare-and-set, so concurrent callers
//! serialize per parcel.

use async_trait::async_trait;
use dashmap::DashMap;
use freightbill_shared::types::{InvoiceId, ParcelId};

use super::error::OwnershipError;
use super::store::ParcelClaimStore;

/// Parcel owners held in a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryClaimStore {
    owners: DashMap<ParcelId, Option<InvoiceId>>,
}

impl InMemoryClaimStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes a parcel known, unclaimed.
    pub fn register(&self, parcel_id: ParcelId) {
        self.owners.entry(parcel_id).or_insert(None);
    }

    /// Owner snapshot, `None` if unknown or unclaimed.
    #[must_use]
    pub fn owner_of(&self, parcel_id: ParcelId) -> Option<InvoiceId> {
        self.owners.get(&parcel_id).and_then(|entry| *entry)
    }

    /// Every parcel currently owned by `invoice_id`.
    #[must_use]
    pub fn parcels_of(&self, invoice_id: InvoiceId) -> Vec<ParcelId> {
        self.owners
            .iter()
            .filter(|entry| *entry.value() == Some(invoice_id))
            .map(|entry| *entry.key())
            .collect()
    }
}

#[async_trait]
impl ParcelClaimStore for InMemoryClaimStore {
    async fn current_owner(&self, parcel_id: ParcelId) -> Result<Option<InvoiceId>, OwnershipError> {
        self.owners
            .get(&parcel_id)
            .map(|entry| *entry)
            .ok_or(OwnershipError::ParcelNotFound(parcel_id))
    }

    async fn compare_and_set(
        &self,
        parcel_id: ParcelId,
        expected: Option<InvoiceId>,
        new: Option<InvoiceId>,
    ) -> Result<bool, OwnershipError> {
        let mut entry = self
            .owners
            .get_mut(&parcel_id)
            .ok_or(OwnershipError::ParcelNotFound(parcel_id))?;
        if *entry != expected {
            return Ok(false);
        }
        *entry = new;
        Ok(true)
    }
}
