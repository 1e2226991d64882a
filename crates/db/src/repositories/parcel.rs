//! Parcel lookups.

use std::collections::HashMap;

use freightbill_core::ownership::{OwnershipError, ParcelInfo};
use freightbill_shared::types::{ClientId, ParcelId, TenantId};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};

use crate::entities::parcels;
use crate::error::RepositoryError;
use crate::mapping::parcel_from_model;

/// Parcel repository.
#[derive(Debug, Clone)]
pub struct ParcelRepository {
    db: DatabaseConnection,
}

impl ParcelRepository {
    /// Creates a new parcel repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Parcels of a client that no invoice bills yet, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_unbilled(
        &self,
        tenant_id: TenantId,
        client_id: ClientId,
    ) -> Result<Vec<ParcelInfo>, RepositoryError> {
        let rows = parcels::Entity::find()
            .filter(parcels::Column::TenantId.eq(tenant_id.into_inner()))
            .filter(parcels::Column::ClientId.eq(client_id.into_inner()))
            .filter(parcels::Column::InvoiceId.is_null())
            .order_by_asc(parcels::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(rows.into_iter().map(parcel_from_model).collect())
    }

    /// Loads parcels in the order asked for.
    ///
    /// # Errors
    ///
    /// Returns `ParcelNotFound` for the first id the tenant does not have.
    pub(crate) async fn find_many_on<C: ConnectionTrait>(
        conn: &C,
        tenant_id: TenantId,
        parcel_ids: &[ParcelId],
    ) -> Result<Vec<ParcelInfo>, RepositoryError> {
        let ids: Vec<uuid::Uuid> = parcel_ids.iter().map(|id| id.into_inner()).collect();
        let found: HashMap<ParcelId, ParcelInfo> = parcels::Entity::find()
            .filter(parcels::Column::TenantId.eq(tenant_id.into_inner()))
            .filter(parcels::Column::Id.is_in(ids))
            .all(conn)
            .await?
            .into_iter()
            .map(|model| {
                let parcel = parcel_from_model(model);
                (parcel.id, parcel)
            })
            .collect();

        parcel_ids
            .iter()
            .map(|id| {
                found
                    .get(id)
                    .cloned()
                    .ok_or_else(|| OwnershipError::ParcelNotFound(*id).into())
            })
            .collect()
    }
}
