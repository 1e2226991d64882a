//! Trip lookups, used only to label and validate invoices.

use freightbill_core::EngineError;
use freightbill_shared::types::{TenantId, TripId};
use sea_orm::{ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::Serialize;

use crate::entities::trips;
use crate::error::RepositoryError;

/// A trip as referenced by invoices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TripRecord {
    /// Trip ID.
    pub id: TripId,
    /// Human-facing trip number.
    pub trip_number: String,
}

/// Trip repository.
#[derive(Debug, Clone)]
pub struct TripRepository {
    db: DatabaseConnection,
}

impl TripRepository {
    /// Creates a new trip repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Resolves a trip of the tenant.
    ///
    /// # Errors
    ///
    /// Returns `TripNotFound` if the trip does not exist for this tenant.
    pub async fn find(&self, tenant_id: TenantId, trip_id: TripId) -> Result<TripRecord, RepositoryError> {
        Self::find_on(&self.db, tenant_id, trip_id).await
    }

    pub(crate) async fn find_on<C: ConnectionTrait>(
        conn: &C,
        tenant_id: TenantId,
        trip_id: TripId,
    ) -> Result<TripRecord, RepositoryError> {
        let trip = trips::Entity::find_by_id(trip_id.into_inner())
            .filter(trips::Column::TenantId.eq(tenant_id.into_inner()))
            .one(conn)
            .await?
            .ok_or(EngineError::TripNotFound(trip_id))?;
        Ok(TripRecord {
            id: trip_id,
            trip_number: trip.trip_number,
        })
    }
}
