//! Parcel back-references stored in `parcels.invoice_id`.

use async_trait::async_trait;
use chrono::Utc;
use freightbill_core::ownership::{OwnershipError, ParcelClaimStore};
use freightbill_shared::types::{InvoiceId, ParcelId, TenantId};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QuerySelect};

use crate::entities::parcels;

/// Claim store over any connection or transaction.
///
/// Inside a [`TenantConnection`](crate::rls::TenantConnection) the claim
/// commits or rolls back with the rest of the invoice write. Each
/// compare-and-set is a single `UPDATE` filtered on the expected owner, so
/// of two racing claims exactly one matches a row.
pub struct SeaOrmClaimStore<'c, C> {
    conn: &'c C,
    tenant_id: TenantId,
}

impl<'c, C> SeaOrmClaimStore<'c, C> {
    /// Store scoped to one tenant's parcels.
    pub const fn new(conn: &'c C, tenant_id: TenantId) -> Self {
        Self { conn, tenant_id }
    }
}

fn unavailable(err: DbErr) -> OwnershipError {
    OwnershipError::StoreUnavailable(err.to_string())
}

#[async_trait]
impl<'c, C> ParcelClaimStore for SeaOrmClaimStore<'c, C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn current_owner(&self, parcel_id: ParcelId) -> Result<Option<InvoiceId>, OwnershipError> {
        let owner: Option<Option<uuid::Uuid>> = parcels::Entity::find_by_id(parcel_id.into_inner())
            .filter(parcels::Column::TenantId.eq(self.tenant_id.into_inner()))
            .select_only()
            .column(parcels::Column::InvoiceId)
            .into_tuple()
            .one(self.conn)
            .await
            .map_err(unavailable)?;

        owner
            .map(|invoice| invoice.map(InvoiceId::from_uuid))
            .ok_or(OwnershipError::ParcelNotFound(parcel_id))
    }

    async fn compare_and_set(
        &self,
        parcel_id: ParcelId,
        expected: Option<InvoiceId>,
        new: Option<InvoiceId>,
    ) -> Result<bool, OwnershipError> {
        let owner_matches = match expected {
            Some(invoice) => parcels::Column::InvoiceId.eq(invoice.into_inner()),
            None => parcels::Column::InvoiceId.is_null(),
        };

        let result = parcels::Entity::update_many()
            .col_expr(
                parcels::Column::InvoiceId,
                Expr::value(new.map(InvoiceId::into_inner)),
            )
            .col_expr(
                parcels::Column::UpdatedAt,
                Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(Utc::now())),
            )
            .filter(parcels::Column::Id.eq(parcel_id.into_inner()))
            .filter(parcels::Column::TenantId.eq(self.tenant_id.into_inner()))
            .filter(owner_matches)
            .exec(self.conn)
            .await
            .map_err(unavailable)?;

        let swapped = result.rows_affected == 1;
        if swapped {
            tracing::debug!(
                parcel_id = %parcel_id,
                from = ?expected,
                to = ?new,
                "Parcel back-reference updated"
            );
        }
        Ok(swapped)
    }
}
