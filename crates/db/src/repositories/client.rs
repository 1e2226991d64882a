//! Client directory lookups.

use freightbill_core::EngineError;
use freightbill_shared::types::{ClientId, CurrencyCode, TenantId};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::Serialize;

use crate::entities::clients;
use crate::error::RepositoryError;

/// The client fields billing consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientRecord {
    /// Client ID.
    pub id: ClientId,
    /// Display name.
    pub name: String,
    /// Currency invoices for this client are displayed in by default.
    pub default_currency: CurrencyCode,
    /// Rate used when parcels are imported onto an invoice.
    pub default_rate_per_kg: Decimal,
    /// VAT registration number.
    pub vat_number: Option<String>,
}

impl TryFrom<clients::Model> for ClientRecord {
    type Error = RepositoryError;

    fn try_from(model: clients::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ClientId::from_uuid(model.id),
            name: model.name,
            default_currency: CurrencyCode::parse(&model.default_currency)
                .map_err(|e| RepositoryError::corrupt("clients", e.to_string()))?,
            default_rate_per_kg: model.default_rate_per_kg,
            vat_number: model.vat_number,
        })
    }
}

/// Client repository.
#[derive(Debug, Clone)]
pub struct ClientRepository {
    db: DatabaseConnection,
}

impl ClientRepository {
    /// Creates a new client repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Resolves a client of the tenant.
    ///
    /// # Errors
    ///
    /// Returns `ClientNotFound` if the client does not exist for this tenant.
    pub async fn find(
        &self,
        tenant_id: TenantId,
        client_id: ClientId,
    ) -> Result<ClientRecord, RepositoryError> {
        Self::find_on(&self.db, tenant_id, client_id).await
    }

    pub(crate) async fn find_on<C: ConnectionTrait>(
        conn: &C,
        tenant_id: TenantId,
        client_id: ClientId,
    ) -> Result<ClientRecord, RepositoryError> {
        clients::Entity::find_by_id(client_id.into_inner())
            .filter(clients::Column::TenantId.eq(tenant_id.into_inner()))
            .one(conn)
            .await?
            .ok_or(EngineError::ClientNotFound(client_id))?
            .try_into()
    }
}
