//! `SeaORM` Entity for parcels table.
//!
//! `invoice_id` is the back-reference that makes a parcel billable at most
//! once; it is only ever written through a conditional update.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "parcels")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub client_id: Uuid,
    pub tracking_number: String,
    pub description: Option<String>,
    #[sea_orm(column_type = "Decimal(None)")]
    pub weight: Decimal,
    #[sea_orm(column_type = "Decimal(None)", nullable)]
    pub length: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(None)", nullable)]
    pub width: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(None)", nullable)]
    pub height: Option<Decimal>,
    pub invoice_id: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::clients::Entity",
        from = "Column::ClientId",
        to = "super::clients::Column::Id"
    )]
    Clients,
    #[sea_orm(
        belongs_to = "super::invoices::Entity",
        from = "Column::InvoiceId",
        to = "super::invoices::Column::Id"
    )]
    Invoices,
}

impl Related<super::clients::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Clients.def()
    }
}

impl Related<super::invoices::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoices.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
