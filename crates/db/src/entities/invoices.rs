//! `SeaORM` Entity for invoices table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::InvoiceStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub number: String,
    pub client_id: Option<Uuid>,
    pub trip_id: Option<Uuid>,
    pub ledger_currency: String,
    pub display_currency: String,
    pub issue_date: Date,
    pub due_date: Option<Date>,
    pub payment_terms: Option<String>,
    pub notes: Option<String>,
    pub status: InvoiceStatus,
    #[sea_orm(column_type = "Decimal(None)")]
    pub subtotal: Decimal,
    #[sea_orm(column_type = "Decimal(None)")]
    pub adjustment_total: Decimal,
    #[sea_orm(column_type = "Decimal(None)")]
    pub total: Decimal,
    #[sea_orm(column_type = "Decimal(None)")]
    pub paid_amount: Decimal,
    pub version: i32,
    pub locked_at: Option<DateTimeWithTimeZone>,
    pub locked_by: Option<Uuid>,
    pub created_by: Uuid,
    pub updated_by: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tenants::Entity",
        from = "Column::TenantId",
        to = "super::tenants::Column::Id"
    )]
    Tenants,
    #[sea_orm(
        belongs_to = "super::clients::Entity",
        from = "Column::ClientId",
        to = "super::clients::Column::Id"
    )]
    Clients,
    #[sea_orm(has_many = "super::invoice_line_items::Entity")]
    InvoiceLineItems,
    #[sea_orm(has_many = "super::invoice_adjustments::Entity")]
    InvoiceAdjustments,
    #[sea_orm(has_many = "super::payments::Entity")]
    Payments,
}

impl Related<super::tenants::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenants.def()
    }
}

impl Related<super::clients::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Clients.def()
    }
}

impl Related<super::invoice_line_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InvoiceLineItems.def()
    }
}

impl Related<super::invoice_adjustments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InvoiceAdjustments.def()
    }
}

impl Related<super::payments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
