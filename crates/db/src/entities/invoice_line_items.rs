//! `SeaORM` Entity for invoice_line_items table.
//!
//! `weight` is nullable: rows written before it existed kept the weight in
//! `quantity` and are normalised on read.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoice_line_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub position: i32,
    pub parcel_id: Option<Uuid>,
    pub description: String,
    #[sea_orm(column_type = "Decimal(None)")]
    pub quantity: Decimal,
    #[sea_orm(column_type = "Decimal(None)", nullable)]
    pub weight: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(None)", nullable)]
    pub length: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(None)", nullable)]
    pub width: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(None)", nullable)]
    pub height: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(None)")]
    pub rate: Decimal,
    #[sea_orm(column_type = "Decimal(None)")]
    pub amount: Decimal,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::invoices::Entity",
        from = "Column::InvoiceId",
        to = "super::invoices::Column::Id",
        on_delete = "Cascade"
    )]
    Invoices,
}

impl Related<super::invoices::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoices.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
