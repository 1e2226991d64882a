//! `SeaORM` entities, one module per table.

pub mod prelude;

pub mod clients;
pub mod exchange_rates;
pub mod invoice_adjustments;
pub mod invoice_line_items;
pub mod invoice_sequences;
pub mod invoices;
pub mod parcels;
pub mod payments;
pub mod sea_orm_active_enums;
pub mod tenants;
pub mod trips;
