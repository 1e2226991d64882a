//! Entity aliases.

pub use super::clients::Entity as Clients;
pub use super::exchange_rates::Entity as ExchangeRates;
pub use super::invoice_adjustments::Entity as InvoiceAdjustments;
pub use super::invoice_line_items::Entity as InvoiceLineItems;
pub use super::invoice_sequences::Entity as InvoiceSequences;
pub use super::invoices::Entity as Invoices;
pub use super::parcels::Entity as Parcels;
pub use super::payments::Entity as Payments;
pub use super::tenants::Entity as Tenants;
pub use super::trips::Entity as Trips;
