//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.
//! Writes run the billing engine inside a tenant-scoped transaction.

pub mod claim_store;
pub mod client;
pub mod exchange_rate;
pub mod invoice;
pub mod parcel;
pub mod payment;
mod release;
pub mod trip;

pub use claim_store::SeaOrmClaimStore;
pub use client::{ClientRecord, ClientRepository};
pub use exchange_rate::ExchangeRateRepository;
pub use invoice::{
    ImportResult, InvoiceDetail, InvoiceFilter, InvoiceRepository, InvoiceSummary, LineInput,
    ReassignmentResult, RepriceInput, RepriceResult, SaveInvoiceInput, SavedInvoice,
};
pub use parcel::ParcelRepository;
pub use payment::{PaymentRepository, RecordedPayment};
pub use trip::{TripRecord, TripRepository};
