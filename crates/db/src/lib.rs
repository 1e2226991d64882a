//! Database layer with `SeaORM` entities and repositories.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - Repositories that run the billing engine inside database transactions
//! - Database migrations

pub mod entities;
pub mod error;
pub mod mapping;
pub mod migration;
pub mod repositories;
pub mod rls;

pub use error::RepositoryError;
pub use repositories::{
    ClientRepository, ExchangeRateRepository, InvoiceRepository, ParcelRepository,
    PaymentRepository, SeaOrmClaimStore, TripRepository,
};

use std::time::Duration;

use freightbill_shared::config::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a pooled connection to the database.
///
/// Connect and acquire timeouts come from configuration so that no request
/// waits on the pool indefinitely.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .sqlx_logging(false);
    Database::connect(options).await
}
