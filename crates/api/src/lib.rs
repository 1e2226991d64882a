//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST API routes for invoices, payments, parcels and exchange rates
//! - Authentication middleware
//! - Mapping of billing errors to HTTP responses

pub mod error;
pub mod middleware;
pub mod routes;

use std::iter::once;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::{StatusCode, header::AUTHORIZATION};
use freightbill_core::BillingEngine;
use freightbill_db::{
    ClientRepository, ExchangeRateRepository, InvoiceRepository, ParcelRepository,
    PaymentRepository,
};
use freightbill_shared::{CurrencyConfig, JwtService};
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: Arc<DatabaseConnection>,
    /// JWT service for token validation.
    pub jwt_service: Arc<JwtService>,
    /// Invoice writes and reads.
    pub invoices: Arc<InvoiceRepository>,
    /// Payment history.
    pub payments: Arc<PaymentRepository>,
    /// Tenant exchange rates, cached.
    pub rates: Arc<ExchangeRateRepository>,
    /// Parcel lookups.
    pub parcels: Arc<ParcelRepository>,
    /// Client lookups.
    pub clients: Arc<ClientRepository>,
}

impl AppState {
    /// Builds the repositories around one pool and one engine.
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        jwt_service: JwtService,
        engine: BillingEngine,
        currency: CurrencyConfig,
        release_retry: Duration,
    ) -> Self {
        Self {
            invoices: Arc::new(InvoiceRepository::new(db.clone(), engine, release_retry)),
            payments: Arc::new(PaymentRepository::new(db.clone(), engine)),
            rates: Arc::new(ExchangeRateRepository::new(db.clone(), currency)),
            parcels: Arc::new(ParcelRepository::new(db.clone())),
            clients: Arc::new(ClientRepository::new(db.clone())),
            jwt_service: Arc::new(jwt_service),
            db: Arc::new(db),
        }
    }
}

/// Creates the main application router.
///
/// Requests that run longer than `request_timeout` are answered with
/// `408 Request Timeout`.
pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes_with_state(state.clone()))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(SetSensitiveRequestHeadersLayer::new(once(AUTHORIZATION)))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
