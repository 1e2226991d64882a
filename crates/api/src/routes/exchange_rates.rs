//! Exchange rate management routes.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::NaiveDate;
use freightbill_core::currency::ExchangeRate;
use freightbill_core::lifecycle::UserRole;
use freightbill_shared::types::CurrencyCode;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use super::invoices::amount;
use crate::{AppState, error::ApiError, middleware::AuthUser};

/// Creates the exchange rate routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/exchange-rates", get(list_exchange_rates))
        .route("/exchange-rates", post(upsert_exchange_rate))
}

/// Query parameters for listing rates.
#[derive(Debug, Deserialize)]
pub struct ListExchangeRatesQuery {
    /// Ledger currency the rates convert from.
    pub from: CurrencyCode,
}

/// Request body for creating or replacing a rate.
#[derive(Debug, Deserialize, Validate)]
pub struct UpsertExchangeRateRequest {
    /// Ledger currency.
    pub from_currency: CurrencyCode,
    /// Display currency.
    pub to_currency: CurrencyCode,
    /// Units of `to_currency` per one unit of `from_currency`.
    #[validate(custom(function = "amount"))]
    pub rate: Decimal,
    /// Date the rate takes effect.
    pub effective_date: NaiveDate,
}

/// GET `/exchange-rates` - Stored rates out of a ledger currency, newest first.
async fn list_exchange_rates(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListExchangeRatesQuery>,
) -> Result<Json<Vec<ExchangeRate>>, ApiError> {
    auth.require(UserRole::Viewer)?;

    let rates = state.rates.list_rates(auth.tenant_id(), &query.from).await?;
    Ok(Json(rates))
}

/// POST `/exchange-rates` - Create or replace the rate for a pair on a date.
async fn upsert_exchange_rate(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<UpsertExchangeRateRequest>,
) -> Result<(StatusCode, Json<ExchangeRate>), ApiError> {
    auth.require(UserRole::Accountant)?;
    payload.validate()?;

    let rate = ExchangeRate::new(
        payload.from_currency,
        payload.to_currency,
        payload.rate,
        payload.effective_date,
    );
    state.rates.upsert_rate(auth.tenant_id(), &rate).await?;

    info!(
        from = %rate.from_currency,
        to = %rate.to_currency,
        user_id = %auth.user_id(),
        "Exchange rate updated"
    );
    Ok((StatusCode::CREATED, Json(rate)))
}
