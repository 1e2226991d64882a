//! API route definitions.

use axum::{Router, middleware};

use crate::{AppState, middleware::auth::auth_middleware};

pub mod exchange_rates;
pub mod health;
pub mod invoices;
pub mod parcels;
pub mod payments;

/// Creates the API router; everything except health sits behind the
/// auth middleware.
#[allow(clippy::needless_pass_by_value)]
pub fn api_routes_with_state(state: AppState) -> Router<AppState> {
    let protected_routes = Router::new()
        .merge(invoices::routes())
        .merge(payments::routes())
        .merge(parcels::routes())
        .merge(exchange_rates::routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(health::routes())
        .merge(protected_routes)
}
