//! Parcel billing routes: importing parcels onto a draft, moving them
//! between drafts, and listing what a client has not been billed for.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use freightbill_core::engine::{ReassignmentOutcome, ReassignmentRequest};
use freightbill_core::lifecycle::UserRole;
use freightbill_core::ownership::ParcelInfo;
use freightbill_db::repositories::{ClientRecord, ImportResult};
use freightbill_shared::types::{ClientId, InvoiceId, ParcelId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use validator::Validate;

use super::invoices::amount;
use crate::{AppState, error::ApiError, middleware::AuthUser};

/// Creates the parcel routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/invoices/{invoice_id}/parcels", post(import_parcels))
        .route(
            "/invoices/{invoice_id}/reassign-parcels",
            post(reassign_parcels),
        )
        .route("/clients/{client_id}", get(get_client))
        .route("/clients/{client_id}/unbilled-parcels", get(list_unbilled))
}

/// Request body for importing parcels.
#[derive(Debug, Deserialize, Validate)]
pub struct ImportParcelsRequest {
    /// Parcels to bill on the invoice.
    #[validate(length(min = 1, max = 500))]
    pub parcel_ids: Vec<ParcelId>,
}

/// Request body for moving parcels onto the invoice in the path.
#[derive(Debug, Deserialize, Validate)]
pub struct ReassignParcelsRequest {
    /// Parcels to move.
    #[validate(length(min = 1, max = 500))]
    pub parcel_ids: Vec<ParcelId>,
    /// Invoice that bills them now.
    pub from_invoice_id: InvoiceId,
    /// The caller has seen the warnings and wants the move.
    #[serde(default)]
    pub confirmed: bool,
    /// Rate for the new lines; the old line's rate when absent.
    #[validate(custom(function = "amount"))]
    pub rate: Option<Decimal>,
}

/// Unbilled parcels of a client.
#[derive(Debug, Serialize)]
pub struct UnbilledParcelsResponse {
    /// Client the parcels belong to.
    pub client_id: ClientId,
    /// Parcels no invoice bills yet.
    pub parcels: Vec<ParcelInfo>,
}

/// POST `/invoices/{invoice_id}/parcels` - Bill parcels on a draft.
///
/// All-or-nothing: if any parcel is billed elsewhere nothing is claimed and
/// the response lists every conflict.
async fn import_parcels(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(invoice_id): Path<InvoiceId>,
    Json(payload): Json<ImportParcelsRequest>,
) -> Result<Json<ImportResult>, ApiError> {
    auth.require(UserRole::EDIT)?;
    payload.validate()?;

    let result = state
        .invoices
        .import_parcels(
            auth.tenant_id(),
            invoice_id,
            &payload.parcel_ids,
            auth.user_id(),
        )
        .await?;
    Ok(Json(result))
}

/// POST `/invoices/{invoice_id}/reassign-parcels` - Move parcels from
/// another draft onto this one.
///
/// Without `confirmed` nothing changes: the response is `409` with the
/// warnings the caller must acknowledge.
async fn reassign_parcels(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(invoice_id): Path<InvoiceId>,
    Json(payload): Json<ReassignParcelsRequest>,
) -> Result<Response, ApiError> {
    auth.require(UserRole::EDIT)?;
    payload.validate()?;

    let request = ReassignmentRequest {
        parcel_ids: payload.parcel_ids,
        from_invoice: payload.from_invoice_id,
        to_invoice: invoice_id,
        confirmed: payload.confirmed,
        rate: payload.rate,
    };
    let result = state
        .invoices
        .reassign_parcels(auth.tenant_id(), &request, auth.user_id())
        .await?;

    if let ReassignmentOutcome::NeedsConfirmation { plan } = &result.outcome {
        return Ok((
            StatusCode::CONFLICT,
            Json(json!({
                "error": "REASSIGNMENT_NEEDS_CONFIRMATION",
                "message": "Parcels are billed on another invoice; resend with confirmed=true to move them",
                "details": plan,
            })),
        )
            .into_response());
    }

    info!(
        from_invoice = %request.from_invoice,
        to_invoice = %request.to_invoice,
        parcels = request.parcel_ids.len(),
        user_id = %auth.user_id(),
        "Parcels reassigned"
    );
    Ok(Json(result).into_response())
}

/// GET `/clients/{client_id}` - Billing fields of a client.
async fn get_client(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(client_id): Path<ClientId>,
) -> Result<Json<ClientRecord>, ApiError> {
    auth.require(UserRole::Viewer)?;

    let client = state.clients.find(auth.tenant_id(), client_id).await?;
    Ok(Json(client))
}

/// GET `/clients/{client_id}/unbilled-parcels` - Parcels ready to import.
async fn list_unbilled(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(client_id): Path<ClientId>,
) -> Result<Json<UnbilledParcelsResponse>, ApiError> {
    auth.require(UserRole::Viewer)?;

    let parcels = state
        .parcels
        .list_unbilled(auth.tenant_id(), client_id)
        .await?;
    Ok(Json(UnbilledParcelsResponse { client_id, parcels }))
}
