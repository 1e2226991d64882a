//! Invoice routes: drafting, lifecycle actions and bulk repricing.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
};
use chrono::{NaiveDate, Utc};
use freightbill_core::{EngineError, MAX_AMOUNT, MAX_MEASURE, MAX_SCALE};
use freightbill_core::currency::CurrencyError;
use freightbill_core::engine::ReleaseReport;
use freightbill_core::invoice::{Invoice, InvoiceHeader};
use freightbill_core::ledger::{AdjustmentKind, NewAdjustment, NewLineItem};
use freightbill_core::lifecycle::{InvoiceStatus, UserRole};
use freightbill_core::rating::Dimensions;
use freightbill_db::repositories::{
    InvoiceDetail, InvoiceFilter, InvoiceSummary, LineInput, RepriceInput, RepriceResult,
    SaveInvoiceInput, SavedInvoice,
};
use freightbill_shared::types::{
    ClientId, CurrencyCode, InvoiceId, LineItemId, PageRequest, PageResponse, ParcelId, TripId,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
use validator::{Validate, ValidationError};

use crate::{AppState, error::ApiError, middleware::AuthUser};

/// Creates the invoice routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/invoices", get(list_invoices))
        .route("/invoices", post(create_invoice))
        .route("/invoices/{invoice_id}", get(get_invoice))
        .route("/invoices/{invoice_id}", put(update_invoice))
        .route("/invoices/{invoice_id}", delete(delete_invoice))
        .route("/invoices/{invoice_id}/finalize", post(finalize_invoice))
        .route("/invoices/{invoice_id}/unlock", post(unlock_invoice))
        .route("/invoices/{invoice_id}/reprice", post(reprice_invoice))
}

// ============================================================================
// Request Types
// ============================================================================

/// Query parameters for listing invoices.
#[derive(Debug, Deserialize)]
pub struct ListInvoicesQuery {
    /// Filter by status; `overdue` selects open invoices past due.
    pub status: Option<String>,
    /// Filter by client.
    pub client_id: Option<ClientId>,
    /// Page number (1-indexed).
    pub page: Option<u32>,
    /// Page size (default: 20, max: 100).
    pub per_page: Option<u32>,
}

/// Query parameters for reading one invoice.
#[derive(Debug, Deserialize)]
pub struct GetInvoiceQuery {
    /// Display currency to project totals into.
    pub currency: Option<String>,
}

/// Request body for creating or replacing a draft.
#[derive(Debug, Deserialize, Validate)]
pub struct SaveInvoiceRequest {
    /// Billed client.
    pub client_id: Option<ClientId>,
    /// Trip the invoice belongs to.
    pub trip_id: Option<TripId>,
    /// Currency the client sees.
    pub display_currency: CurrencyCode,
    /// Issue date.
    pub issue_date: NaiveDate,
    /// Due date.
    pub due_date: Option<NaiveDate>,
    /// Free-text terms.
    #[validate(length(max = 255))]
    pub payment_terms: Option<String>,
    /// Free-text notes.
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    /// Line items in display order.
    #[serde(default)]
    #[validate(nested)]
    pub lines: Vec<LineRequest>,
    /// Adjustments; they replace the stored set.
    #[serde(default)]
    #[validate(nested)]
    pub adjustments: Vec<AdjustmentRequest>,
    /// Total the client computed, checked against the server's.
    #[validate(custom(function = "signed_amount"))]
    pub total: Option<Decimal>,
    /// Version the edit is based on. Required when replacing.
    pub expected_version: Option<i32>,
}

/// One line of a save request.
#[derive(Debug, Deserialize, Validate)]
pub struct LineRequest {
    /// Existing line to update; a new line when absent.
    pub id: Option<LineItemId>,
    /// Billed parcel, if any.
    pub parcel_id: Option<ParcelId>,
    /// Description.
    #[serde(default)]
    #[validate(length(max = 500))]
    pub description: String,
    /// Number of pieces.
    #[serde(default = "one")]
    #[validate(custom(function = "measure"))]
    pub quantity: Decimal,
    /// Actual weight in kg.
    #[serde(default)]
    #[validate(custom(function = "measure"))]
    pub actual_weight: Decimal,
    /// Dimensions in cm.
    #[serde(default)]
    #[validate(custom(function = "dimensions"))]
    pub dimensions: Dimensions,
    /// Rate per kg.
    #[validate(custom(function = "amount"))]
    pub rate: Decimal,
}

/// One adjustment of a save request.
#[derive(Debug, Deserialize, Validate)]
pub struct AdjustmentRequest {
    /// Description.
    #[validate(length(min = 1, max = 255))]
    pub description: String,
    /// Unsigned amount.
    #[validate(custom(function = "amount"))]
    pub amount: Decimal,
    /// Addition or deduction.
    pub kind: AdjustmentKind,
}

/// Request body carrying the version a lifecycle action is based on.
#[derive(Debug, Deserialize)]
pub struct VersionRequest {
    /// Version the caller read.
    pub expected_version: i32,
}

/// Request body for finalizing a draft.
#[derive(Debug, Deserialize, Validate)]
pub struct FinalizeRequest {
    /// Version the caller read.
    pub expected_version: i32,
    /// Total the caller is showing; finalize fails when it is stale.
    #[validate(custom(function = "signed_amount"))]
    pub total: Option<Decimal>,
}

/// Request body for a bulk rate change.
///
/// Either `rate` for the selected lines, or `target_total` to solve the
/// rate that makes the invoice total come out at that figure.
#[derive(Debug, Deserialize, Validate)]
pub struct RepriceRequest {
    /// Selected lines; `target_total` defaults to every line.
    pub line_ids: Option<Vec<LineItemId>>,
    /// New rate per kg.
    #[validate(custom(function = "amount"))]
    pub rate: Option<Decimal>,
    /// Desired grand total.
    #[validate(custom(function = "amount"))]
    pub target_total: Option<Decimal>,
}

fn one() -> Decimal {
    Decimal::ONE
}

fn within(value: &Decimal, max: Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::new("non_negative"));
    }
    if *value > max {
        return Err(ValidationError::new("out_of_range"));
    }
    if value.normalize().scale() > MAX_SCALE {
        return Err(ValidationError::new("too_many_decimals"));
    }
    Ok(())
}

/// Weights, sides and quantities: non-negative, at most `MAX_MEASURE`.
pub(crate) fn measure(value: &Decimal) -> Result<(), ValidationError> {
    within(value, MAX_MEASURE)
}

/// Rates and money: non-negative, at most `MAX_AMOUNT`.
pub(crate) fn amount(value: &Decimal) -> Result<(), ValidationError> {
    within(value, MAX_AMOUNT)
}

/// Totals that deductions may push below zero.
pub(crate) fn signed_amount(value: &Decimal) -> Result<(), ValidationError> {
    amount(&value.abs())
}

fn dimensions(value: &Dimensions) -> Result<(), ValidationError> {
    [value.length, value.width, value.height]
        .iter()
        .flatten()
        .try_for_each(measure)
}

impl SaveInvoiceRequest {
    fn into_input(self) -> SaveInvoiceInput {
        SaveInvoiceInput {
            header: InvoiceHeader {
                client_id: self.client_id,
                trip_id: self.trip_id,
                display_currency: self.display_currency,
                issue_date: self.issue_date,
                due_date: self.due_date,
                payment_terms: self.payment_terms,
                notes: self.notes,
            },
            lines: self
                .lines
                .into_iter()
                .map(|line| LineInput {
                    id: line.id,
                    line: NewLineItem {
                        parcel_id: line.parcel_id,
                        description: line.description,
                        quantity: line.quantity,
                        actual_weight: line.actual_weight,
                        dimensions: line.dimensions,
                        rate: line.rate,
                    },
                })
                .collect(),
            adjustments: self
                .adjustments
                .into_iter()
                .map(|adj| NewAdjustment {
                    description: adj.description,
                    amount: adj.amount,
                    kind: adj.kind,
                })
                .collect(),
            submitted_total: self.total,
        }
    }
}

impl RepriceRequest {
    fn into_input(self) -> Result<RepriceInput, ApiError> {
        match (self.rate, self.target_total) {
            (Some(rate), None) => {
                let line_ids = self
                    .line_ids
                    .ok_or_else(|| ApiError::bad_request("line_ids is required with rate"))?;
                Ok(RepriceInput::Rate { line_ids, rate })
            }
            (None, Some(target_total)) => Ok(RepriceInput::TargetTotal {
                line_ids: self.line_ids,
                target_total,
            }),
            _ => Err(ApiError::bad_request(
                "Exactly one of rate or target_total is required",
            )),
        }
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET `/invoices` - List invoices with the overdue-aware status.
async fn list_invoices(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListInvoicesQuery>,
) -> Result<Json<PageResponse<InvoiceSummary>>, ApiError> {
    auth.require(UserRole::Viewer)?;

    let status = query
        .status
        .as_deref()
        .map(|s| {
            InvoiceStatus::parse(s).ok_or_else(|| ApiError::bad_request(format!("Unknown status: {s}")))
        })
        .transpose()?;
    let filter = InvoiceFilter {
        status,
        client_id: query.client_id,
    };
    let defaults = PageRequest::default();
    let page = PageRequest {
        page: query.page.unwrap_or(defaults.page),
        per_page: query.per_page.unwrap_or(defaults.per_page),
    };

    let invoices = state
        .invoices
        .list(auth.tenant_id(), &filter, page, today())
        .await?;
    Ok(Json(invoices))
}

/// GET `/invoices/{invoice_id}` - Invoice with payments and display totals.
async fn get_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(invoice_id): Path<InvoiceId>,
    Query(query): Query<GetInvoiceQuery>,
) -> Result<Json<InvoiceDetail>, ApiError> {
    auth.require(UserRole::Viewer)?;

    let currency = query
        .currency
        .as_deref()
        .map(|code| {
            CurrencyCode::parse(code)
                .map_err(|e| EngineError::from(CurrencyError::InvalidCurrencyCode(e.0)))
        })
        .transpose()?;

    let detail = state
        .invoices
        .detail(
            auth.tenant_id(),
            invoice_id,
            &state.rates,
            currency.as_ref(),
            today(),
        )
        .await?;
    Ok(Json(detail))
}

/// POST `/invoices` - Create a numbered draft and claim its parcels.
async fn create_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<SaveInvoiceRequest>,
) -> Result<(StatusCode, Json<Invoice>), ApiError> {
    auth.require(UserRole::EDIT)?;
    payload.validate()?;

    let invoice = state
        .invoices
        .create(auth.tenant_id(), auth.user_id(), payload.into_input())
        .await?;

    info!(
        invoice_id = %invoice.id,
        number = %invoice.number,
        user_id = %auth.user_id(),
        "Invoice created"
    );
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// PUT `/invoices/{invoice_id}` - Replace a draft's header, lines and adjustments.
async fn update_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(invoice_id): Path<InvoiceId>,
    Json(payload): Json<SaveInvoiceRequest>,
) -> Result<Json<SavedInvoice>, ApiError> {
    auth.require(UserRole::EDIT)?;
    payload.validate()?;
    let expected_version = payload
        .expected_version
        .ok_or_else(|| ApiError::bad_request("expected_version is required"))?;

    let saved = state
        .invoices
        .update(
            auth.tenant_id(),
            invoice_id,
            expected_version,
            auth.user_id(),
            payload.into_input(),
        )
        .await?;
    Ok(Json(saved))
}

/// DELETE `/invoices/{invoice_id}` - Delete a draft and release its parcels.
async fn delete_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(invoice_id): Path<InvoiceId>,
) -> Result<Json<ReleaseReport>, ApiError> {
    auth.require(UserRole::EDIT)?;

    let report = state.invoices.delete(auth.tenant_id(), invoice_id).await?;

    info!(
        invoice_id = %invoice_id,
        released = report.released.len(),
        user_id = %auth.user_id(),
        "Invoice deleted"
    );
    Ok(Json(report))
}

/// POST `/invoices/{invoice_id}/finalize` - Lock a draft and mark it sent.
async fn finalize_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(invoice_id): Path<InvoiceId>,
    Json(payload): Json<FinalizeRequest>,
) -> Result<Json<Invoice>, ApiError> {
    auth.require(UserRole::EDIT)?;
    payload.validate()?;

    let invoice = state
        .invoices
        .finalize(
            auth.tenant_id(),
            invoice_id,
            payload.expected_version,
            payload.total,
            auth.user_id(),
        )
        .await?;
    Ok(Json(invoice))
}

/// POST `/invoices/{invoice_id}/unlock` - Return a locked invoice to draft.
///
/// The engine enforces the admin/owner requirement so the refusal carries
/// the caller's role.
async fn unlock_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(invoice_id): Path<InvoiceId>,
    Json(payload): Json<VersionRequest>,
) -> Result<Json<Invoice>, ApiError> {
    let role = auth.require(UserRole::Viewer)?;

    let invoice = state
        .invoices
        .unlock(
            auth.tenant_id(),
            invoice_id,
            payload.expected_version,
            role,
            auth.user_id(),
        )
        .await?;
    Ok(Json(invoice))
}

/// POST `/invoices/{invoice_id}/reprice` - Set one rate on a selection of lines.
async fn reprice_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(invoice_id): Path<InvoiceId>,
    Json(payload): Json<RepriceRequest>,
) -> Result<Json<RepriceResult>, ApiError> {
    auth.require(UserRole::EDIT)?;
    payload.validate()?;
    let input = payload.into_input()?;

    let result = state
        .invoices
        .reprice(auth.tenant_id(), invoice_id, input, auth.user_id())
        .await?;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn save_request(body: serde_json::Value) -> SaveInvoiceRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_save_request_maps_lines_and_adjustments() {
        let line_id = LineItemId::new();
        let request = save_request(json!({
            "client_id": ClientId::new(),
            "display_currency": "eur",
            "issue_date": "2026-05-01",
            "lines": [
                { "id": line_id, "description": "Pallet", "actual_weight": "12.5", "rate": "4" },
                { "description": "Loose", "quantity": "3", "actual_weight": "2", "rate": "4",
                  "dimensions": { "length": "50", "width": "40", "height": "30" } }
            ],
            "adjustments": [ { "description": "Fuel", "amount": "10", "kind": "addition" } ],
            "total": "70"
        }));
        assert!(request.validate().is_ok());

        let input = request.into_input();

        assert_eq!(input.header.display_currency.as_str(), "EUR");
        assert_eq!(input.lines[0].id, Some(line_id));
        assert_eq!(input.lines[0].line.quantity, Decimal::ONE);
        assert_eq!(input.lines[1].line.dimensions.height, Some(dec!(30)));
        assert_eq!(input.adjustments[0].kind, AdjustmentKind::Addition);
        assert_eq!(input.submitted_total, Some(dec!(70)));
    }

    #[test]
    fn test_negative_rate_fails_validation() {
        let request = save_request(json!({
            "display_currency": "USD",
            "issue_date": "2026-05-01",
            "lines": [ { "actual_weight": "1", "rate": "-4" } ]
        }));
        let errors = request.validate().unwrap_err();
        assert!(errors.to_string().contains("rate"));
    }

    #[test]
    fn test_bad_currency_is_rejected_on_parse() {
        let result = serde_json::from_value::<SaveInvoiceRequest>(json!({
            "display_currency": "EURO",
            "issue_date": "2026-05-01"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_reprice_rate_needs_selection() {
        let request = RepriceRequest {
            line_ids: None,
            rate: Some(dec!(5)),
            target_total: None,
        };
        assert!(request.into_input().is_err());
    }

    #[test]
    fn test_reprice_target_total_defaults_to_all_lines() {
        let request = RepriceRequest {
            line_ids: None,
            rate: None,
            target_total: Some(dec!(110)),
        };
        assert_eq!(
            request.into_input().unwrap(),
            RepriceInput::TargetTotal {
                line_ids: None,
                target_total: dec!(110)
            }
        );
    }

    #[test]
    fn test_reprice_rejects_both_modes() {
        let request = RepriceRequest {
            line_ids: Some(vec![LineItemId::new()]),
            rate: Some(dec!(5)),
            target_total: Some(dec!(110)),
        };
        assert!(request.into_input().is_err());
    }

    #[test]
    fn test_amount_bounds() {
        assert!(amount(&dec!(0)).is_ok());
        assert!(amount(&dec!(-0.00)).is_ok());
        assert!(amount(&dec!(0.000001)).is_ok());
        assert!(amount(&dec!(1.5000000000)).is_ok());
        assert!(amount(&MAX_AMOUNT).is_ok());
        assert!(amount(&dec!(-0.01)).is_err());
        assert!(amount(&dec!(0.0000001)).is_err());
        assert!(amount(&(MAX_AMOUNT + Decimal::ONE)).is_err());
        assert!(signed_amount(&dec!(-150)).is_ok());
        assert!(signed_amount(&Decimal::MIN).is_err());
    }

    #[test]
    fn test_huge_dimensions_fail_validation() {
        let request = save_request(json!({
            "display_currency": "USD",
            "issue_date": "2026-05-01",
            "lines": [ { "actual_weight": "1", "rate": "1",
              "dimensions": { "length": "10000000000", "width": "10000000000", "height": "10000000000" } } ]
        }));
        let errors = request.validate().unwrap_err();
        assert!(errors.to_string().contains("dimensions"));
        assert!(measure(&MAX_MEASURE).is_ok());
        assert!(measure(&(MAX_MEASURE + Decimal::ONE)).is_err());
    }

    #[test]
    fn test_finalize_request_total_is_optional() {
        let request: FinalizeRequest =
            serde_json::from_value(json!({ "expected_version": 3 })).unwrap();
        assert_eq!(request.total, None);
        assert!(request.validate().is_ok());

        let request: FinalizeRequest =
            serde_json::from_value(json!({ "expected_version": 3, "total": "-150.25" })).unwrap();
        assert_eq!(request.total, Some(dec!(-150.25)));
        assert!(request.validate().is_ok());
    }
}
