//! Payment routes.
//!
//! Payments are append-only. A correction is a second `POST` naming the
//! payment it reverses.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::NaiveDate;
use freightbill_core::lifecycle::UserRole;
use freightbill_core::payment::{NewPayment, Payment, PaymentMethod};
use freightbill_db::repositories::RecordedPayment;
use freightbill_shared::types::{InvoiceId, PaymentId};
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use crate::{AppState, error::ApiError, middleware::AuthUser};

/// Creates the payment routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/invoices/{invoice_id}/payments", get(list_payments))
        .route("/invoices/{invoice_id}/payments", post(record_payment))
}

/// Request body for recording a payment or reversing one.
#[derive(Debug, Deserialize, Validate)]
pub struct RecordPaymentRequest {
    /// Amount received. Ignored for reversals.
    #[validate(custom(function = "super::invoices::amount"))]
    pub amount: Option<Decimal>,
    /// Date received.
    pub date: Option<NaiveDate>,
    /// How it was paid.
    pub method: Option<PaymentMethod>,
    /// Bank or cheque reference.
    #[validate(length(max = 255))]
    pub reference: Option<String>,
    /// Free-text notes.
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    /// Payment to reverse instead of recording a new one.
    pub reverses_payment_id: Option<PaymentId>,
}

/// What a payment request asks for.
#[derive(Debug, PartialEq, Eq)]
enum PaymentCommand {
    Record(NewPayment),
    Reverse {
        original: PaymentId,
        notes: Option<String>,
    },
}

impl RecordPaymentRequest {
    fn into_command(self) -> Result<PaymentCommand, ApiError> {
        if let Some(original) = self.reverses_payment_id {
            return Ok(PaymentCommand::Reverse {
                original,
                notes: self.notes,
            });
        }

        let (Some(amount), Some(date)) = (self.amount, self.date) else {
            return Err(ApiError::bad_request("amount and date are required"));
        };
        Ok(PaymentCommand::Record(NewPayment {
            amount,
            date,
            method: self.method.unwrap_or(PaymentMethod::BankTransfer),
            reference: self.reference,
            notes: self.notes,
        }))
    }
}

/// GET `/invoices/{invoice_id}/payments` - Payment history, oldest first.
async fn list_payments(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(invoice_id): Path<InvoiceId>,
) -> Result<Json<Vec<Payment>>, ApiError> {
    auth.require(UserRole::Viewer)?;

    let payments = state.payments.list(auth.tenant_id(), invoice_id).await?;
    Ok(Json(payments))
}

/// POST `/invoices/{invoice_id}/payments` - Record a payment or its reversal.
async fn record_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(invoice_id): Path<InvoiceId>,
    Json(payload): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<RecordedPayment>), ApiError> {
    auth.require(UserRole::EDIT)?;
    payload.validate()?;

    let recorded = match payload.into_command()? {
        PaymentCommand::Record(payment) => {
            state
                .payments
                .record(auth.tenant_id(), invoice_id, payment, auth.user_id())
                .await?
        }
        PaymentCommand::Reverse { original, notes } => {
            state
                .payments
                .reverse(auth.tenant_id(), invoice_id, original, notes, auth.user_id())
                .await?
        }
    };
    Ok((StatusCode::CREATED, Json(recorded)))
}
