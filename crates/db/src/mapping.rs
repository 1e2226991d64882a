//! Conversions between stored rows and engine types.
//!
//! Reads go through [`line_from_model`], which applies the legacy weight
//! normalisation exactly once, at the storage boundary.

use chrono::{DateTime, Utc};
use freightbill_core::invoice::{Invoice, InvoiceHeader};
use freightbill_core::ledger::{Adjustment, AdjustmentKind, LineItem};
use freightbill_core::lifecycle::InvoiceStatus;
use freightbill_core::ownership::ParcelInfo;
use freightbill_core::payment::{Payment, PaymentMethod};
use freightbill_core::rating::{normalize_legacy_line, Dimensions, LegacyLine, LegacyOutcome};
use freightbill_shared::types::{
    AdjustmentId, ClientId, CurrencyCode, InvoiceId, LineItemId, ParcelId, PaymentId, TenantId,
    TripId, UserId,
};
use sea_orm::ActiveValue::Set;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

use crate::entities::sea_orm_active_enums::{
    InvoiceStatus as DbInvoiceStatus, PaymentMethod as DbPaymentMethod,
};
use crate::entities::{invoice_adjustments, invoice_line_items, invoices, parcels, payments};
use crate::error::RepositoryError;

/// Stored form of a status. `Overdue` is derived and has none.
pub fn status_to_db(status: InvoiceStatus) -> Result<DbInvoiceStatus, RepositoryError> {
    match status {
        InvoiceStatus::Draft => Ok(DbInvoiceStatus::Draft),
        InvoiceStatus::Sent => Ok(DbInvoiceStatus::Sent),
        InvoiceStatus::Partial => Ok(DbInvoiceStatus::Partial),
        InvoiceStatus::Paid => Ok(DbInvoiceStatus::Paid),
        InvoiceStatus::Overdue => Err(RepositoryError::corrupt(
            "invoices",
            "overdue is derived and cannot be stored",
        )),
    }
}

/// Engine form of a stored status.
#[must_use]
pub const fn status_from_db(status: DbInvoiceStatus) -> InvoiceStatus {
    match status {
        DbInvoiceStatus::Draft => InvoiceStatus::Draft,
        DbInvoiceStatus::Sent => InvoiceStatus::Sent,
        DbInvoiceStatus::Partial => InvoiceStatus::Partial,
        DbInvoiceStatus::Paid => InvoiceStatus::Paid,
    }
}

#[must_use]
pub const fn method_to_db(method: PaymentMethod) -> DbPaymentMethod {
    match method {
        PaymentMethod::Cash => DbPaymentMethod::Cash,
        PaymentMethod::BankTransfer => DbPaymentMethod::BankTransfer,
        PaymentMethod::Card => DbPaymentMethod::Card,
        PaymentMethod::Cheque => DbPaymentMethod::Cheque,
        PaymentMethod::Other => DbPaymentMethod::Other,
    }
}

#[must_use]
pub const fn method_from_db(method: DbPaymentMethod) -> PaymentMethod {
    match method {
        DbPaymentMethod::Cash => PaymentMethod::Cash,
        DbPaymentMethod::BankTransfer => PaymentMethod::BankTransfer,
        DbPaymentMethod::Card => PaymentMethod::Card,
        DbPaymentMethod::Cheque => PaymentMethod::Cheque,
        DbPaymentMethod::Other => PaymentMethod::Other,
    }
}

fn currency(table: &'static str, code: &str) -> Result<CurrencyCode, RepositoryError> {
    CurrencyCode::parse(code).map_err(|e| RepositoryError::corrupt(table, e.to_string()))
}

fn utc(at: DateTimeWithTimeZone) -> DateTime<Utc> {
    at.with_timezone(&Utc)
}

/// Reads a stored line, recovering the weight of rows written before the
/// weight column existed.
#[must_use]
pub fn line_from_model(model: invoice_line_items::Model) -> LineItem {
    let normalized = normalize_legacy_line(LegacyLine {
        quantity: model.quantity,
        weight: model.weight,
    });
    if let LegacyOutcome::WeightRecoveredFromQuantity { original_quantity } = normalized.outcome {
        tracing::warn!(
            line_id = %model.id,
            invoice_id = %model.invoice_id,
            %original_quantity,
            "Legacy line normalized: quantity reinterpreted as weight"
        );
    }

    LineItem {
        id: LineItemId::from_uuid(model.id),
        parcel_id: model.parcel_id.map(ParcelId::from_uuid),
        description: model.description,
        quantity: normalized.quantity,
        actual_weight: normalized.weight,
        dimensions: Dimensions {
            length: model.length,
            width: model.width,
            height: model.height,
        },
        rate: model.rate,
        amount: model.amount,
    }
}

#[must_use]
pub fn adjustment_from_model(model: invoice_adjustments::Model) -> Adjustment {
    Adjustment {
        id: AdjustmentId::from_uuid(model.id),
        description: model.description,
        amount: model.amount,
        kind: if model.is_addition {
            AdjustmentKind::Addition
        } else {
            AdjustmentKind::Deduction
        },
    }
}

/// Assembles an invoice from its row and children, already ordered by position.
pub fn invoice_from_models(
    model: invoices::Model,
    lines: Vec<invoice_line_items::Model>,
    adjustments: Vec<invoice_adjustments::Model>,
) -> Result<Invoice, RepositoryError> {
    Ok(Invoice {
        id: InvoiceId::from_uuid(model.id),
        tenant_id: TenantId::from_uuid(model.tenant_id),
        number: model.number,
        header: InvoiceHeader {
            client_id: model.client_id.map(ClientId::from_uuid),
            trip_id: model.trip_id.map(TripId::from_uuid),
            display_currency: currency("invoices", &model.display_currency)?,
            issue_date: model.issue_date,
            due_date: model.due_date,
            payment_terms: model.payment_terms,
            notes: model.notes,
        },
        ledger_currency: currency("invoices", &model.ledger_currency)?,
        lines: lines.into_iter().map(line_from_model).collect(),
        adjustments: adjustments.into_iter().map(adjustment_from_model).collect(),
        status: status_from_db(model.status),
        total: model.total,
        paid_amount: model.paid_amount,
        locked_at: model.locked_at.map(utc),
        version: model.version,
        created_by: UserId::from_uuid(model.created_by),
        created_at: utc(model.created_at),
        updated_by: model.updated_by.map(UserId::from_uuid),
        updated_at: utc(model.updated_at),
    })
}

#[must_use]
pub fn payment_from_model(model: payments::Model) -> Payment {
    Payment {
        id: PaymentId::from_uuid(model.id),
        invoice_id: InvoiceId::from_uuid(model.invoice_id),
        amount: model.amount,
        date: model.payment_date,
        method: method_from_db(model.method),
        reference: model.reference,
        notes: model.notes,
        reverses: model.reverses_payment_id.map(PaymentId::from_uuid),
        recorded_by: UserId::from_uuid(model.recorded_by),
        recorded_at: utc(model.created_at),
    }
}

/// Parcel fields the engine consumes. The label is the description when
/// one was captured, the tracking number otherwise.
#[must_use]
pub fn parcel_from_model(model: parcels::Model) -> ParcelInfo {
    let description = model
        .description
        .filter(|d| !d.trim().is_empty())
        .map_or_else(|| model.tracking_number.clone(), |d| format!("{} - {d}", model.tracking_number));
    ParcelInfo {
        id: ParcelId::from_uuid(model.id),
        client_id: ClientId::from_uuid(model.client_id),
        description,
        weight: model.weight,
        dimensions: Dimensions {
            length: model.length,
            width: model.width,
            height: model.height,
        },
        invoice_id: model.invoice_id.map(InvoiceId::from_uuid),
    }
}

/// Insert model for a line. Weight is always written, so rows saved here
/// never take the legacy path again.
#[must_use]
pub fn line_active_model(
    invoice_id: Uuid,
    position: i32,
    line: &LineItem,
    now: DateTimeWithTimeZone,
) -> invoice_line_items::ActiveModel {
    invoice_line_items::ActiveModel {
        id: Set(line.id.into_inner()),
        invoice_id: Set(invoice_id),
        position: Set(position),
        parcel_id: Set(line.parcel_id.map(ParcelId::into_inner)),
        description: Set(line.description.clone()),
        quantity: Set(line.quantity),
        weight: Set(Some(line.actual_weight)),
        length: Set(line.dimensions.length),
        width: Set(line.dimensions.width),
        height: Set(line.dimensions.height),
        rate: Set(line.rate),
        amount: Set(line.amount),
        created_at: Set(now),
    }
}

#[must_use]
pub fn adjustment_active_model(
    invoice_id: Uuid,
    position: i32,
    adjustment: &Adjustment,
    now: DateTimeWithTimeZone,
) -> invoice_adjustments::ActiveModel {
    invoice_adjustments::ActiveModel {
        id: Set(adjustment.id.into_inner()),
        invoice_id: Set(invoice_id),
        position: Set(position),
        description: Set(adjustment.description.clone()),
        amount: Set(adjustment.amount),
        is_addition: Set(adjustment.kind.is_addition()),
        created_at: Set(now),
    }
}

#[must_use]
pub fn payment_active_model(tenant_id: TenantId, payment: &Payment) -> payments::ActiveModel {
    payments::ActiveModel {
        id: Set(payment.id.into_inner()),
        tenant_id: Set(tenant_id.into_inner()),
        invoice_id: Set(payment.invoice_id.into_inner()),
        amount: Set(payment.amount),
        payment_date: Set(payment.date),
        method: Set(method_to_db(payment.method)),
        reference: Set(payment.reference.clone()),
        notes: Set(payment.notes.clone()),
        reverses_payment_id: Set(payment.reverses.map(PaymentId::into_inner)),
        recorded_by: Set(payment.recorded_by.into_inner()),
        created_at: Set(payment.recorded_at.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn stored_line(quantity: rust_decimal::Decimal, weight: Option<rust_decimal::Decimal>) -> invoice_line_items::Model {
        invoice_line_items::Model {
            id: Uuid::new_v4(),
            invoice_id: Uuid::new_v4(),
            position: 0,
            parcel_id: None,
            description: "Freight".to_string(),
            quantity,
            weight,
            length: None,
            width: None,
            height: None,
            rate: dec!(3),
            amount: dec!(37.5),
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn test_legacy_line_recovers_weight() {
        let line = line_from_model(stored_line(dec!(12.5), None));
        assert_eq!(line.quantity, dec!(1));
        assert_eq!(line.actual_weight, dec!(12.5));
        assert_eq!(line.amount, dec!(37.5));
    }

    #[test]
    fn test_modern_line_untouched() {
        let line = line_from_model(stored_line(dec!(12), Some(dec!(4))));
        assert_eq!(line.quantity, dec!(12));
        assert_eq!(line.actual_weight, dec!(4));
    }

    #[test]
    fn test_status_round_trip_and_overdue() {
        for status in [
            InvoiceStatus::Draft,
            InvoiceStatus::Sent,
            InvoiceStatus::Partial,
            InvoiceStatus::Paid,
        ] {
            assert_eq!(status_from_db(status_to_db(status).unwrap()), status);
        }
        assert!(status_to_db(InvoiceStatus::Overdue).is_err());
    }

    #[test]
    fn test_parcel_label() {
        let now: DateTimeWithTimeZone = Utc::now().into();
        let model = parcels::Model {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            tracking_number: "TRK-1".to_string(),
            description: Some("Spare parts".to_string()),
            weight: dec!(2),
            length: None,
            width: None,
            height: None,
            invoice_id: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(parcel_from_model(model.clone()).description, "TRK-1 - Spare parts");
        let bare = parcels::Model {
            description: None,
            ..model
        };
        assert_eq!(parcel_from_model(bare).description, "TRK-1");
    }
}
