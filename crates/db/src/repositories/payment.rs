//! Payment repository.
//!
//! Payments are append-only: a mistake is corrected by inserting a
//! reversing entry, never by editing a row. Each insert locks the invoice
//! row and re-reads the full history, so the stored `paid_amount` and
//! status always come from the sum of rows that exist.

use chrono::Utc;
use freightbill_core::invoice::Invoice;
use freightbill_core::payment::{NewPayment, Payment, ReconciliationSummary};
use freightbill_core::{BillingEngine, EngineError};
use freightbill_shared::types::{InvoiceId, PaymentId, TenantId, UserId};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use serde::Serialize;

use super::invoice::{commit_version, load_on};
use crate::entities::{invoices, payments};
use crate::error::RepositoryError;
use crate::mapping::{payment_active_model, payment_from_model, status_to_db};
use crate::rls::TenantConnection;

/// A stored payment with the invoice balances after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedPayment {
    /// The inserted row.
    pub payment: Payment,
    /// Balances after the insert.
    pub summary: ReconciliationSummary,
    /// Invoice version after the insert.
    pub version: i32,
}

/// Payment repository.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    db: DatabaseConnection,
    engine: BillingEngine,
}

impl PaymentRepository {
    /// Creates a new payment repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, engine: BillingEngine) -> Self {
        Self { db, engine }
    }

    /// Payment history of an invoice, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `InvoiceNotFound` if the tenant has no such invoice.
    pub async fn list(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
    ) -> Result<Vec<Payment>, RepositoryError> {
        let exists = invoices::Entity::find_by_id(invoice_id.into_inner())
            .filter(invoices::Column::TenantId.eq(tenant_id.into_inner()))
            .count(&self.db)
            .await?;
        if exists == 0 {
            return Err(EngineError::InvoiceNotFound(invoice_id).into());
        }
        Self::list_on(&self.db, tenant_id, invoice_id).await
    }

    pub(crate) async fn list_on<C: ConnectionTrait>(
        conn: &C,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
    ) -> Result<Vec<Payment>, RepositoryError> {
        let rows = payments::Entity::find()
            .filter(payments::Column::TenantId.eq(tenant_id.into_inner()))
            .filter(payments::Column::InvoiceId.eq(invoice_id.into_inner()))
            .order_by_asc(payments::Column::CreatedAt)
            .order_by_asc(payments::Column::Id)
            .all(conn)
            .await?;
        Ok(rows.into_iter().map(payment_from_model).collect())
    }

    /// Records a payment against a finalized invoice.
    ///
    /// # Errors
    ///
    /// Returns `InvoiceIsDraft`, `NonPositiveAmount`, `InvoiceNotFound`, or a
    /// database error.
    pub async fn record(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        input: NewPayment,
        recorded_by: UserId,
    ) -> Result<RecordedPayment, RepositoryError> {
        self.append(tenant_id, invoice_id, |engine, invoice, history| {
            engine.record_payment(invoice, history, input, recorded_by)
        })
        .await
    }

    /// Records the reversing entry of an earlier payment.
    ///
    /// # Errors
    ///
    /// Returns `PaymentNotFound`, `AlreadyReversed`, `CannotReverseReversal`,
    /// `InvoiceIsDraft`, or a database error.
    pub async fn reverse(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        original: PaymentId,
        notes: Option<String>,
        recorded_by: UserId,
    ) -> Result<RecordedPayment, RepositoryError> {
        self.append(tenant_id, invoice_id, |engine, invoice, history| {
            engine.reverse_payment(invoice, history, original, notes, recorded_by)
        })
        .await
    }

    async fn append<F>(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        prepare: F,
    ) -> Result<RecordedPayment, RepositoryError>
    where
        F: FnOnce(
            &BillingEngine,
            &Invoice,
            &[Payment],
        ) -> Result<(Payment, ReconciliationSummary), EngineError>,
    {
        let tenant = TenantConnection::begin(&self.db, tenant_id).await?;
        let txn = tenant.transaction();

        let invoice = load_on(txn, tenant_id, invoice_id, true).await?;
        let history = Self::list_on(txn, tenant_id, invoice_id).await?;
        let (payment, summary) = prepare(&self.engine, &invoice, &history)?;

        payment_active_model(tenant_id, &payment).insert(txn).await?;

        let version = invoice.version + 1;
        let now: DateTimeWithTimeZone = Utc::now().into();
        commit_version(
            txn,
            tenant_id,
            invoice_id,
            invoice.version,
            invoices::ActiveModel {
                paid_amount: Set(summary.paid_amount),
                status: Set(status_to_db(summary.status)?),
                version: Set(version),
                updated_by: Set(Some(payment.recorded_by.into_inner())),
                updated_at: Set(now),
                ..Default::default()
            },
        )
        .await?;
        tenant.commit().await?;

        tracing::info!(
            invoice_id = %invoice_id,
            payment_id = %payment.id,
            amount = %payment.amount,
            reverses = ?payment.reverses,
            paid_amount = %summary.paid_amount,
            status = %summary.status,
            "Payment recorded"
        );
        Ok(RecordedPayment {
            payment,
            summary,
            version,
        })
    }
}
