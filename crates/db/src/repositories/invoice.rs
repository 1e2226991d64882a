//! Invoice repository.
//!
//! Every write has the same shape: open a [`TenantConnection`], lock the
//! invoice row, rebuild an [`InvoiceDraft`] from it, let the engine apply
//! the change, then write the row back with `version + 1` and replace its
//! children. Parcel claims run inside the same transaction through
//! [`SeaOrmClaimStore`]. Releases caused by removed lines run after commit.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{Datelike, NaiveDate, Utc};
use freightbill_core::engine::{
    ImportOutcome, InvoiceView, ReassignmentOutcome, ReassignmentRequest, ReleaseReport,
};
use freightbill_core::invoice::{Invoice, InvoiceDraft, InvoiceHeader, InvoiceNumber, ValidationError};
use freightbill_core::ledger::{InvoiceLedger, LedgerTotals, LineItemPatch, NewAdjustment, NewLineItem};
use freightbill_core::lifecycle::{InvoiceStatus, LifecycleAction, LifecycleService, UserRole};
use freightbill_core::ownership::{OwnershipError, ParcelOwnershipGuard};
use freightbill_core::payment::{Payment, ReconciliationService};
use freightbill_core::{BillingEngine, EngineError};
use freightbill_shared::types::{
    ClientId, CurrencyCode, InvoiceId, LineItemId, PageRequest, PageResponse, ParcelId, TenantId,
    TripId, UserId,
};
use rust_decimal::Decimal;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    Statement,
};
use serde::Serialize;

use super::claim_store::SeaOrmClaimStore;
use super::client::ClientRepository;
use super::exchange_rate::ExchangeRateRepository;
use super::parcel::ParcelRepository;
use super::payment::PaymentRepository;
use super::release::release_with_retry;
use super::trip::TripRepository;
use crate::entities::sea_orm_active_enums::InvoiceStatus as DbInvoiceStatus;
use crate::entities::{invoice_adjustments, invoice_line_items, invoices, tenants};
use crate::error::RepositoryError;
use crate::mapping::{
    adjustment_active_model, invoice_from_models, line_active_model, status_from_db, status_to_db,
};
use crate::rls::TenantConnection;

/// Largest page size for invoice listings.
const MAX_PER_PAGE: u32 = 100;

/// A submitted line. With an `id` it edits that stored line, without one it
/// adds a new line. Stored lines left out of a save are removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineInput {
    /// Existing line to edit.
    pub id: Option<LineItemId>,
    /// Line fields. `parcel_id` is only read for new lines.
    pub line: NewLineItem,
}

/// The full editable state of an invoice, as submitted by a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveInvoiceInput {
    /// Header fields.
    pub header: InvoiceHeader,
    /// Lines in display order.
    pub lines: Vec<LineInput>,
    /// Adjustments in display order; they replace the stored ones.
    pub adjustments: Vec<NewAdjustment>,
    /// Total the caller computed, checked against the recomputed one.
    pub submitted_total: Option<Decimal>,
}

/// Filter options for listing invoices.
#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    /// Effective status. `Overdue` matches open invoices past due.
    pub status: Option<InvoiceStatus>,
    /// Billed client.
    pub client_id: Option<ClientId>,
}

/// One row of an invoice listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceSummary {
    /// Invoice ID.
    pub id: InvoiceId,
    /// Invoice number.
    pub number: String,
    /// Billed client.
    pub client_id: Option<ClientId>,
    /// Issue date.
    pub issue_date: NaiveDate,
    /// Due date.
    pub due_date: Option<NaiveDate>,
    /// Overdue-aware status.
    pub status: InvoiceStatus,
    /// Stored total, ledger currency.
    pub total: Decimal,
    /// Paid so far.
    pub paid_amount: Decimal,
    /// Still owed.
    pub outstanding: Decimal,
    /// Ledger currency.
    pub ledger_currency: String,
    /// Version for optimistic concurrency.
    pub version: i32,
}

/// An invoice as returned to readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceDetail {
    /// The stored invoice.
    pub invoice: Invoice,
    /// Payment history, oldest first.
    pub payments: Vec<Payment>,
    /// Recomputed and optionally projected totals.
    pub view: InvoiceView,
}

/// A write that may have left parcels to release later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedInvoice {
    /// The invoice after the write.
    pub invoice: Invoice,
    /// Parcels of removed lines whose back-reference could not be cleared.
    pub pending_releases: Vec<ParcelId>,
}

/// Result of importing parcels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportResult {
    /// The invoice after the import.
    pub invoice: Invoice,
    /// Lines added and parcels skipped.
    pub outcome: ImportOutcome,
}

/// Result of a reassignment request. Invoices are only present once
/// parcels actually moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReassignmentResult {
    /// What happened.
    pub outcome: ReassignmentOutcome,
    /// Losing invoice after the move.
    pub from: Option<Invoice>,
    /// Gaining invoice after the move.
    pub to: Option<Invoice>,
}

/// A bulk rate change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepriceInput {
    /// Same rate on every selected line.
    Rate {
        /// Selected lines.
        line_ids: Vec<LineItemId>,
        /// New rate.
        rate: Decimal,
    },
    /// Solve the rate that makes the invoice total `target_total`.
    TargetTotal {
        /// Selected lines; every line when absent.
        line_ids: Option<Vec<LineItemId>>,
        /// Desired grand total.
        target_total: Decimal,
    },
}

/// Result of a reprice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepriceResult {
    /// The invoice after the change.
    pub invoice: Invoice,
    /// Rate applied to the selection.
    pub rate: Decimal,
}

/// Invoice repository.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    db: DatabaseConnection,
    engine: BillingEngine,
    release_retry: Duration,
}

impl InvoiceRepository {
    /// Creates a new invoice repository.
    ///
    /// `release_retry` bounds how long a failed parcel release is retried
    /// after a save before it is reported as pending.
    #[must_use]
    pub const fn new(db: DatabaseConnection, engine: BillingEngine, release_retry: Duration) -> Self {
        Self {
            db,
            engine,
            release_retry,
        }
    }

    /// The engine this repository runs.
    #[must_use]
    pub const fn engine(&self) -> &BillingEngine {
        &self.engine
    }

    /// Loads an invoice with its lines and adjustments.
    ///
    /// # Errors
    ///
    /// Returns `InvoiceNotFound` if the tenant has no such invoice.
    pub async fn get(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
    ) -> Result<Invoice, RepositoryError> {
        load_on(&self.db, tenant_id, invoice_id, false).await
    }

    /// Loads an invoice with payments and its read model, projected into
    /// `display_currency` when one is given.
    ///
    /// # Errors
    ///
    /// Returns `InvoiceNotFound`, `NoExchangeRate` for a currency without a
    /// rate, or a database error.
    pub async fn detail(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        rates: &ExchangeRateRepository,
        display_currency: Option<&CurrencyCode>,
        today: NaiveDate,
    ) -> Result<InvoiceDetail, RepositoryError> {
        let invoice = self.get(tenant_id, invoice_id).await?;
        let payments = PaymentRepository::list_on(&self.db, tenant_id, invoice_id).await?;
        let projector = rates
            .projector(tenant_id, &invoice.ledger_currency, today)
            .await?;
        let view = self
            .engine
            .view(&invoice, &projector, display_currency, today)?;
        Ok(InvoiceDetail {
            invoice,
            payments,
            view,
        })
    }

    /// Lists invoices, newest first, with the overdue-aware status.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(
        &self,
        tenant_id: TenantId,
        filter: &InvoiceFilter,
        page: PageRequest,
        today: NaiveDate,
    ) -> Result<PageResponse<InvoiceSummary>, RepositoryError> {
        let page = page.clamped(MAX_PER_PAGE);

        let mut query = invoices::Entity::find()
            .filter(invoices::Column::TenantId.eq(tenant_id.into_inner()));
        if let Some(client_id) = filter.client_id {
            query = query.filter(invoices::Column::ClientId.eq(client_id.into_inner()));
        }
        if let Some(status) = filter.status {
            query = query.filter(status_condition(status, today));
        }

        let total = query.clone().count(&self.db).await?;
        let rows = query
            .order_by_desc(invoices::Column::IssueDate)
            .order_by_desc(invoices::Column::Number)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await?;

        let data = rows
            .into_iter()
            .map(|model| summary_from_model(model, today))
            .collect();
        Ok(PageResponse::new(data, page.page, page.per_page, total))
    }

    /// Creates a draft, numbers it and claims the parcels its lines bill.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the draft cannot be saved, a conflict if
    /// a parcel is billed elsewhere, or a database error. Nothing is written
    /// on error.
    pub async fn create(
        &self,
        tenant_id: TenantId,
        created_by: UserId,
        input: SaveInvoiceInput,
    ) -> Result<Invoice, RepositoryError> {
        let invoice_id = InvoiceId::new();
        let mut draft = InvoiceDraft::new(invoice_id, input.header, self.engine.calculator());
        apply_save(&mut draft, input.lines, input.adjustments)?;
        let totals = self
            .engine
            .validate_for_save(&draft, input.submitted_total)?;

        let tenant = TenantConnection::begin(&self.db, tenant_id).await?;
        let txn = tenant.transaction();

        let ledger_currency = tenant_ledger_currency(txn, tenant_id).await?;
        check_references(txn, tenant_id, draft.header()).await?;
        let parcel_ids = draft.ledger().parcel_ids();
        check_parcel_clients(txn, tenant_id, draft.header(), &parcel_ids).await?;

        let number = next_number(txn, tenant_id, draft.header().issue_date.year()).await?;
        let now: DateTimeWithTimeZone = Utc::now().into();
        let header = draft.header();
        invoices::ActiveModel {
            id: Set(invoice_id.into_inner()),
            tenant_id: Set(tenant_id.into_inner()),
            number: Set(number.to_string()),
            ledger_currency: Set(ledger_currency),
            status: Set(DbInvoiceStatus::Draft),
            paid_amount: Set(Decimal::ZERO),
            locked_at: Set(None),
            locked_by: Set(None),
            created_by: Set(created_by.into_inner()),
            created_at: Set(now),
            ..draft_columns(header, &totals, 1, created_by, now)
        }
        .insert(txn)
        .await?;

        {
            let store = SeaOrmClaimStore::new(txn, tenant_id);
            ParcelOwnershipGuard::new(&store)
                .claim_all(&parcel_ids, invoice_id)
                .await?;
        }
        replace_children(txn, invoice_id, draft.ledger()).await?;
        tenant.commit().await?;

        tracing::info!(
            invoice_id = %invoice_id,
            number = %number,
            lines = draft.ledger().lines().len(),
            total = %totals.total,
            "Invoice created"
        );
        self.get(tenant_id, invoice_id).await
    }

    /// Saves the full editable state of a draft.
    ///
    /// Lines removed by the save have their parcels released after commit;
    /// releases that keep failing come back in `pending_releases`.
    ///
    /// # Errors
    ///
    /// Returns `ConcurrentModification` if the invoice moved past
    /// `expected_version`, `InvoiceLocked` unless it is a draft, or a
    /// validation, conflict or database error.
    pub async fn update(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        expected_version: i32,
        updated_by: UserId,
        input: SaveInvoiceInput,
    ) -> Result<SavedInvoice, RepositoryError> {
        let tenant = TenantConnection::begin(&self.db, tenant_id).await?;
        let txn = tenant.transaction();

        let stored = load_on(txn, tenant_id, invoice_id, true).await?;
        check_version(&stored, expected_version)?;

        let mut draft = InvoiceDraft::from_invoice(&stored, self.engine.calculator());
        draft.set_header(input.header)?;
        let before: HashSet<ParcelId> = draft.ledger().parcel_ids().into_iter().collect();
        let removed = apply_save(&mut draft, input.lines, input.adjustments)?;
        let totals = self
            .engine
            .validate_for_save(&draft, input.submitted_total)?;

        let after = draft.ledger().parcel_ids();
        let to_claim: Vec<ParcelId> = after
            .iter()
            .copied()
            .filter(|p| !before.contains(p))
            .collect();
        let to_release: Vec<ParcelId> = removed
            .into_iter()
            .filter(|p| !after.contains(p))
            .collect();

        check_references(txn, tenant_id, draft.header()).await?;
        check_parcel_clients(txn, tenant_id, draft.header(), &to_claim).await?;
        {
            let store = SeaOrmClaimStore::new(txn, tenant_id);
            ParcelOwnershipGuard::new(&store)
                .claim_all(&to_claim, invoice_id)
                .await?;
        }

        let now: DateTimeWithTimeZone = Utc::now().into();
        commit_version(
            txn,
            tenant_id,
            invoice_id,
            expected_version,
            draft_columns(draft.header(), &totals, expected_version + 1, updated_by, now),
        )
        .await?;
        replace_children(txn, invoice_id, draft.ledger()).await?;
        tenant.commit().await?;

        tracing::info!(
            invoice_id = %invoice_id,
            version = expected_version + 1,
            claimed = to_claim.len(),
            released = to_release.len(),
            total = %totals.total,
            "Invoice saved"
        );

        let report = release_with_retry(
            &self.db,
            &self.engine,
            tenant_id,
            invoice_id,
            &to_release,
            self.release_retry,
        )
        .await;
        Ok(SavedInvoice {
            invoice: self.get(tenant_id, invoice_id).await?,
            pending_releases: report.pending,
        })
    }

    /// Deletes a draft and releases its parcels in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns `InvoiceLocked` unless the invoice is a draft,
    /// `InvoiceHasPayments` if payments were recorded before an unlock,
    /// `StorageUnavailable` if a release failed, or a database error.
    pub async fn delete(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
    ) -> Result<ReleaseReport, RepositoryError> {
        let tenant = TenantConnection::begin(&self.db, tenant_id).await?;
        let txn = tenant.transaction();

        let stored = load_on(txn, tenant_id, invoice_id, true).await?;
        let payments = PaymentRepository::list_on(txn, tenant_id, invoice_id).await?;
        let draft = InvoiceDraft::from_invoice(&stored, self.engine.calculator());
        let parcel_ids = self.engine.prepare_delete(&draft, &payments)?;

        let report = {
            let store = SeaOrmClaimStore::new(txn, tenant_id);
            let guard = ParcelOwnershipGuard::new(&store);
            self.engine
                .release_parcels(&guard, invoice_id, &parcel_ids)
                .await
        };
        if !report.is_complete() {
            return Err(EngineError::StorageUnavailable(format!(
                "could not release {} parcel(s) of invoice {invoice_id}",
                report.pending.len()
            ))
            .into());
        }

        invoices::Entity::delete_many()
            .filter(invoices::Column::Id.eq(invoice_id.into_inner()))
            .filter(invoices::Column::TenantId.eq(tenant_id.into_inner()))
            .exec(txn)
            .await?;
        tenant.commit().await?;

        tracing::info!(
            invoice_id = %invoice_id,
            number = %stored.number,
            released = report.released.len(),
            "Invoice deleted"
        );
        Ok(report)
    }

    /// Issues a draft and locks it.
    ///
    /// # Errors
    ///
    /// Returns `ConcurrentModification`, `EmptyInvoice`, `TotalMismatch` when
    /// the recomputed lines no longer match the stored total or
    /// `submitted_total`, `InvalidTransition` unless the invoice is a draft,
    /// or a database error.
    pub async fn finalize(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        expected_version: i32,
        submitted_total: Option<Decimal>,
        finalized_by: UserId,
    ) -> Result<Invoice, RepositoryError> {
        let tenant = TenantConnection::begin(&self.db, tenant_id).await?;
        let txn = tenant.transaction();

        let stored = load_on(txn, tenant_id, invoice_id, true).await?;
        check_version(&stored, expected_version)?;
        let mut draft = InvoiceDraft::from_invoice(&stored, self.engine.calculator());
        let action = self.engine.finalize(
            &mut draft,
            stored.total,
            submitted_total,
            stored.paid_amount,
            finalized_by,
        )?;

        let now: DateTimeWithTimeZone = Utc::now().into();
        commit_version(
            txn,
            tenant_id,
            invoice_id,
            expected_version,
            lifecycle_columns(&action, expected_version + 1, now)?,
        )
        .await?;
        tenant.commit().await?;

        tracing::info!(
            invoice_id = %invoice_id,
            number = %stored.number,
            status = %action.new_status(),
            finalized_by = %finalized_by,
            "Invoice finalized"
        );
        self.get(tenant_id, invoice_id).await
    }

    /// Reopens a locked invoice for editing. Payments are kept.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientRole` below Admin, `ConcurrentModification`,
    /// `InvalidTransition` for a draft, or a database error.
    pub async fn unlock(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        expected_version: i32,
        role: UserRole,
        unlocked_by: UserId,
    ) -> Result<Invoice, RepositoryError> {
        let tenant = TenantConnection::begin(&self.db, tenant_id).await?;
        let txn = tenant.transaction();

        let stored = load_on(txn, tenant_id, invoice_id, true).await?;
        let mut draft = InvoiceDraft::from_invoice(&stored, self.engine.calculator());
        let action = self.engine.unlock(&mut draft, role, unlocked_by)?;
        check_version(&stored, expected_version)?;

        let now: DateTimeWithTimeZone = Utc::now().into();
        commit_version(
            txn,
            tenant_id,
            invoice_id,
            expected_version,
            lifecycle_columns(&action, expected_version + 1, now)?,
        )
        .await?;
        tenant.commit().await?;

        tracing::info!(
            invoice_id = %invoice_id,
            number = %stored.number,
            previous_status = %stored.status,
            unlocked_by = %unlocked_by,
            "Invoice unlocked"
        );
        self.get(tenant_id, invoice_id).await
    }

    /// Claims parcels for a draft and bills each at the client's default rate.
    ///
    /// All-or-nothing: if any parcel is billed elsewhere nothing is claimed
    /// and the error lists every conflict.
    ///
    /// # Errors
    ///
    /// Returns `MissingClient`, `ParcelClientMismatch`, a parcel conflict,
    /// `InvoiceLocked`, or a database error.
    pub async fn import_parcels(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        parcel_ids: &[ParcelId],
        updated_by: UserId,
    ) -> Result<ImportResult, RepositoryError> {
        let tenant = TenantConnection::begin(&self.db, tenant_id).await?;
        let txn = tenant.transaction();

        let stored = load_on(txn, tenant_id, invoice_id, true).await?;
        let mut draft = InvoiceDraft::from_invoice(&stored, self.engine.calculator());
        draft.ensure_editable()?;
        let client_id = draft
            .header()
            .client_id
            .ok_or(ValidationError::MissingClient)?;
        let client = ClientRepository::find_on(txn, tenant_id, client_id).await?;
        let parcels = ParcelRepository::find_many_on(txn, tenant_id, parcel_ids).await?;

        let outcome = {
            let store = SeaOrmClaimStore::new(txn, tenant_id);
            let guard = ParcelOwnershipGuard::new(&store);
            self.engine
                .import_parcels(&guard, &mut draft, &parcels, client.default_rate_per_kg)
                .await?
        };

        self.write_draft(txn, tenant_id, &stored, &draft, updated_by)
            .await?;
        tenant.commit().await?;

        tracing::info!(
            invoice_id = %invoice_id,
            added = outcome.added_lines.len(),
            skipped = outcome.skipped.len(),
            rate = %client.default_rate_per_kg,
            "Parcels imported"
        );
        Ok(ImportResult {
            invoice: self.get(tenant_id, invoice_id).await?,
            outcome,
        })
    }

    /// Moves parcels between two drafts.
    ///
    /// An unconfirmed request only returns the warning list. A confirmed one
    /// moves the back-references and rebuilds the lines on the target, all
    /// in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `SameInvoice`, `NotOwnedBy` if a parcel is not on the losing
    /// invoice, `InvoiceLocked` if either side is locked, or a database error.
    pub async fn reassign_parcels(
        &self,
        tenant_id: TenantId,
        request: &ReassignmentRequest,
        updated_by: UserId,
    ) -> Result<ReassignmentResult, RepositoryError> {
        if request.from_invoice == request.to_invoice {
            return Err(OwnershipError::SameInvoice(request.from_invoice).into());
        }

        let tenant = TenantConnection::begin(&self.db, tenant_id).await?;
        let txn = tenant.transaction();

        // Lock in id order so two opposite reassignments cannot deadlock.
        let (first, second) = if request.from_invoice < request.to_invoice {
            (request.from_invoice, request.to_invoice)
        } else {
            (request.to_invoice, request.from_invoice)
        };
        let first = load_on(txn, tenant_id, first, true).await?;
        let second = load_on(txn, tenant_id, second, true).await?;
        let (from_stored, to_stored) = if first.id == request.from_invoice {
            (first, second)
        } else {
            (second, first)
        };

        let mut from = InvoiceDraft::from_invoice(&from_stored, self.engine.calculator());
        let mut to = InvoiceDraft::from_invoice(&to_stored, self.engine.calculator());

        let outcome = {
            let store = SeaOrmClaimStore::new(txn, tenant_id);
            let guard = ParcelOwnershipGuard::new(&store);
            self.engine
                .reassign_parcels(&guard, request, &mut from, &mut to)
                .await?
        };

        if let ReassignmentOutcome::NeedsConfirmation { .. } = outcome {
            tenant.rollback().await?;
            return Ok(ReassignmentResult {
                outcome,
                from: None,
                to: None,
            });
        }

        self.write_draft(txn, tenant_id, &from_stored, &from, updated_by)
            .await?;
        self.write_draft(txn, tenant_id, &to_stored, &to, updated_by)
            .await?;
        tenant.commit().await?;

        tracing::info!(
            from_invoice = %request.from_invoice,
            to_invoice = %request.to_invoice,
            parcels = ?request.parcel_ids,
            "Parcels reassigned"
        );
        Ok(ReassignmentResult {
            outcome,
            from: Some(self.get(tenant_id, request.from_invoice).await?),
            to: Some(self.get(tenant_id, request.to_invoice).await?),
        })
    }

    /// Changes the rate of selected lines and saves the draft.
    ///
    /// # Errors
    ///
    /// Returns `EmptySelection`, `ZeroWeightSelection`, `LineNotFound`,
    /// `InvoiceLocked`, or a database error.
    pub async fn reprice(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        input: RepriceInput,
        updated_by: UserId,
    ) -> Result<RepriceResult, RepositoryError> {
        let tenant = TenantConnection::begin(&self.db, tenant_id).await?;
        let txn = tenant.transaction();

        let stored = load_on(txn, tenant_id, invoice_id, true).await?;
        let mut draft = InvoiceDraft::from_invoice(&stored, self.engine.calculator());
        let rate = match input {
            RepriceInput::Rate { line_ids, rate } => {
                draft.apply_rate_to_selection(&line_ids, rate)?;
                rate
            }
            RepriceInput::TargetTotal {
                line_ids,
                target_total,
            } => draft.apply_target_total(target_total, line_ids.as_deref())?,
        };

        self.write_draft(txn, tenant_id, &stored, &draft, updated_by)
            .await?;
        tenant.commit().await?;

        let invoice = self.get(tenant_id, invoice_id).await?;
        tracing::info!(
            invoice_id = %invoice_id,
            rate = %rate,
            total = %invoice.total,
            "Invoice repriced"
        );
        Ok(RepriceResult { invoice, rate })
    }

    /// Writes a draft that was loaded with `stored` back under its lock.
    async fn write_draft<C: ConnectionTrait>(
        &self,
        conn: &C,
        tenant_id: TenantId,
        stored: &Invoice,
        draft: &InvoiceDraft,
        updated_by: UserId,
    ) -> Result<(), RepositoryError> {
        let totals = draft.totals().map_err(EngineError::from)?;
        let now: DateTimeWithTimeZone = Utc::now().into();
        commit_version(
            conn,
            tenant_id,
            stored.id,
            stored.version,
            draft_columns(draft.header(), &totals, stored.version + 1, updated_by, now),
        )
        .await?;
        replace_children(conn, stored.id, draft.ledger()).await
    }
}

/// Applies submitted lines and adjustments to a draft and returns the
/// parcels of lines the save dropped.
fn apply_save(
    draft: &mut InvoiceDraft,
    lines: Vec<LineInput>,
    adjustments: Vec<NewAdjustment>,
) -> Result<Vec<ParcelId>, EngineError> {
    let kept: HashSet<LineItemId> = lines.iter().filter_map(|l| l.id).collect();
    let dropped: Vec<LineItemId> = draft
        .ledger()
        .lines()
        .iter()
        .map(|l| l.id)
        .filter(|id| !kept.contains(id))
        .collect();

    let mut released = Vec::new();
    for id in dropped {
        if let Some(parcel_id) = draft.remove_line(id)?.release {
            released.push(parcel_id);
        }
    }

    for LineInput { id, line } in lines {
        match id {
            Some(id) => {
                draft.update_line(
                    id,
                    LineItemPatch {
                        description: Some(line.description),
                        quantity: Some(line.quantity),
                        actual_weight: Some(line.actual_weight),
                        dimensions: Some(line.dimensions),
                        rate: Some(line.rate),
                    },
                )?;
            }
            None => {
                draft.add_line(line)?;
            }
        }
    }

    let stale: Vec<_> = draft.ledger().adjustments().iter().map(|a| a.id).collect();
    for id in stale {
        draft.remove_adjustment(id)?;
    }
    for adjustment in adjustments {
        draft.add_adjustment(adjustment)?;
    }
    Ok(released)
}

fn check_version(stored: &Invoice, expected_version: i32) -> Result<(), EngineError> {
    if stored.version == expected_version {
        Ok(())
    } else {
        Err(EngineError::ConcurrentModification {
            invoice_id: stored.id,
            expected_version,
        })
    }
}

pub(crate) async fn load_on<C: ConnectionTrait>(
    conn: &C,
    tenant_id: TenantId,
    invoice_id: InvoiceId,
    for_update: bool,
) -> Result<Invoice, RepositoryError> {
    let mut query = invoices::Entity::find_by_id(invoice_id.into_inner())
        .filter(invoices::Column::TenantId.eq(tenant_id.into_inner()));
    if for_update {
        query = query.lock_exclusive();
    }
    let model = query
        .one(conn)
        .await?
        .ok_or(EngineError::InvoiceNotFound(invoice_id))?;

    let lines = invoice_line_items::Entity::find()
        .filter(invoice_line_items::Column::InvoiceId.eq(model.id))
        .order_by_asc(invoice_line_items::Column::Position)
        .all(conn)
        .await?;
    let adjustments = invoice_adjustments::Entity::find()
        .filter(invoice_adjustments::Column::InvoiceId.eq(model.id))
        .order_by_asc(invoice_adjustments::Column::Position)
        .all(conn)
        .await?;

    invoice_from_models(model, lines, adjustments)
}

/// `UPDATE invoices SET ... WHERE version = expected`. No row means another
/// writer got there first.
pub(crate) async fn commit_version<C: ConnectionTrait>(
    conn: &C,
    tenant_id: TenantId,
    invoice_id: InvoiceId,
    expected_version: i32,
    columns: invoices::ActiveModel,
) -> Result<(), RepositoryError> {
    let result = invoices::Entity::update_many()
        .set(columns)
        .filter(invoices::Column::Id.eq(invoice_id.into_inner()))
        .filter(invoices::Column::TenantId.eq(tenant_id.into_inner()))
        .filter(invoices::Column::Version.eq(expected_version))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(EngineError::ConcurrentModification {
            invoice_id,
            expected_version,
        }
        .into());
    }
    Ok(())
}

fn draft_columns(
    header: &InvoiceHeader,
    totals: &LedgerTotals,
    version: i32,
    updated_by: UserId,
    now: DateTimeWithTimeZone,
) -> invoices::ActiveModel {
    invoices::ActiveModel {
        client_id: Set(header.client_id.map(ClientId::into_inner)),
        trip_id: Set(header.trip_id.map(TripId::into_inner)),
        display_currency: Set(header.display_currency.to_string()),
        issue_date: Set(header.issue_date),
        due_date: Set(header.due_date),
        payment_terms: Set(header.payment_terms.clone()),
        notes: Set(header.notes.clone()),
        subtotal: Set(totals.subtotal),
        adjustment_total: Set(totals.adjustment_total),
        total: Set(totals.total),
        version: Set(version),
        updated_by: Set(Some(updated_by.into_inner())),
        updated_at: Set(now),
        ..Default::default()
    }
}

fn lifecycle_columns(
    action: &LifecycleAction,
    version: i32,
    now: DateTimeWithTimeZone,
) -> Result<invoices::ActiveModel, RepositoryError> {
    let (locked_at, locked_by, actor) = match action {
        LifecycleAction::Finalize {
            finalized_by,
            locked_at,
            ..
        } => (
            Some(DateTimeWithTimeZone::from(*locked_at)),
            Some(finalized_by.into_inner()),
            *finalized_by,
        ),
        LifecycleAction::Unlock { unlocked_by, .. } => (None, None, *unlocked_by),
    };
    Ok(invoices::ActiveModel {
        status: Set(status_to_db(action.new_status())?),
        locked_at: Set(locked_at),
        locked_by: Set(locked_by),
        version: Set(version),
        updated_by: Set(Some(actor.into_inner())),
        updated_at: Set(now),
        ..Default::default()
    })
}

/// Rewrites lines and adjustments with positions in ledger order.
async fn replace_children<C: ConnectionTrait>(
    conn: &C,
    invoice_id: InvoiceId,
    ledger: &InvoiceLedger,
) -> Result<(), RepositoryError> {
    let id = invoice_id.into_inner();
    invoice_line_items::Entity::delete_many()
        .filter(invoice_line_items::Column::InvoiceId.eq(id))
        .exec(conn)
        .await?;
    invoice_adjustments::Entity::delete_many()
        .filter(invoice_adjustments::Column::InvoiceId.eq(id))
        .exec(conn)
        .await?;

    let now: DateTimeWithTimeZone = Utc::now().into();
    let lines = ledger
        .lines()
        .iter()
        .enumerate()
        .map(|(i, line)| Ok(line_active_model(id, position(i)?, line, now)))
        .collect::<Result<Vec<_>, RepositoryError>>()?;
    if !lines.is_empty() {
        invoice_line_items::Entity::insert_many(lines).exec(conn).await?;
    }

    let adjustments = ledger
        .adjustments()
        .iter()
        .enumerate()
        .map(|(i, adjustment)| Ok(adjustment_active_model(id, position(i)?, adjustment, now)))
        .collect::<Result<Vec<_>, RepositoryError>>()?;
    if !adjustments.is_empty() {
        invoice_adjustments::Entity::insert_many(adjustments)
            .exec(conn)
            .await?;
    }
    Ok(())
}

fn position(index: usize) -> Result<i32, RepositoryError> {
    i32::try_from(index).map_err(|_| RepositoryError::corrupt("invoice_line_items", "too many rows"))
}

async fn tenant_ledger_currency<C: ConnectionTrait>(
    conn: &C,
    tenant_id: TenantId,
) -> Result<String, RepositoryError> {
    let tenant = tenants::Entity::find_by_id(tenant_id.into_inner())
        .one(conn)
        .await?
        .ok_or_else(|| RepositoryError::corrupt("tenants", format!("tenant {tenant_id} missing")))?;
    Ok(tenant.ledger_currency)
}

/// Client and trip must exist for this tenant.
async fn check_references<C: ConnectionTrait>(
    conn: &C,
    tenant_id: TenantId,
    header: &InvoiceHeader,
) -> Result<(), RepositoryError> {
    if let Some(client_id) = header.client_id {
        ClientRepository::find_on(conn, tenant_id, client_id).await?;
    }
    if let Some(trip_id) = header.trip_id {
        TripRepository::find_on(conn, tenant_id, trip_id).await?;
    }
    Ok(())
}

/// Parcels added by hand must ship for the invoice's client.
async fn check_parcel_clients<C: ConnectionTrait>(
    conn: &C,
    tenant_id: TenantId,
    header: &InvoiceHeader,
    parcel_ids: &[ParcelId],
) -> Result<(), RepositoryError> {
    if parcel_ids.is_empty() {
        return Ok(());
    }
    let invoice_client = header.client_id.ok_or(ValidationError::MissingClient)?;
    let parcels = ParcelRepository::find_many_on(conn, tenant_id, parcel_ids).await?;
    match parcels.iter().find(|p| p.client_id != invoice_client) {
        Some(parcel) => Err(ValidationError::ParcelClientMismatch {
            parcel_id: parcel.id,
            parcel_client: parcel.client_id,
            invoice_client,
        }
        .into()),
        None => Ok(()),
    }
}

/// Bumps the tenant's counter for `year` and returns the new number.
async fn next_number<C: ConnectionTrait>(
    conn: &C,
    tenant_id: TenantId,
    year: i32,
) -> Result<InvoiceNumber, RepositoryError> {
    let statement = Statement::from_sql_and_values(
        conn.get_database_backend(),
        r"
        INSERT INTO invoice_sequences (tenant_id, year, last_value)
        VALUES ($1, $2, 1)
        ON CONFLICT (tenant_id, year)
        DO UPDATE SET last_value = invoice_sequences.last_value + 1
        RETURNING last_value
        ",
        [tenant_id.into_inner().into(), year.into()],
    );
    let row = conn
        .query_one(statement)
        .await?
        .ok_or_else(|| RepositoryError::corrupt("invoice_sequences", "upsert returned no row"))?;
    let last_value: i32 = row.try_get("", "last_value")?;
    let sequence = u32::try_from(last_value)
        .map_err(|_| RepositoryError::corrupt("invoice_sequences", "negative counter"))?;
    Ok(InvoiceNumber { year, sequence })
}

/// Condition matching an effective status on `today`.
fn status_condition(status: InvoiceStatus, today: NaiveDate) -> Condition {
    let not_yet_due = Condition::any()
        .add(invoices::Column::DueDate.is_null())
        .add(invoices::Column::DueDate.gte(today));
    match status {
        InvoiceStatus::Draft => Condition::all().add(invoices::Column::Status.eq(DbInvoiceStatus::Draft)),
        InvoiceStatus::Paid => Condition::all().add(invoices::Column::Status.eq(DbInvoiceStatus::Paid)),
        InvoiceStatus::Sent => Condition::all()
            .add(invoices::Column::Status.eq(DbInvoiceStatus::Sent))
            .add(not_yet_due),
        InvoiceStatus::Partial => Condition::all()
            .add(invoices::Column::Status.eq(DbInvoiceStatus::Partial))
            .add(not_yet_due),
        InvoiceStatus::Overdue => Condition::all()
            .add(invoices::Column::Status.is_in([DbInvoiceStatus::Sent, DbInvoiceStatus::Partial]))
            .add(invoices::Column::DueDate.lt(today)),
    }
}

fn summary_from_model(model: invoices::Model, today: NaiveDate) -> InvoiceSummary {
    let status =
        LifecycleService::effective_status(status_from_db(model.status), model.due_date, today);
    InvoiceSummary {
        id: InvoiceId::from_uuid(model.id),
        number: model.number,
        client_id: model.client_id.map(ClientId::from_uuid),
        issue_date: model.issue_date,
        due_date: model.due_date,
        status,
        total: model.total,
        paid_amount: model.paid_amount,
        outstanding: ReconciliationService::outstanding(model.total, model.paid_amount),
        ledger_currency: model.ledger_currency,
        version: model.version,
    }
}
