//! Clearing parcel back-references after an invoice write has committed.

use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::future::retry;
use freightbill_core::BillingEngine;
use freightbill_core::engine::ReleaseReport;
use freightbill_core::ownership::ParcelOwnershipGuard;
use freightbill_shared::types::{InvoiceId, ParcelId, TenantId};
use sea_orm::DatabaseConnection;

use super::claim_store::SeaOrmClaimStore;
use crate::rls::TenantConnection;

/// Releases `parcel_ids` from `invoice_id`, retrying with exponential
/// backoff until everything is released or `max_elapsed` runs out.
///
/// Releases are conditional on the parcel still pointing at the invoice, so
/// an attempt that repeats work already done is harmless. Whatever is still
/// pending at the end is returned, never raised.
pub(crate) async fn release_with_retry(
    db: &DatabaseConnection,
    engine: &BillingEngine,
    tenant_id: TenantId,
    invoice_id: InvoiceId,
    parcel_ids: &[ParcelId],
    max_elapsed: Duration,
) -> ReleaseReport {
    if parcel_ids.is_empty() {
        return ReleaseReport::default();
    }

    let policy = ExponentialBackoff {
        initial_interval: Duration::from_millis(50),
        max_elapsed_time: Some(max_elapsed),
        ..ExponentialBackoff::default()
    };

    let report = retry(policy, || async move {
        let report = release_once(db, engine, tenant_id, invoice_id, parcel_ids).await;
        if report.is_complete() {
            Ok(report)
        } else {
            tracing::debug!(
                invoice_id = %invoice_id,
                pending = report.pending.len(),
                "Parcel release attempt incomplete, backing off"
            );
            Err(backoff::Error::transient(report))
        }
    })
    .await
    .unwrap_or_else(|report| report);

    if report.is_complete() {
        tracing::info!(
            invoice_id = %invoice_id,
            released = report.released.len(),
            "Parcels released"
        );
    } else {
        tracing::warn!(
            invoice_id = %invoice_id,
            pending = ?report.pending,
            "Parcel release still failing, reported as pending"
        );
    }
    report
}

/// One attempt in its own transaction. A failed statement aborts the
/// transaction, so any failure makes the whole batch pending.
async fn release_once(
    db: &DatabaseConnection,
    engine: &BillingEngine,
    tenant_id: TenantId,
    invoice_id: InvoiceId,
    parcel_ids: &[ParcelId],
) -> ReleaseReport {
    let all_pending = || ReleaseReport {
        released: Vec::new(),
        pending: parcel_ids.to_vec(),
    };

    let tenant = match TenantConnection::begin(db, tenant_id).await {
        Ok(tenant) => tenant,
        Err(err) => {
            tracing::error!(error = %err, "Could not open transaction for parcel release");
            return all_pending();
        }
    };

    let report = {
        let store = SeaOrmClaimStore::new(tenant.transaction(), tenant_id);
        let guard = ParcelOwnershipGuard::new(&store);
        engine.release_parcels(&guard, invoice_id, parcel_ids).await
    };

    if !report.is_complete() {
        if let Err(err) = tenant.rollback().await {
            tracing::error!(error = %err, "Rollback after failed parcel release failed");
        }
        return all_pending();
    }

    match tenant.commit().await {
        Ok(()) => report,
        Err(err) => {
            tracing::error!(error = %err, "Commit of parcel release failed");
            all_pending()
        }
    }
}
