//! Tenant isolation.
//!
//! Repositories filter on `tenant_id` explicitly; the row-level security
//! policies add a second fence for roles that do not own the tables. The
//! policy test needs `APP_DATABASE_URL` pointing at such a role.

mod common;

use common::{free_line, header, setup};
use freightbill_db::entities::invoices;
use freightbill_db::repositories::SaveInvoiceInput;
use freightbill_db::rls::TenantConnection;
use freightbill_shared::types::TenantId;
use rust_decimal_macros::dec;
use sea_orm::{Database, EntityTrait};

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_repository_hides_other_tenants() {
    let owner = setup().await;
    let stranger = setup().await;

    let invoice = owner
        .invoices()
        .create(
            owner.tenant_id,
            owner.user_id,
            SaveInvoiceInput {
                header: header(owner.client_id),
                lines: vec![free_line(dec!(2), dec!(5))],
                adjustments: Vec::new(),
                submitted_total: None,
            },
        )
        .await
        .unwrap();

    let err = stranger
        .invoices()
        .get(stranger.tenant_id, invoice.id)
        .await
        .unwrap_err()
        .into_engine();
    assert_eq!(err.error_code(), "INVOICE_NOT_FOUND");

    let err = stranger
        .payments()
        .list(stranger.tenant_id, invoice.id)
        .await
        .unwrap_err()
        .into_engine();
    assert_eq!(err.error_code(), "INVOICE_NOT_FOUND");
}

#[tokio::test]
#[ignore = "requires PostgreSQL with a non-owner role (APP_DATABASE_URL)"]
async fn test_policy_scopes_unfiltered_queries() {
    let Ok(app_url) = std::env::var("APP_DATABASE_URL") else {
        return;
    };
    let fx = setup().await;
    let invoice = fx
        .invoices()
        .create(
            fx.tenant_id,
            fx.user_id,
            SaveInvoiceInput {
                header: header(fx.client_id),
                lines: vec![free_line(dec!(2), dec!(5))],
                adjustments: Vec::new(),
                submitted_total: None,
            },
        )
        .await
        .unwrap();

    let app = Database::connect(app_url).await.unwrap();

    let own = TenantConnection::begin(&app, fx.tenant_id).await.unwrap();
    let seen = invoices::Entity::find_by_id(invoice.id.into_inner())
        .one(own.transaction())
        .await
        .unwrap();
    assert!(seen.is_some());
    own.commit().await.unwrap();

    let other = TenantConnection::begin(&app, TenantId::new()).await.unwrap();
    let seen = invoices::Entity::find_by_id(invoice.id.into_inner())
        .one(other.transaction())
        .await
        .unwrap();
    assert!(seen.is_none());
    other.rollback().await.unwrap();
}
