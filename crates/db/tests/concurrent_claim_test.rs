//! Racing claims on one parcel.
//!
//! Every task tries to create a draft billing the same parcel at the same
//! moment. The conditional update on `parcels.invoice_id` must let exactly
//! one of them through and report the winner to everyone else.

mod common;

use std::sync::Arc;

use common::{header, parcel_line, setup};
use freightbill_core::ownership::OwnershipError;
use freightbill_core::EngineError;
use freightbill_db::repositories::SaveInvoiceInput;
use futures::future::join_all;
use rust_decimal_macros::dec;
use tokio::sync::Barrier;

const TASKS: usize = 8;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_racing_claims_have_one_winner() {
    let fx = Arc::new(setup().await);
    let parcel = fx.parcel(dec!(7)).await;
    let barrier = Arc::new(Barrier::new(TASKS));

    let handles = (0..TASKS).map(|_| {
        let fx = Arc::clone(&fx);
        let barrier = Arc::clone(&barrier);
        tokio::spawn(async move {
            let repo = fx.invoices();
            barrier.wait().await;
            repo.create(
                fx.tenant_id,
                fx.user_id,
                SaveInvoiceInput {
                    header: header(fx.client_id),
                    lines: vec![parcel_line(parcel, dec!(7), dec!(3))],
                    adjustments: Vec::new(),
                    submitted_total: None,
                },
            )
            .await
        })
    });

    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked"))
        .collect();

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1, "exactly one claim must succeed");
    let winner = winners[0].id;

    for result in results.into_iter().filter(Result::is_err) {
        let err = result.unwrap_err().into_engine();
        assert_eq!(err.error_code(), "PARCEL_ALREADY_CLAIMED");
        let EngineError::Ownership(ownership) = err else {
            panic!("expected an ownership error");
        };
        assert!(matches!(ownership, OwnershipError::Conflicts(_) | OwnershipError::Conflict { .. }));
        assert_eq!(ownership.conflicts()[0].current_owner, winner);
    }

    assert_eq!(fx.owner_of(parcel).await, Some(winner.into_inner()));
}
