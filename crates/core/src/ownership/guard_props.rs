//! Property-based tests for the ownership guard under concurrency.

use std::sync::Arc;

use freightbill_shared::types::{InvoiceId, ParcelId};
use proptest::prelude::*;

use super::error::OwnershipError;
use super::guard::ParcelOwnershipGuard;
use super::memory::InMemoryClaimStore;
use super::types::ClaimOutcome;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Concurrent claims on one parcel from many invoices: exactly one wins,
    /// every loser is told who won.
    #[test]
    fn prop_single_winner(contenders in 2usize..12) {
        let rt = runtime();
        let store = Arc::new(InMemoryClaimStore::new());
        let parcel = ParcelId::new();
        store.register(parcel);
        let invoices: Vec<InvoiceId> = (0..contenders).map(|_| InvoiceId::new()).collect();

        let results = rt.block_on(async {
            let tasks: Vec<_> = invoices
                .iter()
                .map(|&invoice| {
                    let store = Arc::clone(&store);
                    tokio::spawn(async move {
                        ParcelOwnershipGuard::new(store.as_ref()).claim(parcel, invoice).await
                    })
                })
                .collect();
            futures::future::join_all(tasks).await
        });

        let winner = store.owner_of(parcel);
        prop_assert!(winner.is_some());
        let mut wins = 0;
        for result in results {
            match result.unwrap() {
                Ok(ClaimOutcome::Claimed) => wins += 1,
                Ok(ClaimOutcome::AlreadyOwned) => prop_assert!(false, "distinct invoices"),
                Err(OwnershipError::Conflict { current_owner, .. }) => {
                    prop_assert_eq!(Some(current_owner), winner);
                }
                Err(other) => prop_assert!(false, "unexpected error {other}"),
            }
        }
        prop_assert_eq!(wins, 1);
    }

    /// Overlapping bulk claims never leave a parcel split between invoices:
    /// each bulk claim either owns all of its parcels or none of the contested ones.
    #[test]
    fn prop_bulk_claims_do_not_interleave(
        picks_a in prop::collection::vec(0usize..8, 1..8),
        picks_b in prop::collection::vec(0usize..8, 1..8),
    ) {
        let rt = runtime();
        let store = Arc::new(InMemoryClaimStore::new());
        let parcels: Vec<ParcelId> = (0..8).map(|_| ParcelId::new()).collect();
        for &p in &parcels {
            store.register(p);
        }
        let (a, b) = (InvoiceId::new(), InvoiceId::new());
        let wanted_a: Vec<ParcelId> = picks_a.iter().map(|&i| parcels[i]).collect();
        let wanted_b: Vec<ParcelId> = picks_b.iter().map(|&i| parcels[i]).collect();

        let (ra, rb) = rt.block_on(async {
            let sa = Arc::clone(&store);
            let sb = Arc::clone(&store);
            let wa = wanted_a.clone();
            let wb = wanted_b.clone();
            let ta = tokio::spawn(async move {
                ParcelOwnershipGuard::new(sa.as_ref()).claim_all(&wa, a).await
            });
            let tb = tokio::spawn(async move {
                ParcelOwnershipGuard::new(sb.as_ref()).claim_all(&wb, b).await
            });
            (ta.await.unwrap(), tb.await.unwrap())
        });

        if ra.is_ok() {
            for p in &wanted_a {
                prop_assert_eq!(store.owner_of(*p), Some(a));
            }
        }
        if rb.is_ok() {
            for p in &wanted_b {
                prop_assert_eq!(store.owner_of(*p), Some(b));
            }
        }
        for &p in &parcels {
            let owner = store.owner_of(p);
            prop_assert!(owner.is_none() || owner == Some(a) || owner == Some(b));
        }
    }
}
