//! Claim, release and reassignment of parcels.

use std::collections::HashSet;

use freightbill_shared::types::{InvoiceId, ParcelId};

use super::error::OwnershipError;
use super::store::ParcelClaimStore;
use super::types::{ClaimConflict, ClaimOutcome, ReassignmentPlan, ReassignmentWarning};

/// How often a claim is retried when the parcel is released between our
/// failed compare-and-set and the follow-up read.
const MAX_CLAIM_ATTEMPTS: usize = 3;

/// Enforces single ownership of parcels on top of a claim store.
pub struct ParcelOwnershipGuard<'a, S: ParcelClaimStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: ParcelClaimStore + ?Sized> ParcelOwnershipGuard<'a, S> {
    /// Wraps a store.
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Claims an unowned parcel for `invoice_id`.
    ///
    /// Idempotent for the current owner. Another owner yields
    /// [`OwnershipError::Conflict`] naming it; nothing is overwritten.
    pub async fn claim(
        &self,
        parcel_id: ParcelId,
        invoice_id: InvoiceId,
    ) -> Result<ClaimOutcome, OwnershipError> {
        for _ in 0..MAX_CLAIM_ATTEMPTS {
            if self
                .store
                .compare_and_set(parcel_id, None, Some(invoice_id))
                .await?
            {
                return Ok(ClaimOutcome::Claimed);
            }
            match self.store.current_owner(parcel_id).await? {
                Some(owner) if owner == invoice_id => return Ok(ClaimOutcome::AlreadyOwned),
                Some(owner) => {
                    return Err(OwnershipError::Conflict {
                        parcel_id,
                        current_owner: owner,
                    });
                }
                None => {}
            }
        }
        Err(OwnershipError::ContentionExhausted(parcel_id))
    }

    /// Claims every parcel or none.
    ///
    /// Returns the parcels that were newly claimed. When any parcel is held
    /// by another invoice, the newly claimed ones are handed back and every
    /// conflict is reported at once.
    pub async fn claim_all(
        &self,
        parcel_ids: &[ParcelId],
        invoice_id: InvoiceId,
    ) -> Result<Vec<ParcelId>, OwnershipError> {
        let mut seen = HashSet::new();
        let mut claimed = Vec::new();
        let mut conflicts = Vec::new();

        for &parcel_id in parcel_ids {
            if !seen.insert(parcel_id) {
                continue;
            }
            match self.claim(parcel_id, invoice_id).await {
                Ok(ClaimOutcome::Claimed) => claimed.push(parcel_id),
                Ok(ClaimOutcome::AlreadyOwned) => {}
                Err(OwnershipError::Conflict {
                    parcel_id,
                    current_owner,
                }) => conflicts.push(ClaimConflict {
                    parcel_id,
                    current_owner,
                }),
                Err(other) => {
                    self.hand_back(&claimed, invoice_id).await;
                    return Err(other);
                }
            }
        }

        if conflicts.is_empty() {
            Ok(claimed)
        } else {
            self.hand_back(&claimed, invoice_id).await;
            Err(OwnershipError::Conflicts(conflicts))
        }
    }

    /// Clears the back-reference if `invoice_id` still owns the parcel.
    ///
    /// Returns `false` when the parcel had already moved elsewhere.
    pub async fn release(
        &self,
        parcel_id: ParcelId,
        invoice_id: InvoiceId,
    ) -> Result<bool, OwnershipError> {
        self.store
            .compare_and_set(parcel_id, Some(invoice_id), None)
            .await
    }

    /// First step of a reassignment: checks ownership and lists what would move.
    pub async fn plan_reassignment(
        &self,
        parcel_ids: &[ParcelId],
        from_invoice: InvoiceId,
        to_invoice: InvoiceId,
    ) -> Result<ReassignmentPlan, OwnershipError> {
        if from_invoice == to_invoice {
            return Err(OwnershipError::SameInvoice(from_invoice));
        }
        let mut seen = HashSet::new();
        let mut warnings = Vec::with_capacity(parcel_ids.len());
        for &parcel_id in parcel_ids {
            if !seen.insert(parcel_id) {
                continue;
            }
            let owner = self.store.current_owner(parcel_id).await?;
            if owner != Some(from_invoice) {
                return Err(OwnershipError::NotOwnedBy {
                    parcel_id,
                    expected: from_invoice,
                    actual: owner,
                });
            }
            warnings.push(ReassignmentWarning {
                parcel_id,
                current_invoice: from_invoice,
            });
        }
        Ok(ReassignmentPlan {
            from_invoice,
            to_invoice,
            warnings,
        })
    }

    /// Second step: moves every parcel of a confirmed plan, or none.
    pub async fn reassign(&self, plan: &ReassignmentPlan) -> Result<(), OwnershipError> {
        let mut moved = Vec::with_capacity(plan.warnings.len());
        for warning in &plan.warnings {
            let swapped = self
                .store
                .compare_and_set(
                    warning.parcel_id,
                    Some(plan.from_invoice),
                    Some(plan.to_invoice),
                )
                .await;
            match swapped {
                Ok(true) => moved.push(warning.parcel_id),
                Ok(false) => {
                    let actual = self.store.current_owner(warning.parcel_id).await.ok().flatten();
                    self.undo_moves(&moved, plan).await;
                    return Err(OwnershipError::NotOwnedBy {
                        parcel_id: warning.parcel_id,
                        expected: plan.from_invoice,
                        actual,
                    });
                }
                Err(err) => {
                    self.undo_moves(&moved, plan).await;
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    async fn hand_back(&self, parcel_ids: &[ParcelId], invoice_id: InvoiceId) {
        for &parcel_id in parcel_ids {
            // Best effort; a transactional store rolls these back anyway.
            match self
                .store
                .compare_and_set(parcel_id, Some(invoice_id), None)
                .await
            {
                Ok(true) => {}
                Ok(false) => tracing::warn!(
                    %parcel_id,
                    %invoice_id,
                    "Claim changed before it could be handed back"
                ),
                Err(e) => tracing::warn!(
                    %parcel_id,
                    %invoice_id,
                    error = %e,
                    "Failed to hand back claim"
                ),
            }
        }
    }

    async fn undo_moves(&self, parcel_ids: &[ParcelId], plan: &ReassignmentPlan) {
        for &parcel_id in parcel_ids {
            match self
                .store
                .compare_and_set(parcel_id, Some(plan.to_invoice), Some(plan.from_invoice))
                .await
            {
                Ok(true) => {}
                Ok(false) => tracing::warn!(
                    %parcel_id,
                    from_invoice = %plan.from_invoice,
                    to_invoice = %plan.to_invoice,
                    "Claim changed before the move could be undone"
                ),
                Err(e) => tracing::warn!(
                    %parcel_id,
                    from_invoice = %plan.from_invoice,
                    to_invoice = %plan.to_invoice,
                    error = %e,
                    "Failed to undo parcel move"
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ownership::memory::InMemoryClaimStore;
    use async_trait::async_trait;
    use mockall::mock;

    fn store_with(parcels: &[ParcelId]) -> InMemoryClaimStore {
        let store = InMemoryClaimStore::new();
        for &p in parcels {
            store.register(p);
        }
        store
    }

    #[tokio::test]
    async fn test_claim_conflict_then_reassign() {
        let p1 = ParcelId::new();
        let (a, b) = (InvoiceId::new(), InvoiceId::new());
        let store = store_with(&[p1]);
        let guard = ParcelOwnershipGuard::new(&store);

        assert_eq!(guard.claim(p1, a).await.unwrap(), ClaimOutcome::Claimed);

        let err = guard.claim(p1, b).await.unwrap_err();
        assert_eq!(
            err,
            OwnershipError::Conflict {
                parcel_id: p1,
                current_owner: a
            }
        );

        let plan = guard.plan_reassignment(&[p1], a, b).await.unwrap();
        assert_eq!(
            plan.warnings,
            vec![ReassignmentWarning {
                parcel_id: p1,
                current_invoice: a
            }]
        );
        // Planning alone changes nothing.
        assert_eq!(store.owner_of(p1), Some(a));

        guard.reassign(&plan).await.unwrap();
        assert_eq!(store.owner_of(p1), Some(b));
    }

    #[tokio::test]
    async fn test_claim_is_idempotent_for_owner() {
        let p = ParcelId::new();
        let inv = InvoiceId::new();
        let store = store_with(&[p]);
        let guard = ParcelOwnershipGuard::new(&store);

        guard.claim(p, inv).await.unwrap();
        assert_eq!(guard.claim(p, inv).await.unwrap(), ClaimOutcome::AlreadyOwned);
    }

    #[tokio::test]
    async fn test_claim_all_is_all_or_nothing() {
        let (free, taken) = (ParcelId::new(), ParcelId::new());
        let (mine, theirs) = (InvoiceId::new(), InvoiceId::new());
        let store = store_with(&[free, taken]);
        let guard = ParcelOwnershipGuard::new(&store);
        guard.claim(taken, theirs).await.unwrap();

        let err = guard.claim_all(&[free, taken], mine).await.unwrap_err();

        assert_eq!(
            err.conflicts(),
            vec![ClaimConflict {
                parcel_id: taken,
                current_owner: theirs
            }]
        );
        assert_eq!(store.owner_of(free), None);
        assert_eq!(store.owner_of(taken), Some(theirs));
    }

    #[tokio::test]
    async fn test_claim_unknown_parcel() {
        let store = InMemoryClaimStore::new();
        let guard = ParcelOwnershipGuard::new(&store);
        let missing = ParcelId::new();
        assert_eq!(
            guard.claim(missing, InvoiceId::new()).await,
            Err(OwnershipError::ParcelNotFound(missing))
        );
    }

    #[tokio::test]
    async fn test_release_only_by_owner() {
        let p = ParcelId::new();
        let (a, b) = (InvoiceId::new(), InvoiceId::new());
        let store = store_with(&[p]);
        let guard = ParcelOwnershipGuard::new(&store);
        guard.claim(p, a).await.unwrap();

        assert!(!guard.release(p, b).await.unwrap());
        assert_eq!(store.owner_of(p), Some(a));

        assert!(guard.release(p, a).await.unwrap());
        assert_eq!(store.owner_of(p), None);
    }

    #[tokio::test]
    async fn test_plan_rejects_wrong_source_invoice() {
        let p = ParcelId::new();
        let (a, b, c) = (InvoiceId::new(), InvoiceId::new(), InvoiceId::new());
        let store = store_with(&[p]);
        let guard = ParcelOwnershipGuard::new(&store);
        guard.claim(p, a).await.unwrap();

        let err = guard.plan_reassignment(&[p], c, b).await.unwrap_err();
        assert_eq!(
            err,
            OwnershipError::NotOwnedBy {
                parcel_id: p,
                expected: c,
                actual: Some(a)
            }
        );
        assert_eq!(
            guard.plan_reassignment(&[p], a, a).await,
            Err(OwnershipError::SameInvoice(a))
        );
    }

    #[tokio::test]
    async fn test_stale_plan_moves_nothing() {
        let (p1, p2) = (ParcelId::new(), ParcelId::new());
        let (a, b, c) = (InvoiceId::new(), InvoiceId::new(), InvoiceId::new());
        let store = store_with(&[p1, p2]);
        let guard = ParcelOwnershipGuard::new(&store);
        guard.claim_all(&[p1, p2], a).await.unwrap();
        let plan = guard.plan_reassignment(&[p1, p2], a, b).await.unwrap();

        // Someone else moves p2 between plan and confirm.
        store.compare_and_set(p2, Some(a), Some(c)).await.unwrap();

        let err = guard.reassign(&plan).await.unwrap_err();
        assert!(matches!(err, OwnershipError::NotOwnedBy { actual: Some(owner), .. } if owner == c));
        assert_eq!(store.owner_of(p1), Some(a));
    }

    mock! {
        Store {}

        #[async_trait]
        impl ParcelClaimStore for Store {
            async fn current_owner(&self, parcel_id: ParcelId) -> Result<Option<InvoiceId>, OwnershipError>;
            async fn compare_and_set(
                &self,
                parcel_id: ParcelId,
                expected: Option<InvoiceId>,
                new: Option<InvoiceId>,
            ) -> Result<bool, OwnershipError>;
        }
    }

    #[tokio::test]
    async fn test_claim_gives_up_under_contention() {
        let mut store = MockStore::new();
        store.expect_compare_and_set().returning(|_, _, _| Ok(false));
        store.expect_current_owner().returning(|_| Ok(None));
        let guard = ParcelOwnershipGuard::new(&store);
        let p = ParcelId::new();

        let err = guard.claim(p, InvoiceId::new()).await.unwrap_err();

        assert_eq!(err, OwnershipError::ContentionExhausted(p));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_store_outage_is_surfaced() {
        let mut store = MockStore::new();
        store
            .expect_compare_and_set()
            .returning(|_, _, _| Err(OwnershipError::StoreUnavailable("timeout".to_string())));
        let guard = ParcelOwnershipGuard::new(&store);

        let err = guard.claim(ParcelId::new(), InvoiceId::new()).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
