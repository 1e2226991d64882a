//! Property-based tests for LifecycleService.

use proptest::prelude::*;
use rust_decimal::Decimal;

use freightbill_shared::types::UserId;

use super::role::UserRole;
use super::service::LifecycleService;
use super::types::InvoiceStatus;
use crate::TOTAL_TOLERANCE;

fn arb_status() -> impl Strategy<Value = InvoiceStatus> {
    prop_oneof![
        Just(InvoiceStatus::Draft),
        Just(InvoiceStatus::Sent),
        Just(InvoiceStatus::Partial),
        Just(InvoiceStatus::Paid),
        Just(InvoiceStatus::Overdue),
    ]
}

fn arb_locked_status() -> impl Strategy<Value = InvoiceStatus> {
    arb_status().prop_filter("locked", InvoiceStatus::is_locked)
}

fn arb_role() -> impl Strategy<Value = UserRole> {
    prop_oneof![
        Just(UserRole::Viewer),
        Just(UserRole::Clerk),
        Just(UserRole::Accountant),
        Just(UserRole::Admin),
        Just(UserRole::Owner),
    ]
}

/// Amounts from 0.00 to 100,000.00.
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// From draft the only explicit transition is to sent.
    #[test]
    fn prop_draft_only_reaches_sent(to in arb_status()) {
        let valid = LifecycleService::is_valid_transition(InvoiceStatus::Draft, to);
        prop_assert_eq!(valid, to == InvoiceStatus::Sent);
    }

    /// From any locked state the only explicit transition is back to draft.
    #[test]
    fn prop_locked_only_reaches_draft(from in arb_locked_status(), to in arb_status()) {
        let valid = LifecycleService::is_valid_transition(from, to);
        prop_assert_eq!(valid, to == InvoiceStatus::Draft);
    }

    /// Paid is only reached once payments cover the total.
    #[test]
    fn prop_paid_requires_full_payment(
        from in arb_locked_status(),
        total in arb_amount(),
        paid in arb_amount(),
    ) {
        let status = LifecycleService::reconcile_status(from, total, paid, TOTAL_TOLERANCE);
        if status == InvoiceStatus::Paid {
            prop_assert!(paid >= total - TOTAL_TOLERANCE);
        } else {
            prop_assert!(paid < total - TOTAL_TOLERANCE);
        }
        prop_assert!(status.is_locked());
    }

    /// Unlock succeeds exactly for Admin and Owner on a locked invoice.
    #[test]
    fn prop_unlock_is_role_gated(from in arb_locked_status(), role in arb_role()) {
        let result = LifecycleService::unlock(from, role, UserId::new());
        prop_assert_eq!(result.is_ok(), role >= UserRole::Admin);
    }
}
