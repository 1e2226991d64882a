//! Property-based tests for payment reconciliation.

use chrono::{NaiveDate, Utc};
use freightbill_shared::types::{InvoiceId, PaymentId, UserId};
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::service::ReconciliationService;
use super::types::{Payment, PaymentMethod};
use crate::lifecycle::InvoiceStatus;
use crate::TOTAL_TOLERANCE;

fn payment(invoice_id: InvoiceId, amount: Decimal) -> Payment {
    Payment {
        id: PaymentId::new(),
        invoice_id,
        amount,
        date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        method: PaymentMethod::Cash,
        reference: None,
        notes: None,
        reverses: None,
        recorded_by: UserId::new(),
        recorded_at: Utc::now(),
    }
}

/// Amounts from 0.01 to 10,000.00.
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Paid amount is the plain sum, independent of arrival order.
    #[test]
    fn prop_paid_amount_is_order_independent(
        amounts in prop::collection::vec(arb_amount(), 0..10),
        total in arb_amount(),
    ) {
        let invoice = InvoiceId::new();
        let payments: Vec<Payment> = amounts.iter().map(|&a| payment(invoice, a)).collect();
        let mut reversed = payments.clone();
        reversed.reverse();

        let forward = ReconciliationService::reconcile(InvoiceStatus::Sent, total, &payments, TOTAL_TOLERANCE);
        let backward = ReconciliationService::reconcile(InvoiceStatus::Sent, total, &reversed, TOTAL_TOLERANCE);

        prop_assert_eq!(forward, backward);
        prop_assert_eq!(forward.paid_amount, amounts.iter().copied().sum::<Decimal>());
    }

    /// Outstanding is never negative and closes the gap exactly when underpaid.
    #[test]
    fn prop_outstanding_non_negative(total in arb_amount(), paid in arb_amount()) {
        let outstanding = ReconciliationService::outstanding(total, paid);
        prop_assert!(outstanding >= Decimal::ZERO);
        if paid < total {
            prop_assert_eq!(outstanding + paid, total);
        }
    }
}
