//! Property-based tests for the invoice ledger.

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::service::InvoiceLedger;
use super::types::{AdjustmentKind, NewAdjustment, NewLineItem};
use crate::rating::{Dimensions, RateCalculator};
use crate::TOTAL_TOLERANCE;

/// Weights from 0.001 to 500.000 kg.
fn arb_weight() -> impl Strategy<Value = Decimal> {
    (1i64..500_000i64).prop_map(|v| Decimal::new(v, 3))
}

/// Rates from 0.00 to 200.00.
fn arb_rate() -> impl Strategy<Value = Decimal> {
    (0i64..20_000i64).prop_map(|v| Decimal::new(v, 2))
}

fn arb_line() -> impl Strategy<Value = NewLineItem> {
    (arb_weight(), arb_rate(), prop::option::of((1i64..200, 1i64..200, 1i64..200))).prop_map(
        |(actual_weight, rate, dims)| NewLineItem {
            description: "Parcel".to_string(),
            quantity: Decimal::ONE,
            actual_weight,
            dimensions: dims.map_or(Dimensions::none(), |(l, w, h)| {
                Dimensions::new(Decimal::from(l), Decimal::from(w), Decimal::from(h))
            }),
            rate,
            ..NewLineItem::default()
        },
    )
}

fn arb_adjustment() -> impl Strategy<Value = NewAdjustment> {
    (0i64..100_000i64, any::<bool>()).prop_map(|(cents, addition)| NewAdjustment {
        description: "Adjustment".to_string(),
        amount: Decimal::new(cents, 2),
        kind: if addition {
            AdjustmentKind::Addition
        } else {
            AdjustmentKind::Deduction
        },
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Every line amount matches its own weight and rate, and the total is
    /// subtotal plus signed adjustments.
    #[test]
    fn prop_totals_are_consistent(
        lines in prop::collection::vec(arb_line(), 0..20),
        adjustments in prop::collection::vec(arb_adjustment(), 0..5),
    ) {
        let calc = RateCalculator::default();
        let mut ledger = InvoiceLedger::new(calc);
        for line in lines {
            ledger.add_line(line).unwrap();
        }
        for adjustment in adjustments {
            ledger.add_adjustment(adjustment).unwrap();
        }

        for line in ledger.lines() {
            prop_assert_eq!(
                line.amount,
                calc.shipping_weight(line.actual_weight, &line.dimensions).unwrap() * line.rate
            );
        }

        let totals = ledger.totals().unwrap();
        let subtotal: Decimal = ledger.lines().iter().map(|l| l.amount).sum();
        let signed: Decimal = ledger.adjustments().iter().map(|a| a.signed_amount()).sum();
        prop_assert_eq!(totals.subtotal, subtotal);
        prop_assert_eq!(totals.total, subtotal + signed);
    }

    /// Applying a solved rate hits the target within tolerance.
    #[test]
    fn prop_target_total_is_reached(
        lines in prop::collection::vec(arb_line(), 1..15),
        target_cents in 1i64..10_000_000i64,
    ) {
        let mut ledger = InvoiceLedger::new(RateCalculator::default());
        for line in lines {
            ledger.add_line(line).unwrap();
        }
        let target = Decimal::new(target_cents, 2);

        ledger.apply_target_total(target, None).unwrap();

        let diff = (ledger.totals().unwrap().subtotal - target).abs();
        prop_assert!(diff <= TOTAL_TOLERANCE, "subtotal drifted by {}", diff);
    }
}
