//! Property-based tests for currency projection.

use freightbill_shared::types::CurrencyCode;
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::conversion::round_for_display;
use super::projector::CurrencyProjector;

/// Amounts from 0.00 to 1,000,000.00.
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (0i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Rates from 0.0001 to 1000.0000.
fn arb_rate() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000i64).prop_map(|v| Decimal::new(v, 4))
}

fn usd() -> CurrencyCode {
    CurrencyCode::parse("USD").unwrap()
}

fn eur() -> CurrencyCode {
    CurrencyCode::parse("EUR").unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Projecting out and back lands within a cent of the original.
    #[test]
    fn prop_round_trip_within_tolerance(amount in arb_amount(), rate in arb_rate()) {
        let projector = CurrencyProjector::new(usd()).with_rate(eur(), rate).unwrap();

        let shown = projector.project(amount, &eur()).unwrap();
        let back = projector.unproject(shown, &eur()).unwrap();

        prop_assert!((back - amount).abs() <= Decimal::new(1, 2));
    }

    /// Display rounding never moves more than half a unit at the last place.
    #[test]
    fn prop_display_rounding_is_bounded(amount in arb_amount(), rate in arb_rate(), dp in 0u32..=4) {
        let projector = CurrencyProjector::new(usd()).with_rate(eur(), rate).unwrap();

        let exact = projector.project(amount, &eur()).unwrap();
        let shown = projector.display(amount, &eur(), dp).unwrap();

        prop_assert_eq!(shown.amount, round_for_display(exact, dp));
        let half_unit = Decimal::new(5, dp + 1);
        prop_assert!((shown.amount - exact).abs() <= half_unit);
    }

    /// The ledger currency projects to itself.
    #[test]
    fn prop_ledger_currency_identity(amount in arb_amount()) {
        let projector = CurrencyProjector::new(usd());
        prop_assert_eq!(projector.project(amount, &usd()).unwrap(), amount);
    }
}
