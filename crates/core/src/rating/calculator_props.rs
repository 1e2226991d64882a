//! Property-based tests for the rate calculator.

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::calculator::{Dimensions, RateCalculator, RatingError};

/// Weights from -100.000 to 1,000.000 kg.
fn arb_weight() -> impl Strategy<Value = Decimal> {
    (-100_000i64..1_000_000i64).prop_map(|v| Decimal::new(v, 3))
}

/// Sides from 0.0 to 300.0 cm, sometimes unknown.
fn arb_side() -> impl Strategy<Value = Option<Decimal>> {
    prop_oneof![
        1 => Just(None),
        4 => (0i64..3000i64).prop_map(|v| Some(Decimal::new(v, 1))),
    ]
}

fn arb_dimensions() -> impl Strategy<Value = Dimensions> {
    (arb_side(), arb_side(), arb_side()).prop_map(|(length, width, height)| Dimensions {
        length,
        width,
        height,
    })
}

/// Rates from 0.00 to 500.00.
fn arb_rate() -> impl Strategy<Value = Decimal> {
    (0i64..50_000i64).prop_map(|v| Decimal::new(v, 2))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Shipping weight is never below the measured weight nor the volumetric weight.
    #[test]
    fn prop_shipping_weight_is_maximum(
        actual in arb_weight(),
        dims in arb_dimensions(),
    ) {
        let calc = RateCalculator::default();
        let shipping = calc.shipping_weight(actual, &dims).unwrap();

        prop_assert!(shipping >= actual.max(Decimal::ZERO));
        if let Some(volumetric) = calc.volumetric_weight(&dims).unwrap() {
            prop_assert!(shipping >= volumetric);
            prop_assert!(shipping == volumetric || shipping == actual);
        } else {
            prop_assert_eq!(shipping, actual.max(Decimal::ZERO));
        }
    }

    /// The amount is exactly shipping weight times rate.
    #[test]
    fn prop_amount_is_weight_times_rate(
        actual in arb_weight(),
        dims in arb_dimensions(),
        rate in arb_rate(),
    ) {
        let calc = RateCalculator::default();
        let quote = calc.quote(actual, &dims, rate).unwrap();

        prop_assert_eq!(quote.amount, quote.shipping_weight * rate);
        prop_assert_eq!(quote.amount, calc.line_amount(actual, &dims, rate).unwrap());
        prop_assert!(quote.amount >= Decimal::ZERO);
    }

    /// Any side count or size either prices or reports overflow; it never panics.
    #[test]
    fn prop_extreme_sides_never_panic(
        exponent in 0u32..28,
        rate in arb_rate(),
    ) {
        let side = Decimal::from_i128_with_scale(10i128.pow(exponent), 0);
        let dims = Dimensions::new(side, side, side);
        let calc = RateCalculator::default();

        match calc.line_amount(Decimal::ONE, &dims, rate) {
            Ok(amount) => prop_assert!(amount >= Decimal::ZERO),
            Err(err) => prop_assert_eq!(err, RatingError::Overflow),
        }
    }
}
