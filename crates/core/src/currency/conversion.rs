//! Currency conversion and display rounding.
//!
//! CRITICAL: Rounding is applied only when presenting an amount.
//! - Use banker's rounding (round half to even)
//! - Never feed a rounded amount back into a computation

use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy;

/// Converts an amount using the given exchange rate.
///
/// Uses banker's rounding (round half to even) to minimize cumulative errors.
/// `None` when the product does not fit a decimal.
#[must_use]
pub fn convert_amount(amount: Decimal, rate: Decimal, decimal_places: u32) -> Option<Decimal> {
    amount
        .checked_mul(rate)
        .map(|converted| round_for_display(converted, decimal_places))
}

/// Rounds half to even at `decimal_places`.
#[must_use]
pub fn round_for_display(amount: Decimal, decimal_places: u32) -> Decimal {
    amount.round_dp_with_strategy(decimal_places, RoundingStrategy::MidpointNearestEven)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_convert_amount() {
        // 850 USD * 0.92 = 782 EUR
        let result = convert_amount(dec!(850), dec!(0.92), 2);
        assert_eq!(result, Some(dec!(782.00)));
        assert_eq!(convert_amount(Decimal::MAX, dec!(2), 2), None);
    }

    #[test]
    fn test_convert_with_rounding() {
        // 100.50 * 3.6725 = 369.08625 -> 369.09
        let result = convert_amount(dec!(100.50), dec!(3.6725), 2);
        assert_eq!(result, Some(dec!(369.09)));
    }

    #[test]
    fn test_bankers_rounding() {
        // 2.5 rounds to 2, 3.5 rounds to 4
        assert_eq!(round_for_display(dec!(2.5), 0), dec!(2));
        assert_eq!(round_for_display(dec!(3.5), 0), dec!(4));
        assert_eq!(round_for_display(dec!(0.125), 2), dec!(0.12));
    }
}
