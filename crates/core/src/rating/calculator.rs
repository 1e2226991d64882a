//! Volumetric weight, shipping weight and line amount.
//!
//! All quantities are exact decimals. Negative inputs are treated as zero
//! and missing dimensions mean "no volumetric weight", never an error.
//! Amounts are NOT rounded here; rounding happens only for display.
//! Arithmetic is checked: a product too large for `Decimal` is
//! [`RatingError::Overflow`], never a panic.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default divisor turning cm³ into volumetric kilograms.
pub const DEFAULT_VOLUMETRIC_DIVISOR: Decimal = Decimal::from_parts(5000, 0, 0, false, 0);

/// Errors raised by the calculator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RatingError {
    /// The volumetric divisor must be strictly positive.
    #[error("Volumetric divisor must be positive, got {0}")]
    NonPositiveDivisor(Decimal),

    /// A volume, weight or amount does not fit in a decimal.
    #[error("Weight or amount is out of range")]
    Overflow,
}

/// Clamps a measurement to zero when negative.
#[must_use]
pub fn sanitize(value: Decimal) -> Decimal {
    if value.is_sign_negative() {
        Decimal::ZERO
    } else {
        value
    }
}

/// Parses a user-entered measurement.
///
/// Blank, non-numeric and negative input all read as zero.
#[must_use]
pub fn parse_measure(raw: &str) -> Decimal {
    Decimal::from_str(raw.trim()).map_or(Decimal::ZERO, sanitize)
}

/// Parcel dimensions in centimetres. Any side may be unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dimensions {
    /// Length in cm.
    pub length: Option<Decimal>,
    /// Width in cm.
    pub width: Option<Decimal>,
    /// Height in cm.
    pub height: Option<Decimal>,
}

impl Dimensions {
    /// All three sides known.
    #[must_use]
    pub const fn new(length: Decimal, width: Decimal, height: Decimal) -> Self {
        Self {
            length: Some(length),
            width: Some(width),
            height: Some(height),
        }
    }

    /// No dimensions recorded.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            length: None,
            width: None,
            height: None,
        }
    }

    /// Volume in cm³, or `None` unless every side is present and positive.
    pub fn volume(&self) -> Result<Option<Decimal>, RatingError> {
        let side = |v: Option<Decimal>| v.map(sanitize).filter(|s| !s.is_zero());
        let (Some(length), Some(width), Some(height)) =
            (side(self.length), side(self.width), side(self.height))
        else {
            return Ok(None);
        };
        length
            .checked_mul(width)
            .and_then(|area| area.checked_mul(height))
            .map(Some)
            .ok_or(RatingError::Overflow)
    }

    /// Returns a copy with negative sides clamped to zero.
    #[must_use]
    pub fn sanitized(self) -> Self {
        Self {
            length: self.length.map(sanitize),
            width: self.width.map(sanitize),
            height: self.height.map(sanitize),
        }
    }
}

/// The full breakdown behind a single line amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WeightQuote {
    /// Measured weight after sanitising.
    pub actual_weight: Decimal,
    /// Volumetric weight when dimensions are complete.
    pub volumetric_weight: Option<Decimal>,
    /// The billable weight.
    pub shipping_weight: Decimal,
    /// Rate per kilogram after sanitising.
    pub rate: Decimal,
    /// Unrounded `shipping_weight * rate`.
    pub amount: Decimal,
}

/// Computes billable weight and amounts for a fixed volumetric divisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateCalculator {
    volumetric_divisor: Decimal,
}

impl Default for RateCalculator {
    fn default() -> Self {
        Self {
            volumetric_divisor: DEFAULT_VOLUMETRIC_DIVISOR,
        }
    }
}

impl RateCalculator {
    /// Creates a calculator with a custom divisor.
    pub fn new(volumetric_divisor: Decimal) -> Result<Self, RatingError> {
        if volumetric_divisor <= Decimal::ZERO {
            return Err(RatingError::NonPositiveDivisor(volumetric_divisor));
        }
        Ok(Self { volumetric_divisor })
    }

    /// The configured divisor.
    #[must_use]
    pub const fn volumetric_divisor(&self) -> Decimal {
        self.volumetric_divisor
    }

    /// `L × W × H / divisor`, absent when any side is missing or zero.
    pub fn volumetric_weight(&self, dimensions: &Dimensions) -> Result<Option<Decimal>, RatingError> {
        dimensions
            .volume()?
            .map(|v| v.checked_div(self.volumetric_divisor).ok_or(RatingError::Overflow))
            .transpose()
    }

    /// `max(actual, volumetric)`; the actual weight alone when dimensions are incomplete.
    pub fn shipping_weight(
        &self,
        actual_weight: Decimal,
        dimensions: &Dimensions,
    ) -> Result<Decimal, RatingError> {
        let actual = sanitize(actual_weight);
        Ok(match self.volumetric_weight(dimensions)? {
            Some(volumetric) => actual.max(volumetric),
            None => actual,
        })
    }

    /// `shipping_weight × rate`, unrounded.
    pub fn line_amount(
        &self,
        actual_weight: Decimal,
        dimensions: &Dimensions,
        rate: Decimal,
    ) -> Result<Decimal, RatingError> {
        self.shipping_weight(actual_weight, dimensions)?
            .checked_mul(sanitize(rate))
            .ok_or(RatingError::Overflow)
    }

    /// Full breakdown for one line.
    pub fn quote(
        &self,
        actual_weight: Decimal,
        dimensions: &Dimensions,
        rate: Decimal,
    ) -> Result<WeightQuote, RatingError> {
        let actual_weight = sanitize(actual_weight);
        let rate = sanitize(rate);
        let volumetric_weight = self.volumetric_weight(dimensions)?;
        let shipping_weight = volumetric_weight.map_or(actual_weight, |v| actual_weight.max(v));
        Ok(WeightQuote {
            actual_weight,
            volumetric_weight,
            shipping_weight,
            rate,
            amount: shipping_weight.checked_mul(rate).ok_or(RatingError::Overflow)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MAX_AMOUNT, MAX_MEASURE};
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[test]
    fn test_volumetric_weight_wins() {
        let calc = RateCalculator::default();
        let dims = Dimensions::new(dec!(50), dec!(40), dec!(30));

        let quote = calc.quote(dec!(10), &dims, dec!(36)).unwrap();

        assert_eq!(quote.volumetric_weight, Some(dec!(12)));
        assert_eq!(quote.shipping_weight, dec!(12));
        assert_eq!(quote.amount, dec!(432));
    }

    #[test]
    fn test_actual_weight_wins() {
        let calc = RateCalculator::default();
        let dims = Dimensions::new(dec!(10), dec!(10), dec!(10));
        assert_eq!(calc.shipping_weight(dec!(5), &dims).unwrap(), dec!(5));
    }

    #[rstest]
    #[case(Dimensions::none())]
    #[case(Dimensions { length: Some(dec!(50)), width: None, height: Some(dec!(30)) })]
    #[case(Dimensions::new(dec!(50), dec!(0), dec!(30)))]
    #[case(Dimensions::new(dec!(50), dec!(-40), dec!(30)))]
    fn test_incomplete_dimensions_fall_back_to_actual(#[case] dims: Dimensions) {
        let calc = RateCalculator::default();
        assert_eq!(calc.volumetric_weight(&dims), Ok(None));
        assert_eq!(calc.shipping_weight(dec!(7.5), &dims), Ok(dec!(7.5)));
    }

    #[test]
    fn test_negative_inputs_are_zero() {
        let calc = RateCalculator::default();
        assert_eq!(calc.line_amount(dec!(-3), &Dimensions::none(), dec!(10)), Ok(dec!(0)));
        assert_eq!(calc.line_amount(dec!(3), &Dimensions::none(), dec!(-10)), Ok(dec!(0)));
    }

    #[test]
    fn test_amount_is_not_rounded() {
        let calc = RateCalculator::default();
        let amount = calc.line_amount(dec!(1.005), &Dimensions::none(), dec!(3.333));
        assert_eq!(amount, Ok(dec!(3.349665)));
    }

    #[test]
    fn test_custom_divisor() {
        let calc = RateCalculator::new(dec!(6000)).unwrap();
        let dims = Dimensions::new(dec!(60), dec!(50), dec!(40));
        assert_eq!(calc.volumetric_weight(&dims), Ok(Some(dec!(20))));
    }

    #[test]
    fn test_huge_sides_overflow_instead_of_panicking() {
        let calc = RateCalculator::default();
        let dims = Dimensions::new(dec!(1e10), dec!(1e10), dec!(1e10));

        assert_eq!(dims.volume(), Err(RatingError::Overflow));
        assert_eq!(calc.line_amount(dec!(1), &dims, dec!(1)), Err(RatingError::Overflow));
    }

    #[test]
    fn test_huge_rate_overflows() {
        let calc = RateCalculator::default();
        assert_eq!(
            calc.quote(dec!(1000), &Dimensions::none(), Decimal::MAX),
            Err(RatingError::Overflow)
        );
    }

    #[test]
    fn test_limits_fit_together() {
        let calc = RateCalculator::default();
        let dims = Dimensions::new(MAX_MEASURE, MAX_MEASURE, MAX_MEASURE);
        assert!(calc.line_amount(MAX_MEASURE, &dims, MAX_AMOUNT).is_ok());
    }

    #[rstest]
    #[case(dec!(0))]
    #[case(dec!(-5000))]
    fn test_rejects_non_positive_divisor(#[case] divisor: Decimal) {
        assert_eq!(
            RateCalculator::new(divisor),
            Err(RatingError::NonPositiveDivisor(divisor))
        );
    }

    #[rstest]
    #[case("12.5", dec!(12.5))]
    #[case("  3 ", dec!(3))]
    #[case("", dec!(0))]
    #[case("abc", dec!(0))]
    #[case("-4", dec!(0))]
    fn test_parse_measure(#[case] raw: &str, #[case] expected: Decimal) {
        assert_eq!(parse_measure(raw), expected);
    }
}
