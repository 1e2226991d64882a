//! Read-time normalisation of lines stored before weight had its own column.
//!
//! Older records stored the billable weight in `quantity`. When a stored line
//! has no weight and its quantity looks like a weight (fractional, or above
//! [`LEGACY_QUANTITY_THRESHOLD`]), the quantity is moved into the weight and
//! the piece count becomes 1. Lines that carry a positive weight are left alone.

use rust_decimal::Decimal;

use super::calculator::sanitize;

/// Quantities above this are assumed to be kilograms, not piece counts.
pub const LEGACY_QUANTITY_THRESHOLD: Decimal = Decimal::from_parts(10, 0, 0, false, 0);

/// A stored line as read from storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyLine {
    /// Stored quantity.
    pub quantity: Decimal,
    /// Stored weight column, `None` on rows that predate it.
    pub weight: Option<Decimal>,
}

/// What normalisation did to a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyOutcome {
    /// Taken as stored.
    Unchanged,
    /// The stored quantity was reinterpreted as the weight.
    WeightRecoveredFromQuantity {
        /// Quantity as it was stored.
        original_quantity: Decimal,
    },
}

/// A line ready for the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedLine {
    /// Piece count.
    pub quantity: Decimal,
    /// Actual weight in kg.
    pub weight: Decimal,
    /// Whether the heuristic fired.
    pub outcome: LegacyOutcome,
}

/// Applies the legacy heuristic to one stored line.
#[must_use]
pub fn normalize_legacy_line(line: LegacyLine) -> NormalizedLine {
    let quantity = sanitize(line.quantity);
    let weight = line.weight.map_or(Decimal::ZERO, sanitize);

    if !weight.is_zero() {
        return NormalizedLine {
            quantity,
            weight,
            outcome: LegacyOutcome::Unchanged,
        };
    }

    let looks_like_weight = quantity.fract() != Decimal::ZERO || quantity > LEGACY_QUANTITY_THRESHOLD;
    if looks_like_weight {
        NormalizedLine {
            quantity: Decimal::ONE,
            weight: quantity,
            outcome: LegacyOutcome::WeightRecoveredFromQuantity {
                original_quantity: line.quantity,
            },
        }
    } else {
        NormalizedLine {
            quantity,
            weight,
            outcome: LegacyOutcome::Unchanged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(23.5))]
    #[case(dec!(0.75))]
    #[case(dec!(11))]
    #[case(dec!(250))]
    fn test_weight_recovered_from_quantity(#[case] stored: Decimal) {
        let line = normalize_legacy_line(LegacyLine {
            quantity: stored,
            weight: None,
        });
        assert_eq!(line.quantity, dec!(1));
        assert_eq!(line.weight, stored);
        assert_eq!(
            line.outcome,
            LegacyOutcome::WeightRecoveredFromQuantity {
                original_quantity: stored
            }
        );
    }

    #[rstest]
    #[case(dec!(1))]
    #[case(dec!(10))]
    #[case(dec!(0))]
    fn test_small_integer_quantity_is_a_piece_count(#[case] stored: Decimal) {
        let line = normalize_legacy_line(LegacyLine {
            quantity: stored,
            weight: None,
        });
        assert_eq!(line.quantity, stored);
        assert_eq!(line.weight, dec!(0));
        assert_eq!(line.outcome, LegacyOutcome::Unchanged);
    }

    #[test]
    fn test_lines_with_weight_are_untouched() {
        let line = normalize_legacy_line(LegacyLine {
            quantity: dec!(40),
            weight: Some(dec!(12.5)),
        });
        assert_eq!(line.quantity, dec!(40));
        assert_eq!(line.weight, dec!(12.5));
        assert_eq!(line.outcome, LegacyOutcome::Unchanged);
    }

    #[test]
    fn test_zero_weight_column_still_triggers() {
        let line = normalize_legacy_line(LegacyLine {
            quantity: dec!(18.2),
            weight: Some(dec!(0)),
        });
        assert_eq!(line.weight, dec!(18.2));
        assert_eq!(line.quantity, dec!(1));
    }
}
