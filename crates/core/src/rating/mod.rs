//! Shipping-weight and line-amount calculation.
//!
//! Carriers bill on whichever is larger: the measured weight or the
//! volumetric weight derived from the parcel's dimensions.

pub mod calculator;
pub mod legacy;

#[cfg(test)]
mod calculator_props;

pub use calculator::{
    DEFAULT_VOLUMETRIC_DIVISOR, Dimensions, RateCalculator, RatingError, WeightQuote,
    parse_measure, sanitize,
};
pub use legacy::{
    LEGACY_QUANTITY_THRESHOLD, LegacyLine, LegacyOutcome, NormalizedLine, normalize_legacy_line,
};
