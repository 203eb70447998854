//! Decimal precision helpers.
//!
//! Truncation and rounding are kept as separate functions on purpose: the
//! weighted average truncates so it never overstates the dose, everything
//! else rounds.

use chrono::Duration;
use rust_decimal::{Decimal, RoundingStrategy};

const MILLIS_PER_HOUR: i64 = 3_600_000;

/// Decimal places kept for interval lengths in hours.
pub const HOURS_PRECISION: u32 = 5;

/// Drops digits past `places` without rounding (toward zero).
pub fn truncate_to_places(value: Decimal, places: u32) -> Decimal {
    value.round_dp_with_strategy(places, RoundingStrategy::ToZero)
}

/// Rounds to `places`, halves away from zero.
pub fn round_to_places(value: Decimal, places: u32) -> Decimal {
    value.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero)
}

/// Length of `duration` in hours, truncated to [`HOURS_PRECISION`] places.
///
/// Negative durations count as zero.
pub fn duration_hours(duration: Duration) -> Decimal {
    let millis = duration.num_milliseconds().max(0);
    truncate_to_places(
        Decimal::from(millis) / Decimal::from(MILLIS_PER_HOUR),
        HOURS_PRECISION,
    )
}

/// Share of `part` in `total` as a percentage rounded to 2 places.
///
/// Returns zero when `total` is not positive.
pub fn percentage_of(part: Decimal, total: Decimal) -> Decimal {
    if total <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    round_to_places(part / total * Decimal::ONE_HUNDRED, 2)
}

/// Formats a decimal with exactly `places` fractional digits.
pub fn format_fixed(value: Decimal, places: u32) -> String {
    let mut rounded = round_to_places(value, places);
    rounded.rescale(places);
    rounded.to_string()
}
