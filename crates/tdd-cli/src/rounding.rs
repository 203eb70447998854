//! Pump delivery rounding.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Rounds an amount to the nearest multiple of `increment`, halves away from
/// zero.
///
/// A non-positive increment leaves amounts untouched.
pub fn increment_rounding(increment: Decimal) -> impl Fn(f64) -> f64 + Copy + Sync {
    let step = increment
        .to_f64()
        .filter(|step| step.is_finite() && *step > 0.0);
    move |units: f64| step.map_or(units, |step| (units / step).round() * step)
}
