//! Insulin accumulators.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::classify::Bolus;
use crate::numeric::duration_hours;
use crate::schedule::{BasalSchedule, minute_of_day};
use crate::types::{Gap, PumpEvent, ResolvedInterval};

/// Rounds an amount to what the pump can actually deliver.
///
/// This is a device capability and is always supplied by the caller.
pub trait RateRounding {
    fn round_to_supported_rate(&self, units_per_hour: f64) -> f64;
}

impl<F> RateRounding for F
where
    F: Fn(f64) -> f64,
{
    fn round_to_supported_rate(&self, units_per_hour: f64) -> f64 {
        self(units_per_hour)
    }
}

/// Sum of all bolus amounts.
pub fn sum_boluses(boluses: &[Bolus]) -> Decimal {
    boluses.iter().map(|bolus| bolus.amount).sum()
}

/// Insulin delivered by resolved temp basal intervals.
pub fn sum_temp_basal<R>(timeline: &[ResolvedInterval], rounding: &R) -> Decimal
where
    R: RateRounding + ?Sized,
{
    timeline
        .iter()
        .filter_map(|interval| {
            let rate = interval.rate()?;
            let hours = duration_hours(interval.duration());
            let units = delivered_units(rate, hours, rounding)?;
            tracing::trace!(
                %rate,
                %hours,
                %units,
                start = %interval.start,
                end = %interval.end,
                "temp basal contribution"
            );
            Some(units)
        })
        .sum()
}

/// Insulin delivered by the schedule over `gaps`, up to `now`.
///
/// Each gap is walked in steps that end at the next schedule boundary, the
/// gap's end, or `now`, whichever comes first. A step with no matching
/// schedule entry contributes nothing.
pub fn sum_scheduled_basal<R>(
    gaps: &[Gap],
    schedule: &BasalSchedule,
    rounding: &R,
    now: DateTime<Utc>,
    tz: Tz,
) -> Decimal
where
    R: RateRounding + ?Sized,
{
    if schedule.is_empty() {
        tracing::debug!("no basal schedule; scheduled basal is zero");
        return Decimal::ZERO;
    }

    let mut total = Decimal::ZERO;
    for gap in gaps {
        let limit = gap.end.min(now);
        let mut cursor = gap.start;

        while cursor < limit {
            let boundary = schedule.next_boundary_after(cursor, tz);
            let step_end = if boundary > cursor {
                boundary.min(limit)
            } else {
                limit
            };

            let minute = minute_of_day(cursor, tz);
            match schedule.rate_at(minute) {
                Some(rate) => {
                    let hours = duration_hours(step_end - cursor);
                    if let Some(units) = delivered_units(rate, hours, rounding) {
                        total += units;
                    }
                }
                None => tracing::warn!(
                    minute,
                    start = %cursor,
                    end = %step_end,
                    "no basal schedule entry covers this time; skipping"
                ),
            }

            cursor = step_end;
        }
    }
    total
}

/// Hours between the earliest event and the latest evidence of delivery.
///
/// Latest evidence is the newest event or the end of the latest resolved
/// temp basal, whichever is later, clamped to `now`.
pub fn hours_of_data(
    events: &[PumpEvent],
    timeline: &[ResolvedInterval],
    now: DateTime<Utc>,
) -> f64 {
    let Some(earliest) = events.iter().map(|event| event.timestamp).min() else {
        return 0.0;
    };
    let latest_event = events
        .iter()
        .map(|event| event.timestamp)
        .max()
        .unwrap_or(earliest);
    let latest = timeline
        .iter()
        .filter(|interval| interval.is_temp_basal())
        .map(|interval| interval.end)
        .fold(latest_event, |latest, end| latest.max(end))
        .min(now);

    #[expect(
        clippy::cast_precision_loss,
        reason = "history spans are far below f64's exact integer range"
    )]
    let millis = (latest - earliest).num_milliseconds().max(0) as f64;
    millis / 3_600_000.0
}

/// `rate × hours`, rounded by the pump capability. Only positive amounts
/// count.
fn delivered_units<R>(rate: Decimal, hours: Decimal, rounding: &R) -> Option<Decimal>
where
    R: RateRounding + ?Sized,
{
    let raw = (rate * hours).to_f64()?;
    let rounded = rounding.round_to_supported_rate(raw);
    if !rounded.is_finite() {
        tracing::warn!(raw, rounded, "rounding produced a non-finite amount; skipping");
        return None;
    }
    Decimal::from_f64(rounded).filter(|units| *units > Decimal::ZERO)
}
