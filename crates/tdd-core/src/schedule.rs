//! Time-of-day basal schedule.
//!
//! Entry *n* is in effect from its offset until entry *n + 1*'s offset; the
//! last entry runs until midnight.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minutes in a calendar day.
pub const MINUTES_PER_DAY: u32 = 1440;

/// Schedule validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// An entry's offset is past the end of the day.
    #[error("schedule offset {minutes} is outside 0..1440")]
    OffsetOutOfRange { minutes: u32 },

    /// Entries are not strictly ascending by offset.
    #[error("schedule offsets must be strictly ascending: {previous} then {next}")]
    NotAscending { previous: u32, next: u32 },

    /// An entry's rate is zero or negative.
    #[error("schedule rate at offset {minutes} must be positive, got {rate}")]
    NonPositiveRate { minutes: u32, rate: Decimal },
}

/// One row of the basal schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasalScheduleEntry {
    /// Offset from local midnight at which this rate starts.
    #[serde(alias = "minutes")]
    pub minutes_from_midnight: u32,
    /// Scheduled rate in U/hr.
    pub rate: Decimal,
}

/// A validated, ascending basal schedule.
///
/// An empty schedule is allowed and simply never yields a rate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BasalSchedule {
    entries: Vec<BasalScheduleEntry>,
}

impl BasalSchedule {
    /// Validates and wraps schedule entries.
    pub fn new(entries: Vec<BasalScheduleEntry>) -> Result<Self, ScheduleError> {
        for entry in &entries {
            if entry.minutes_from_midnight >= MINUTES_PER_DAY {
                return Err(ScheduleError::OffsetOutOfRange {
                    minutes: entry.minutes_from_midnight,
                });
            }
            if entry.rate <= Decimal::ZERO {
                return Err(ScheduleError::NonPositiveRate {
                    minutes: entry.minutes_from_midnight,
                    rate: entry.rate,
                });
            }
        }
        for pair in entries.windows(2) {
            if pair[1].minutes_from_midnight <= pair[0].minutes_from_midnight {
                return Err(ScheduleError::NotAscending {
                    previous: pair[0].minutes_from_midnight,
                    next: pair[1].minutes_from_midnight,
                });
            }
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[BasalScheduleEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether every minute of the day has a rate.
    pub fn covers_full_day(&self) -> bool {
        self.entries
            .first()
            .is_some_and(|entry| entry.minutes_from_midnight == 0)
    }

    /// Finds the rate in effect at `minutes` past midnight.
    ///
    /// Returns `None` when no entry covers the query, which can only happen
    /// for a schedule that does not start at midnight.
    pub fn rate_at(&self, minutes: u32) -> Option<Decimal> {
        // A lone entry applies all day.
        if let [only] = self.entries.as_slice() {
            return Some(only.rate);
        }
        if minutes >= MINUTES_PER_DAY {
            return None;
        }

        let mut low = 0;
        let mut high = self.entries.len();
        while low < high {
            let mid = low + (high - low) / 2;
            let entry = &self.entries[mid];
            let next = self
                .entries
                .get(mid + 1)
                .map_or(MINUTES_PER_DAY, |e| e.minutes_from_midnight);

            if minutes < entry.minutes_from_midnight {
                high = mid;
            } else if minutes >= next {
                low = mid + 1;
            } else {
                return Some(entry.rate);
            }
        }
        None
    }

    /// The next instant after `instant` at which the scheduled rate may change.
    ///
    /// That is the next entry offset later today, or the following local
    /// midnight if there is none. An offset that occurs twice on a fall-back
    /// day resolves to whichever occurrence is still ahead of `instant`.
    pub fn next_boundary_after(&self, instant: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
        let local = instant.with_timezone(&tz);
        let minute = minute_of_day(instant, tz);
        let date = local.date_naive();

        self.entries
            .iter()
            .filter(|entry| entry.minutes_from_midnight > minute)
            .find_map(|entry| {
                let (earliest, latest) = local_instants(date, entry.minutes_from_midnight, tz);
                [earliest, latest]
                    .into_iter()
                    .find(|candidate| *candidate > instant)
            })
            .unwrap_or_else(|| local_midnight(date + Duration::days(1), tz))
    }
}

/// Whole minutes since local midnight for `instant` in `tz`.
pub fn minute_of_day(instant: DateTime<Utc>, tz: Tz) -> u32 {
    let local = instant.with_timezone(&tz);
    local.hour() * 60 + local.minute()
}

/// Start and end of the local calendar day containing `instant`, as a
/// half-open range.
pub fn local_day_bounds(instant: DateTime<Utc>, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let date = instant.with_timezone(&tz).date_naive();
    (
        local_midnight(date, tz),
        local_midnight(date + Duration::days(1), tz),
    )
}

/// Converts local midnight of `date` to UTC.
///
/// Ambiguous times resolve to the earlier instant; a midnight skipped by a
/// DST change falls forward to 01:00.
pub fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    local_instant(date, 0, tz)
}

fn local_instant(date: NaiveDate, minutes: u32, tz: Tz) -> DateTime<Utc> {
    local_instants(date, minutes, tz).0
}

/// Both UTC instants a local wall time maps to, earliest first.
///
/// They are equal unless the wall time repeats on a fall-back day. A wall
/// time skipped by spring-forward moves one hour later.
fn local_instants(date: NaiveDate, minutes: u32, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let naive = date.and_time(NaiveTime::MIN) + Duration::minutes(i64::from(minutes));
    let resolved = match tz.from_local_datetime(&naive) {
        LocalResult::None => tz.from_local_datetime(&(naive + Duration::hours(1))),
        resolved => resolved,
    };
    match resolved {
        LocalResult::Single(dt) => (dt.with_timezone(&Utc), dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(first, second) => {
            (first.with_timezone(&Utc), second.with_timezone(&Utc))
        }
        LocalResult::None => {
            let fallback = Utc.from_utc_datetime(&naive);
            (fallback, fallback)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().expect("valid decimal")
    }

    fn entry(minutes: u32, rate: &str) -> BasalScheduleEntry {
        BasalScheduleEntry {
            minutes_from_midnight: minutes,
            rate: dec(rate),
        }
    }

    fn three_rate_schedule() -> BasalSchedule {
        BasalSchedule::new(vec![
            entry(0, "1.0"),
            entry(360, "2.0"),
            entry(1200, "0.5"),
        ])
        .expect("valid schedule")
    }

    #[test]
    fn lookup_finds_covering_entry() {
        let schedule = three_rate_schedule();
        assert_eq!(schedule.rate_at(0), Some(dec("1.0")));
        assert_eq!(schedule.rate_at(359), Some(dec("1.0")));
        assert_eq!(schedule.rate_at(360), Some(dec("2.0")));
        assert_eq!(schedule.rate_at(1199), Some(dec("2.0")));
        assert_eq!(schedule.rate_at(1200), Some(dec("0.5")));
        assert_eq!(schedule.rate_at(1439), Some(dec("0.5")));
    }

    #[test]
    fn single_entry_applies_all_day() {
        let schedule = BasalSchedule::new(vec![entry(0, "0.8")]).expect("valid schedule");
        assert_eq!(schedule.rate_at(0), Some(dec("0.8")));
        assert_eq!(schedule.rate_at(1439), Some(dec("0.8")));
    }

    #[test]
    fn lookup_misses_before_first_offset() {
        let schedule =
            BasalSchedule::new(vec![entry(360, "1.0"), entry(720, "2.0")]).expect("valid");
        assert!(!schedule.covers_full_day());
        assert_eq!(schedule.rate_at(100), None);
        assert_eq!(schedule.rate_at(500), Some(dec("1.0")));
        assert_eq!(schedule.rate_at(MINUTES_PER_DAY), None);
    }

    #[test]
    fn empty_schedule_never_matches() {
        let schedule = BasalSchedule::default();
        assert!(schedule.is_empty());
        assert_eq!(schedule.rate_at(600), None);
    }

    #[test]
    fn rejects_malformed_entries() {
        assert_eq!(
            BasalSchedule::new(vec![entry(1440, "1.0")]),
            Err(ScheduleError::OffsetOutOfRange { minutes: 1440 })
        );
        assert_eq!(
            BasalSchedule::new(vec![entry(0, "1.0"), entry(0, "2.0")]),
            Err(ScheduleError::NotAscending {
                previous: 0,
                next: 0
            })
        );
        assert!(matches!(
            BasalSchedule::new(vec![entry(0, "0")]),
            Err(ScheduleError::NonPositiveRate { minutes: 0, .. })
        ));
    }

    #[test]
    fn next_boundary_walks_entries_then_midnight() {
        let schedule = three_rate_schedule();
        let tz = Tz::UTC;
        let at = |h, m| {
            Utc.with_ymd_and_hms(2025, 1, 15, h, m, 0)
                .single()
                .expect("valid")
        };

        assert_eq!(schedule.next_boundary_after(at(0, 0), tz), at(6, 0));
        assert_eq!(schedule.next_boundary_after(at(6, 0), tz), at(20, 0));
        assert_eq!(schedule.next_boundary_after(at(19, 59), tz), at(20, 0));
        assert_eq!(
            schedule.next_boundary_after(at(21, 30), tz),
            Utc.with_ymd_and_hms(2025, 1, 16, 0, 0, 0)
                .single()
                .expect("valid")
        );
    }

    #[test]
    fn day_bounds_follow_local_time() {
        let tz: Tz = "America/New_York".parse().expect("known zone");
        // 03:00 UTC on the 15th is still the evening of the 14th in New York.
        let instant = Utc.with_ymd_and_hms(2025, 1, 15, 3, 0, 0).single().expect("valid");
        let (start, end) = local_day_bounds(instant, tz);

        assert_eq!(
            start,
            Utc.with_ymd_and_hms(2025, 1, 14, 5, 0, 0).single().expect("valid")
        );
        assert_eq!(end - start, Duration::hours(24));
    }

    #[test]
    fn day_bounds_shrink_on_spring_forward() {
        let tz: Tz = "America/New_York".parse().expect("known zone");
        let instant = Utc.with_ymd_and_hms(2024, 3, 10, 17, 0, 0).single().expect("valid");
        let (start, end) = local_day_bounds(instant, tz);
        assert_eq!(end - start, Duration::hours(23));
    }

    #[test]
    fn next_boundary_in_repeated_hour_stays_ahead() {
        let tz: Tz = "America/New_York".parse().expect("known zone");
        let schedule =
            BasalSchedule::new(vec![entry(0, "1.0"), entry(90, "2.0")]).expect("valid schedule");
        let at = |h, m| {
            Utc.with_ymd_and_hms(2024, 11, 3, h, m, 0)
                .single()
                .expect("valid")
        };

        // 05:00Z is 01:00 EDT, the first pass through 01:00.
        assert_eq!(schedule.next_boundary_after(at(5, 0), tz), at(5, 30));
        // 06:00Z is 01:00 EST, the repeat; 01:30 EDT is already behind it.
        assert_eq!(schedule.next_boundary_after(at(6, 0), tz), at(6, 30));
        // Past the last entry, the next boundary is midnight EST.
        assert_eq!(
            schedule.next_boundary_after(at(6, 30), tz),
            Utc.with_ymd_and_hms(2024, 11, 4, 5, 0, 0)
                .single()
                .expect("valid")
        );
    }

    #[test]
    fn day_bounds_grow_on_fall_back() {
        let tz: Tz = "America/New_York".parse().expect("known zone");
        let instant = Utc.with_ymd_and_hms(2024, 11, 3, 17, 0, 0).single().expect("valid");
        let (start, end) = local_day_bounds(instant, tz);
        assert_eq!(end - start, Duration::hours(25));
    }

    #[test]
    fn minute_of_day_uses_zone() {
        let tz: Tz = "Asia/Kolkata".parse().expect("known zone");
        let instant = Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).single().expect("valid");
        // UTC+05:30
        assert_eq!(minute_of_day(instant, tz), 330);
    }
}
