//! Finding where scheduled basal applied.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::schedule::local_day_bounds;
use crate::types::{Gap, ResolvedInterval};

/// Complement of the resolved temp basal intervals over one local day.
///
/// The day is the one containing `first_temp_basal`. Suspensions are not
/// considered here; they end up inside gaps and are removed afterwards with
/// [`subtract_suspensions`]. With no temp basals at all, the whole day
/// containing `now` is one gap.
pub fn find_gaps(
    timeline: &[ResolvedInterval],
    first_temp_basal: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    tz: Tz,
) -> Vec<Gap> {
    let Some(anchor) = first_temp_basal else {
        let (start, end) = local_day_bounds(now, tz);
        return vec![Gap { start, end }];
    };

    let (day_start, day_end) = local_day_bounds(anchor, tz);
    let mut gaps = Vec::new();
    let mut cursor = day_start;

    for interval in timeline.iter().filter(|i| i.is_temp_basal()) {
        let start = interval.start.clamp(day_start, day_end);
        let end = interval.end.clamp(day_start, day_end);
        if start > cursor {
            gaps.push(Gap {
                start: cursor,
                end: start,
            });
        }
        cursor = cursor.max(end);
    }

    if cursor < day_end {
        gaps.push(Gap {
            start: cursor,
            end: day_end,
        });
    }

    gaps
}

/// Removes suspended time from the gaps.
///
/// `timeline` must be ordered by start, as produced by
/// [`build_timeline`](crate::timeline::build_timeline).
pub fn subtract_suspensions(gaps: &[Gap], timeline: &[ResolvedInterval]) -> Vec<Gap> {
    let mut remaining = Vec::with_capacity(gaps.len());

    for gap in gaps {
        let mut cursor = gap.start;
        for suspension in timeline.iter().filter(|i| i.is_suspended()) {
            if suspension.end <= cursor || suspension.start >= gap.end {
                continue;
            }
            if suspension.start > cursor {
                remaining.push(Gap {
                    start: cursor,
                    end: suspension.start,
                });
            }
            cursor = cursor.max(suspension.end);
        }
        if cursor < gap.end {
            remaining.push(Gap {
                start: cursor,
                end: gap.end,
            });
        }
    }

    remaining
}
