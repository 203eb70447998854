//! Basal timeline resolution.
//!
//! Temp basals and suspensions are merged into one chronologically ordered,
//! non-overlapping timeline:
//!
//! 1. A temp basal still running when the next timeline entry starts is cut
//!    off at that start (the pump replaced or interrupted it).
//! 2. An entry starting inside an earlier suspension starts when the
//!    suspension ends.
//! 3. Nothing ends after `now`.
//!
//! Entries left with no positive duration are dropped.

use chrono::{DateTime, Duration, Utc};

use crate::classify::{SuspendPair, TempBasal};
use crate::types::{IntervalKind, ResolvedInterval};

/// A timeline entry before conflict resolution.
#[derive(Debug, Clone, Copy)]
struct TimelineEntry {
    start: DateTime<Utc>,
    declared_end: DateTime<Utc>,
    kind: IntervalKind,
}

/// Builds the resolved basal timeline.
///
/// Entries starting at the same instant keep their input order, temp basals
/// ahead of suspensions.
pub fn build_timeline(
    temp_basals: &[TempBasal],
    suspensions: &[SuspendPair],
    now: DateTime<Utc>,
) -> Vec<ResolvedInterval> {
    let mut entries: Vec<TimelineEntry> = temp_basals
        .iter()
        .map(|temp| TimelineEntry {
            start: temp.timestamp,
            declared_end: temp.timestamp + Duration::minutes(i64::from(temp.duration_minutes)),
            kind: IntervalKind::TempBasalActive { rate: temp.rate },
        })
        .chain(suspensions.iter().map(|pair| TimelineEntry {
            start: pair.suspended_at,
            declared_end: pair.resumed_at,
            kind: IntervalKind::Suspended,
        }))
        .collect();
    entries.sort_by_key(|entry| entry.start);

    let mut resolved: Vec<ResolvedInterval> = Vec::with_capacity(entries.len());
    let mut covered_until: Option<DateTime<Utc>> = None;

    for (index, entry) in entries.iter().enumerate() {
        let next_start = entries.get(index + 1).map(|next| next.start);
        let end = match (entry.kind, next_start) {
            (IntervalKind::TempBasalActive { .. }, Some(next)) if next < entry.declared_end => next,
            _ => entry.declared_end,
        }
        .min(now);

        let start = covered_until.map_or(entry.start, |until| entry.start.max(until));

        if end > start {
            resolved.push(ResolvedInterval {
                start,
                end,
                kind: entry.kind,
            });
            covered_until = Some(end);
        } else {
            tracing::debug!(
                start = %entry.start,
                declared_end = %entry.declared_end,
                kind = ?entry.kind,
                "timeline entry has no effective duration"
            );
        }
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    fn ts(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0)
            .single()
            .expect("valid test timestamp")
            + Duration::minutes(minutes)
    }

    fn dec(s: &str) -> Decimal {
        s.parse().expect("valid decimal")
    }

    fn temp(minutes: i64, rate: &str, duration_minutes: u32) -> TempBasal {
        TempBasal {
            timestamp: ts(minutes),
            rate: dec(rate),
            duration_minutes,
        }
    }

    fn suspend(from: i64, to: i64) -> SuspendPair {
        SuspendPair {
            suspended_at: ts(from),
            resumed_at: ts(to),
        }
    }

    fn spans(timeline: &[ResolvedInterval]) -> Vec<(DateTime<Utc>, DateTime<Utc>, bool)> {
        timeline
            .iter()
            .map(|i| (i.start, i.end, i.is_suspended()))
            .collect()
    }

    #[test]
    fn later_temp_basal_cancels_earlier_one() {
        let timeline = build_timeline(
            &[temp(480, "1.0", 30), temp(490, "2.0", 30)],
            &[],
            ts(1440),
        );

        assert_eq!(
            spans(&timeline),
            vec![(ts(480), ts(490), false), (ts(490), ts(520), false)]
        );
        assert_eq!(timeline[1].rate(), Some(dec("2.0")));
    }

    #[test]
    fn temp_basal_starting_inside_suspension_waits_for_resume() {
        let timeline = build_timeline(&[temp(555, "1.0", 30)], &[suspend(540, 570)], ts(1440));

        assert_eq!(
            spans(&timeline),
            vec![(ts(540), ts(570), true), (ts(570), ts(585), false)]
        );
    }

    #[test]
    fn suspension_interrupts_running_temp_basal() {
        let timeline = build_timeline(&[temp(600, "1.0", 60)], &[suspend(620, 640)], ts(1440));

        assert_eq!(
            spans(&timeline),
            vec![(ts(600), ts(620), false), (ts(620), ts(640), true)]
        );
    }

    #[test]
    fn ends_are_clamped_to_now() {
        let timeline = build_timeline(
            &[temp(600, "1.0", 120), temp(700, "1.0", 30)],
            &[suspend(650, 720)],
            ts(660),
        );

        // The second temp basal has not started yet; the suspension is still running.
        assert_eq!(
            spans(&timeline),
            vec![(ts(600), ts(650), false), (ts(650), ts(660), true)]
        );
    }

    #[test]
    fn zero_length_entries_are_dropped() {
        let timeline = build_timeline(&[temp(600, "1.0", 0)], &[], ts(1440));
        assert!(timeline.is_empty());
    }

    #[test]
    fn temp_basal_issued_with_suspension_is_dropped() {
        let timeline = build_timeline(&[temp(600, "1.0", 30)], &[suspend(600, 660)], ts(1440));
        assert_eq!(spans(&timeline), vec![(ts(600), ts(660), true)]);
    }

    #[test]
    fn resolved_timeline_never_overlaps() {
        let timeline = build_timeline(
            &[
                temp(480, "1.0", 30),
                temp(490, "2.0", 30),
                temp(555, "0.5", 60),
                temp(700, "0.0", 240),
                temp(720, "1.2", 30),
            ],
            &[suspend(540, 570), suspend(545, 560), suspend(800, 830)],
            ts(1000),
        );

        assert!(!timeline.is_empty());
        for interval in &timeline {
            assert!(interval.end > interval.start, "{interval:?}");
        }
        for pair in timeline.windows(2) {
            assert!(pair[0].end <= pair[1].start, "{pair:?}");
        }
    }
}
