//! Shared utilities for CLI commands.

use std::sync::LazyLock;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s+(minute|hour|day|week)s?\s+ago$").expect("relative time pattern is valid")
});

/// Conservative bounds for relative time parsing (~1000 years in minutes).
const MAX_RELATIVE_MINUTES: i64 = 1000 * 365 * 24 * 60;

/// Parse a datetime string as either ISO 8601 or relative time, relative to
/// `now`.
///
/// Supports:
/// - ISO 8601: "2025-01-15T10:30:00Z"
/// - Relative: "2 hours ago", "30 minutes ago", "1 day ago", "1 week ago"
pub fn parse_datetime(s: &str, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let Some(caps) = RELATIVE_TIME_RE.captures(s) else {
        anyhow::bail!(
            "Invalid datetime: {s}. Use ISO 8601 (e.g., 2025-01-15T10:30:00Z) or relative (e.g., '2 hours ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;

    let (max_for_unit, minutes_per_unit) = match &caps[2] {
        "minute" => (MAX_RELATIVE_MINUTES, 1),
        "hour" => (MAX_RELATIVE_MINUTES / 60, 60),
        "day" => (MAX_RELATIVE_MINUTES / (60 * 24), 60 * 24),
        "week" => (MAX_RELATIVE_MINUTES / (60 * 24 * 7), 60 * 24 * 7),
        unit => anyhow::bail!("Unknown time unit: {unit}"),
    };

    if n > max_for_unit {
        anyhow::bail!("Relative time value too large: {n} {}", &caps[2]);
    }

    Ok(now - Duration::minutes(n * minutes_per_unit))
}

/// The `--now` flag if given, otherwise the current time.
pub fn resolve_now(arg: Option<&str>) -> anyhow::Result<DateTime<Utc>> {
    let now = Utc::now();
    arg.map_or(Ok(now), |s| parse_datetime(s, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0)
            .single()
            .expect("valid test timestamp")
    }

    #[test]
    fn parses_rfc3339_with_offset() {
        let parsed = parse_datetime("2025-01-15T08:00:00-05:00", now()).expect("valid");
        assert_eq!(
            parsed,
            Utc.with_ymd_and_hms(2025, 1, 15, 13, 0, 0)
                .single()
                .expect("valid")
        );
    }

    #[test]
    fn parses_relative_times() {
        assert_eq!(
            parse_datetime("2 hours ago", now()).expect("valid"),
            now() - Duration::hours(2)
        );
        assert_eq!(
            parse_datetime("1 day ago", now()).expect("valid"),
            now() - Duration::days(1)
        );
        assert_eq!(
            parse_datetime("30 minutes ago", now()).expect("valid"),
            now() - Duration::minutes(30)
        );
    }

    #[test]
    fn rejects_garbage_and_huge_values() {
        assert!(parse_datetime("yesterday-ish", now()).is_err());
        assert!(parse_datetime("99999999 weeks ago", now()).is_err());
    }
}
