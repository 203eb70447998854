//! Daily command for per-day TDD statistics.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Days, NaiveDate, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::Serialize;
use tdd_core::numeric::format_fixed;
use tdd_core::schedule::local_midnight;
use tdd_core::{DailyTdd, HistoricalTotal, average_daily, daily_totals};
use tdd_db::Database;

/// Per-day TDD over a range of local days.
#[derive(Debug, Serialize)]
pub struct DailyReport {
    pub timezone: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub days: Vec<DailyTdd>,
    pub average: Decimal,
}

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    tz: Tz,
    days: u32,
    json: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    let report = build_report(db, tz, days, now)?;
    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        write!(writer, "{}", format_report(&report, days))?;
    }
    Ok(())
}

/// Collects the latest stored total for each of the last `days` local days.
pub fn build_report(db: &Database, tz: Tz, days: u32, now: DateTime<Utc>) -> Result<DailyReport> {
    let to = now.with_timezone(&tz).date_naive();
    let from = to
        .checked_sub_days(Days::new(u64::from(days.saturating_sub(1))))
        .context("day range is out of bounds")?;

    let totals: Vec<HistoricalTotal> = db
        .list_results(local_midnight(from, tz))?
        .into_iter()
        .filter(|row| row.date <= now)
        .map(|row| HistoricalTotal {
            date: row.date,
            total: row.total,
        })
        .collect();

    let days = daily_totals(&totals, tz);
    let average = average_daily(&days, from, to);
    Ok(DailyReport {
        timezone: tz.name().to_string(),
        from,
        to,
        days,
        average,
    })
}

/// Formats the human-readable report.
pub fn format_report(report: &DailyReport, days: u32) -> String {
    if report.days.is_empty() {
        return format!("No stored TDD results in the last {days} days.\n");
    }

    let mut output = format!("Daily TDD ({}, {} to {})\n", report.timezone, report.from, report.to);
    for day in &report.days {
        output.push_str(&format!("{}  {:>8} U\n", day.day, format_fixed(day.total, 2)));
    }
    output.push_str(&format!(
        "Average     {:>8} U over {} days\n",
        format_fixed(report.average, 2),
        report.days.len()
    ));
    output
}
