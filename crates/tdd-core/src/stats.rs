//! Per-day TDD statistics over stored totals.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::types::HistoricalTotal;

/// The TDD reported for one local calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyTdd {
    pub day: NaiveDate,
    pub total: Decimal,
}

/// Latest stored total for each local day, days ascending.
pub fn daily_totals(rows: &[HistoricalTotal], tz: Tz) -> Vec<DailyTdd> {
    let mut latest: BTreeMap<NaiveDate, &HistoricalTotal> = BTreeMap::new();
    for row in rows {
        let day = row.date.with_timezone(&tz).date_naive();
        latest
            .entry(day)
            .and_modify(|current| {
                if row.date > current.date {
                    *current = row;
                }
            })
            .or_insert(row);
    }

    latest
        .into_iter()
        .map(|(day, row)| DailyTdd {
            day,
            total: row.total,
        })
        .collect()
}

/// Mean of the daily totals with `from <= day <= to`; zero when there are none.
pub fn average_daily(daily: &[DailyTdd], from: NaiveDate, to: NaiveDate) -> Decimal {
    let in_range: Vec<Decimal> = daily
        .iter()
        .filter(|entry| (from..=to).contains(&entry.day))
        .map(|entry| entry.total)
        .collect();

    if in_range.is_empty() {
        return Decimal::ZERO;
    }
    in_range.iter().sum::<Decimal>() / Decimal::from(in_range.len())
}
