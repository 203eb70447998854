//! Weighted TDD average and data sufficiency.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::numeric::truncate_to_places;
use crate::types::HistoricalTotal;

/// Window counted as "recent" for the weighted average.
pub const RECENT_WINDOW_HOURS: i64 = 2;

/// Window counted as "historical" for the weighted average.
pub const HISTORY_WINDOW_DAYS: i64 = 10;

/// Window checked for data sufficiency.
pub const SUFFICIENCY_WINDOW_DAYS: i64 = 7;

/// Rows needed in the sufficiency window: 85% of seven days of 5-minute
/// samples, floored.
pub const SUFFICIENT_TDD_ROWS: usize = 7 * 288 * 85 / 100;

/// Decimal places kept in the weighted average.
const WEIGHTED_AVERAGE_PLACES: u32 = 3;

/// The storage collaborator failed to read stored totals.
#[derive(Debug, Error)]
#[error("failed to read stored TDD totals: {source}")]
pub struct HistoryError {
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
}

impl HistoryError {
    pub fn new(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

/// Read access to previously stored TDD totals.
pub trait TddHistory {
    /// Rows with `date >= since`.
    fn totals_since(
        &self,
        since: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<HistoricalTotal>, HistoryError>>;

    /// Number of rows with `date > since` and a positive total.
    fn count_positive_since(
        &self,
        since: DateTime<Utc>,
    ) -> impl Future<Output = Result<usize, HistoryError>>;
}

/// Blends the recent and historical means of `rows`.
///
/// `rows` are the totals from the historical window. Returns zero when there
/// are none. The result is truncated, not rounded.
pub fn weighted_average_of(rows: &[HistoricalTotal], now: DateTime<Utc>, weight: Decimal) -> Decimal {
    if rows.is_empty() {
        return Decimal::ZERO;
    }

    let recent_since = now - Duration::hours(RECENT_WINDOW_HOURS);
    let history_since = now - Duration::days(HISTORY_WINDOW_DAYS);

    let recent = mean(rows.iter().filter(|row| row.date > recent_since));
    let historical = mean(rows.iter().filter(|row| row.date >= history_since));

    let weighted = weight * recent + (Decimal::ONE - weight) * historical;
    tracing::debug!(%recent, %historical, %weight, %weighted, "weighted TDD average");
    truncate_to_places(weighted, WEIGHTED_AVERAGE_PLACES)
}

/// Whether `count` qualifying rows are enough to trust the average.
pub const fn is_sufficient(count: usize) -> bool {
    count >= SUFFICIENT_TDD_ROWS
}

/// Reads the last ten days of stored totals and blends them.
pub async fn weighted_average<H>(
    history: &H,
    now: DateTime<Utc>,
    weight: Decimal,
) -> Result<Decimal, HistoryError>
where
    H: TddHistory,
{
    let rows = history
        .totals_since(now - Duration::days(HISTORY_WINDOW_DAYS))
        .await?;
    Ok(weighted_average_of(&rows, now, weight))
}

/// Whether the last seven days hold enough positive stored totals.
pub async fn has_sufficient_tdd<H>(history: &H, now: DateTime<Utc>) -> Result<bool, HistoryError>
where
    H: TddHistory,
{
    let count = history
        .count_positive_since(now - Duration::days(SUFFICIENCY_WINDOW_DAYS))
        .await?;
    tracing::debug!(count, required = SUFFICIENT_TDD_ROWS, "TDD sufficiency");
    Ok(is_sufficient(count))
}

fn mean<'a>(rows: impl Iterator<Item = &'a HistoricalTotal>) -> Decimal {
    let (sum, count) = rows.fold((Decimal::ZERO, 0_u64), |(sum, count), row| {
        (sum + row.total, count + 1)
    });
    sum / Decimal::from(count.max(1))
}
