//! Storage layer for total daily dose results.
//!
//! Persists TDD results with `rusqlite` and serves them back to the engine
//! through [`TddHistory`].
//!
//! # Thread Safety
//!
//! [`Database`] wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! Wrap it in a `Mutex` or open one `Database` per thread for shared access.
//!
//! # Schema
//!
//! Timestamps are stored as TEXT in RFC 3339 UTC with millisecond precision
//! (e.g., `2025-01-15T10:30:00.000Z`), so lexicographic order matches
//! chronological order. Decimal amounts are stored as TEXT so they read back
//! exactly as written.

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use tdd_core::{HistoricalTotal, HistoryError, TddHistory, TddResult};
use thiserror::Error;
use uuid::Uuid;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for row {row_id}: {timestamp}")]
    TimestampParse {
        row_id: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// Failed to parse a stored decimal amount.
    #[error("invalid {column} for row {row_id}: {value}")]
    DecimalParse {
        row_id: String,
        column: &'static str,
        value: String,
        #[source]
        source: rust_decimal::Error,
    },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// A stored TDD result.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTdd {
    pub id: String,
    pub date: DateTime<Utc>,
    pub total: Decimal,
    pub bolus: Decimal,
    pub temp_basal: Decimal,
    pub scheduled_basal: Decimal,
    pub weighted_average: Option<Decimal>,
    pub hours_of_data: f64,
}

/// Raw column values, before parsing.
struct StoredRow {
    id: String,
    date: String,
    total: String,
    bolus: String,
    temp_basal: String,
    scheduled_basal: String,
    weighted_average: Option<String>,
    hours_of_data: f64,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- date: RFC 3339 UTC, e.g. '2025-01-15T10:30:00.000Z'
            -- amounts: decimal strings in units
            CREATE TABLE IF NOT EXISTS tdd_stored (
                id TEXT PRIMARY KEY,
                date TEXT NOT NULL,
                total TEXT NOT NULL,
                bolus TEXT NOT NULL,
                temp_basal TEXT NOT NULL,
                scheduled_basal TEXT NOT NULL,
                weighted_average TEXT,
                hours_of_data REAL NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tdd_stored_date ON tdd_stored(date);
            ",
        )?;
        Ok(())
    }

    /// Stores a result stamped with `date` and returns its new ID.
    pub fn store_result(&self, result: &TddResult, date: DateTime<Utc>) -> Result<String, DbError> {
        let id = Uuid::new_v4().to_string();
        self.conn.execute(
            "
            INSERT INTO tdd_stored
            (id, date, total, bolus, temp_basal, scheduled_basal, weighted_average, hours_of_data)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ",
            params![
                id,
                format_timestamp(date),
                result.total().to_string(),
                result.bolus().to_string(),
                result.temp_basal().to_string(),
                result.scheduled_basal().to_string(),
                result.weighted_average().map(|avg| avg.to_string()),
                result.hours_of_data(),
            ],
        )?;
        tracing::debug!(%id, %date, total = %result.total(), "stored TDD result");
        Ok(id)
    }

    /// Lists stored results with `date >= since`, oldest first.
    pub fn list_results(&self, since: DateTime<Utc>) -> Result<Vec<StoredTdd>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, date, total, bolus, temp_basal, scheduled_basal, weighted_average, hours_of_data
            FROM tdd_stored
            WHERE date >= ?
            ORDER BY date ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map([format_timestamp(since)], |row| {
            Ok(StoredRow {
                id: row.get(0)?,
                date: row.get(1)?,
                total: row.get(2)?,
                bolus: row.get(3)?,
                temp_basal: row.get(4)?,
                scheduled_basal: row.get(5)?,
                weighted_average: row.get(6)?,
                hours_of_data: row.get(7)?,
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?.parse()?);
        }
        Ok(results)
    }

    /// Stored totals with `date >= since`, oldest first.
    pub fn totals_since(&self, since: DateTime<Utc>) -> Result<Vec<HistoricalTotal>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, date, total
            FROM tdd_stored
            WHERE date >= ?
            ORDER BY date ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map([format_timestamp(since)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut totals = Vec::new();
        for row in rows {
            let (id, date, total) = row?;
            totals.push(HistoricalTotal {
                date: parse_timestamp(&date, &id)?,
                total: parse_decimal(&total, "total", &id)?,
            });
        }
        Ok(totals)
    }

    /// Number of stored rows with `date > since` and a positive total.
    pub fn count_positive_since(&self, since: DateTime<Utc>) -> Result<usize, DbError> {
        let count: i64 = self.conn.query_row(
            "
            SELECT COUNT(*)
            FROM tdd_stored
            WHERE date > ? AND CAST(total AS REAL) > 0
            ",
            [format_timestamp(since)],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

impl TddHistory for Database {
    async fn totals_since(&self, since: DateTime<Utc>) -> Result<Vec<HistoricalTotal>, HistoryError> {
        Self::totals_since(self, since).map_err(HistoryError::new)
    }

    async fn count_positive_since(&self, since: DateTime<Utc>) -> Result<usize, HistoryError> {
        Self::count_positive_since(self, since).map_err(HistoryError::new)
    }
}

impl StoredRow {
    fn parse(self) -> Result<StoredTdd, DbError> {
        let weighted_average = self
            .weighted_average
            .as_deref()
            .map(|value| parse_decimal(value, "weighted_average", &self.id))
            .transpose()?;
        Ok(StoredTdd {
            date: parse_timestamp(&self.date, &self.id)?,
            total: parse_decimal(&self.total, "total", &self.id)?,
            bolus: parse_decimal(&self.bolus, "bolus", &self.id)?,
            temp_basal: parse_decimal(&self.temp_basal, "temp_basal", &self.id)?,
            scheduled_basal: parse_decimal(&self.scheduled_basal, "scheduled_basal", &self.id)?,
            weighted_average,
            hours_of_data: self.hours_of_data,
            id: self.id,
        })
    }
}

fn parse_timestamp(timestamp: &str, row_id: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            row_id: row_id.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

fn parse_decimal(value: &str, column: &'static str, row_id: &str) -> Result<Decimal, DbError> {
    Decimal::from_str(value).map_err(|source| DbError::DecimalParse {
        row_id: row_id.to_string(),
        column,
        value: value.to_string(),
        source,
    })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
