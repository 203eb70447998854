//! Sufficiency command for checking how much TDD history is stored.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tdd_core::{SUFFICIENCY_WINDOW_DAYS, SUFFICIENT_TDD_ROWS, is_sufficient};
use tdd_db::Database;

pub fn run<W: Write>(writer: &mut W, db: &Database, now: DateTime<Utc>) -> Result<()> {
    let count = db.count_positive_since(now - Duration::days(SUFFICIENCY_WINDOW_DAYS))?;
    let sufficient = is_sufficient(count);

    let verdict = if sufficient { "yes" } else { "no" };
    writeln!(
        writer,
        "Sufficient TDD data: {verdict} ({count} of {SUFFICIENT_TDD_ROWS} required results in the last {SUFFICIENCY_WINDOW_DAYS} days)"
    )?;
    Ok(())
}
