//! Calculate command for computing the total daily dose.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tdd_core::numeric::{format_fixed, percentage_of};
use tdd_core::{BasalSchedule, BasalScheduleEntry, PumpEvent, TddCalculator, TddResult};
use tdd_db::Database;

use crate::Config;
use crate::rounding::increment_rounding;

/// Inputs for one calculation.
#[derive(Debug, Clone, Copy)]
pub struct CalculateArgs<'a> {
    pub history: &'a Path,
    pub schedule: &'a Path,
    pub store: bool,
    pub json: bool,
    pub now: DateTime<Utc>,
}

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    config: &Config,
    args: &CalculateArgs<'_>,
) -> Result<()> {
    let events = load_events(args.history)?;
    let schedule = load_schedule(args.schedule)?;
    let calculator = TddCalculator::new(config.tdd_config()?);
    let rounding = increment_rounding(config.basal_increment);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .context("failed to initialize tokio runtime")?;
    let result = runtime
        .block_on(calculator.calculate(&events, &schedule, &rounding, db, args.now))
        .context("TDD calculation failed")?;

    if args.store {
        match db.store_result(&result, args.now) {
            Ok(id) => tracing::debug!(%id, "stored TDD result"),
            Err(err) => tracing::warn!(error = %err, "failed to store TDD result"),
        }
    }

    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&result)?)?;
    } else {
        write!(writer, "{}", format_result(&result))?;
    }
    Ok(())
}

/// Reads pump history events from a JSON array.
pub fn load_events(path: &Path) -> Result<Vec<PumpEvent>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse pump history in {}", path.display()))
}

/// Reads and validates basal schedule entries from a JSON array.
pub fn load_schedule(path: &Path) -> Result<BasalSchedule> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let entries: Vec<BasalScheduleEntry> = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse basal schedule in {}", path.display()))?;
    BasalSchedule::new(entries).with_context(|| format!("invalid basal schedule in {}", path.display()))
}

/// Formats the human-readable result.
pub fn format_result(result: &TddResult) -> String {
    let total = result.total();
    let line = |label: &str, amount, with_share: bool| {
        let share = if with_share {
            format!("  ({}%)", format_fixed(percentage_of(amount, total), 2))
        } else {
            String::new()
        };
        format!("{label:<18}{:>8} U{share}\n", format_fixed(amount, 2))
    };

    let mut output = String::new();
    output.push_str(&line("Total daily dose", total, false));
    output.push_str(&line("  Bolus", result.bolus(), true));
    output.push_str(&line("  Temp basal", result.temp_basal(), true));
    output.push_str(&line("  Scheduled basal", result.scheduled_basal(), true));
    match result.weighted_average() {
        Some(average) => output.push_str(&line("Weighted average", average, false)),
        None => output.push_str("Weighted average     n/a\n"),
    }
    output.push_str(&format!(
        "Hours of data     {:>8.2}\n",
        result.hours_of_data()
    ));
    output
}
