//! TDD calculation entry point.

use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use thiserror::Error;

use crate::accumulate::{
    RateRounding, hours_of_data, sum_boluses, sum_scheduled_basal, sum_temp_basal,
};
use crate::average::{self, HistoryError, TddHistory};
use crate::classify::{classify, pair_suspend_resume};
use crate::config::TddConfig;
use crate::gaps::{find_gaps, subtract_suspensions};
use crate::numeric::{HOURS_PRECISION, format_fixed, percentage_of, truncate_to_places};
use crate::schedule::BasalSchedule;
use crate::timeline::build_timeline;
use crate::types::{PumpEvent, TddResult};

/// Errors surfaced by a TDD calculation.
#[derive(Debug, Error)]
pub enum TddError {
    /// Stored totals could not be read, so no weighted average can be trusted.
    #[error(transparent)]
    History(#[from] HistoryError),
}

/// Reconciles pump history against the basal schedule.
#[derive(Debug, Clone, Default)]
pub struct TddCalculator {
    config: TddConfig,
}

impl TddCalculator {
    pub const fn new(config: TddConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &TddConfig {
        &self.config
    }

    /// Computes bolus, temp basal, scheduled basal and hours of data.
    ///
    /// Never fails: missing events or an empty schedule just produce zeros.
    /// The result carries no weighted average.
    pub fn reconcile<R>(
        &self,
        events: &[PumpEvent],
        schedule: &BasalSchedule,
        rounding: &R,
        now: DateTime<Utc>,
    ) -> TddResult
    where
        R: RateRounding + Sync + ?Sized,
    {
        let tz = self.config.timezone;
        tracing::debug!(events = events.len(), %now, %tz, "starting TDD calculation");
        if !schedule.is_empty() && !schedule.covers_full_day() {
            tracing::warn!("basal schedule does not start at midnight; early hours get no scheduled basal");
        }

        let classified = classify(events);
        let suspensions = pair_suspend_resume(
            &classified.suspends,
            &classified.resumes,
            self.config.pairing,
        );
        let timeline = build_timeline(&classified.temp_basals, &suspensions, now);
        let first_temp_basal = classified.temp_basals.iter().map(|t| t.timestamp).min();

        let ((hours, bolus), (scheduled_basal, temp_basal)) = rayon::join(
            || {
                rayon::join(
                    || hours_of_data(events, &timeline, now),
                    || sum_boluses(&classified.boluses),
                )
            },
            || {
                rayon::join(
                    || {
                        let gaps = find_gaps(&timeline, first_temp_basal, now, tz);
                        let gaps = subtract_suspensions(&gaps, &timeline);
                        sum_scheduled_basal(&gaps, schedule, rounding, now, tz)
                    },
                    || sum_temp_basal(&timeline, rounding),
                )
            },
        );

        TddResult::new(bolus, temp_basal, scheduled_basal, None, hours)
    }

    /// Full calculation: [`reconcile`](Self::reconcile) plus the weighted
    /// average of stored totals.
    ///
    /// A failed history read fails the whole calculation.
    pub async fn calculate<R, H>(
        &self,
        events: &[PumpEvent],
        schedule: &BasalSchedule,
        rounding: &R,
        history: &H,
        now: DateTime<Utc>,
    ) -> Result<TddResult, TddError>
    where
        R: RateRounding + Sync + ?Sized,
        H: TddHistory,
    {
        let weighted =
            average::weighted_average(history, now, self.config.weight_percentage()).await?;
        let result = self
            .reconcile(events, schedule, rounding, now)
            .with_weighted_average(weighted);

        tracing::info!("{}", format_summary(&result, events));
        Ok(result)
    }

    /// Whether enough stored totals exist to trust the weighted average.
    pub async fn has_sufficient_tdd<H>(&self, history: &H, now: DateTime<Utc>) -> Result<bool, TddError>
    where
        H: TddHistory,
    {
        Ok(average::has_sufficient_tdd(history, now).await?)
    }
}

/// Human-readable breakdown of a result, as logged after each calculation.
pub fn format_summary(result: &TddResult, events: &[PumpEvent]) -> String {
    let total = result.total();
    let row = |label: &str, amount: Decimal, share: Option<Decimal>| {
        format!(
            "| {label:<17} | {:>9} | {:>9} |\n",
            format_fixed(amount, 2),
            share.map(|p| format_fixed(p, 2)).unwrap_or_default(),
        )
    };
    let rule = "+-------------------+-----------+-----------+\n";

    let hours = Decimal::from_f64(result.hours_of_data())
        .map(|h| truncate_to_places(h, HOURS_PRECISION))
        .unwrap_or_default();

    let mut out = String::from("TDD summary:\n");
    out.push_str(rule);
    out.push_str("| Type              |  Amount U | Percent % |\n");
    out.push_str(rule);
    out.push_str(&row("Total", total, None));
    out.push_str(&row(
        "Bolus",
        result.bolus(),
        Some(percentage_of(result.bolus(), total)),
    ));
    out.push_str(&row(
        "Temp Basal",
        result.temp_basal(),
        Some(percentage_of(result.temp_basal(), total)),
    ));
    out.push_str(&row(
        "Scheduled Basal",
        result.scheduled_basal(),
        Some(percentage_of(result.scheduled_basal(), total)),
    ));
    out.push_str(&row(
        "Weighted Average",
        result.weighted_average().unwrap_or_default(),
        None,
    ));
    out.push_str(rule);
    let _ = writeln!(out, "- Hours of data: {}", format_fixed(hours, HOURS_PRECISION));
    let _ = writeln!(
        out,
        "- Earliest event: {}",
        describe(events.iter().min_by_key(|e| e.timestamp))
    );
    let _ = write!(
        out,
        "- Latest event: {}",
        describe(events.iter().max_by_key(|e| e.timestamp))
    );
    out
}

fn describe(event: Option<&PumpEvent>) -> String {
    event.map_or_else(
        || "no events".to_string(),
        |event| {
            format!(
                "{} at {}",
                event.kind,
                event.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
            )
        },
    )
}
