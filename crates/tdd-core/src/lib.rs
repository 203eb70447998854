//! Total daily dose (TDD) accounting.
//!
//! This crate reconciles a window of insulin pump history against the basal
//! schedule to work out how much insulin was delivered:
//! - Classification: splitting pump events by kind and pairing suspends with resumes
//! - Timeline: resolving overlapping temp basals and suspensions
//! - Accumulation: bolus, temp basal and scheduled basal sums
//! - Averaging: blending stored totals and checking there are enough of them
//!
//! Storage is a collaborator behind [`TddHistory`]; the engine never writes.

mod accumulate;
mod average;
mod calculator;
mod classify;
mod config;
mod gaps;
pub mod numeric;
pub mod schedule;
pub mod stats;
mod timeline;
mod types;

pub use accumulate::{
    RateRounding, hours_of_data, sum_boluses, sum_scheduled_basal, sum_temp_basal,
};
pub use average::{
    HistoryError, SUFFICIENCY_WINDOW_DAYS, SUFFICIENT_TDD_ROWS, TddHistory, has_sufficient_tdd,
    is_sufficient, weighted_average, weighted_average_of,
};
pub use calculator::{TddCalculator, TddError, format_summary};
pub use classify::{
    Bolus, ClassifiedEvents, PairingStrategy, SuspendPair, TempBasal, classify,
    pair_suspend_resume,
};
pub use config::{ConfigError, TddConfig};
pub use gaps::{find_gaps, subtract_suspensions};
pub use schedule::{BasalSchedule, BasalScheduleEntry, ScheduleError};
pub use stats::{DailyTdd, average_daily, daily_totals};
pub use timeline::build_timeline;
pub use types::{
    Gap, HistoricalTotal, IntervalKind, PumpEvent, PumpEventKind, ResolvedInterval, TddResult,
};
