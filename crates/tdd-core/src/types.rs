//! Core data model for dose reconciliation.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single entry from the pump's history.
///
/// The fetch collaborator supplies these newest-first; nothing in the engine
/// depends on that ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PumpEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: PumpEventKind,
}

/// What happened at a pump event, with the payload each kind requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PumpEventKind {
    /// A bolus of `amount` units.
    Bolus { amount: Decimal },
    /// A temporary override of the scheduled basal rate, in U/hr.
    TempBasal { rate: Decimal, duration_minutes: u32 },
    /// Delivery halted.
    #[serde(rename = "pump_suspend")]
    Suspend,
    /// Delivery restarted.
    #[serde(rename = "pump_resume")]
    Resume,
}

impl PumpEvent {
    pub const fn bolus(timestamp: DateTime<Utc>, amount: Decimal) -> Self {
        Self {
            timestamp,
            kind: PumpEventKind::Bolus { amount },
        }
    }

    pub const fn temp_basal(timestamp: DateTime<Utc>, rate: Decimal, duration_minutes: u32) -> Self {
        Self {
            timestamp,
            kind: PumpEventKind::TempBasal {
                rate,
                duration_minutes,
            },
        }
    }

    pub const fn suspend(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            kind: PumpEventKind::Suspend,
        }
    }

    pub const fn resume(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            kind: PumpEventKind::Resume,
        }
    }

}

impl PumpEventKind {
    /// The `type` tag this kind carries in pump history JSON.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bolus { .. } => "bolus",
            Self::TempBasal { .. } => "temp_basal",
            Self::Suspend => "pump_suspend",
            Self::Resume => "pump_resume",
        }
    }
}

impl fmt::Display for PumpEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What was going on during a resolved interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntervalKind {
    /// A temp basal was delivering at `rate` U/hr.
    TempBasalActive { rate: Decimal },
    /// The pump was suspended; nothing was delivered.
    Suspended,
}

/// A non-overlapping slice of the basal timeline after conflict resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: IntervalKind,
}

impl ResolvedInterval {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// The delivery rate, if this interval was a temp basal.
    pub const fn rate(&self) -> Option<Decimal> {
        match self.kind {
            IntervalKind::TempBasalActive { rate } => Some(rate),
            IntervalKind::Suspended => None,
        }
    }

    pub const fn is_temp_basal(&self) -> bool {
        matches!(self.kind, IntervalKind::TempBasalActive { .. })
    }

    pub const fn is_suspended(&self) -> bool {
        matches!(self.kind, IntervalKind::Suspended)
    }
}

/// A time range in which scheduled basal is inferred to have run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Gap {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Gap {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// A previously persisted TDD total, as read back from storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalTotal {
    pub date: DateTime<Utc>,
    pub total: Decimal,
}

/// Result of a TDD calculation.
///
/// `total` is always the sum of the three components; there is no way to
/// construct a result where it is not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TddResult {
    total: Decimal,
    bolus: Decimal,
    temp_basal: Decimal,
    scheduled_basal: Decimal,
    weighted_average: Option<Decimal>,
    hours_of_data: f64,
}

impl TddResult {
    /// Builds a result from its components.
    pub fn new(
        bolus: Decimal,
        temp_basal: Decimal,
        scheduled_basal: Decimal,
        weighted_average: Option<Decimal>,
        hours_of_data: f64,
    ) -> Self {
        Self {
            total: bolus + temp_basal + scheduled_basal,
            bolus,
            temp_basal,
            scheduled_basal,
            weighted_average,
            hours_of_data,
        }
    }

    /// A result with every component at zero and no weighted average.
    pub fn zero() -> Self {
        Self::new(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO, None, 0.0)
    }

    /// Returns this result with the weighted average attached.
    #[must_use]
    pub fn with_weighted_average(self, weighted_average: Decimal) -> Self {
        Self {
            weighted_average: Some(weighted_average),
            ..self
        }
    }

    pub const fn total(&self) -> Decimal {
        self.total
    }

    pub const fn bolus(&self) -> Decimal {
        self.bolus
    }

    pub const fn temp_basal(&self) -> Decimal {
        self.temp_basal
    }

    pub const fn scheduled_basal(&self) -> Decimal {
        self.scheduled_basal
    }

    pub const fn weighted_average(&self) -> Option<Decimal> {
        self.weighted_average
    }

    pub const fn hours_of_data(&self) -> f64 {
        self.hours_of_data
    }
}
