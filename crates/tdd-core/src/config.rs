//! Engine configuration.

use chrono_tz::Tz;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::classify::PairingStrategy;

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The recent-vs-historical weight is outside \[0, 1\].
    #[error("weight percentage must be between 0 and 1, got {value}")]
    WeightOutOfRange { value: Decimal },
}

/// Configuration for a TDD calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TddConfig {
    /// Weight given to the last two hours of stored totals when averaging.
    /// Default: 0.65.
    weight_percentage: Decimal,

    /// Zone used for calendar days and schedule time-of-day. Default: UTC.
    pub timezone: Tz,

    /// How suspends are matched with resumes. Default: positional.
    pub pairing: PairingStrategy,
}

impl Default for TddConfig {
    fn default() -> Self {
        Self {
            weight_percentage: Decimal::new(65, 2), // 0.65
            timezone: Tz::UTC,
            pairing: PairingStrategy::Positional,
        }
    }
}

impl TddConfig {
    pub fn new(
        weight_percentage: Decimal,
        timezone: Tz,
        pairing: PairingStrategy,
    ) -> Result<Self, ConfigError> {
        if weight_percentage < Decimal::ZERO || weight_percentage > Decimal::ONE {
            return Err(ConfigError::WeightOutOfRange {
                value: weight_percentage,
            });
        }
        Ok(Self {
            weight_percentage,
            timezone,
            pairing,
        })
    }

    pub const fn weight_percentage(&self) -> Decimal {
        self.weight_percentage
    }
}
