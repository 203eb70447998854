//! Configuration loading and management.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono_tz::Tz;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tdd_core::{PairingStrategy, TddConfig};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// Weight of the last two hours of stored totals in the weighted average.
    pub weight_percentage: Decimal,

    /// IANA time zone used for calendar days and the basal schedule.
    pub timezone: String,

    /// Smallest amount the pump can deliver, in units.
    pub basal_increment: Decimal,

    /// How suspend events are matched with resume events.
    pub pairing: PairingStrategy,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("tdd.db"),
            weight_percentage: Decimal::new(65, 2),
            timezone: iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string()),
            basal_increment: Decimal::new(5, 2),
            pairing: PairingStrategy::default(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (TDD_*)
        figment = figment.merge(Env::prefixed("TDD_"));

        figment.extract()
    }

    /// Parses the configured time zone.
    pub fn time_zone(&self) -> anyhow::Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|err| anyhow::anyhow!("invalid time zone {:?}: {err}", self.timezone))
    }

    /// Engine settings derived from this configuration.
    pub fn tdd_config(&self) -> anyhow::Result<TddConfig> {
        TddConfig::new(self.weight_percentage, self.time_zone()?, self.pairing)
            .context("invalid TDD configuration")
    }
}

/// Returns the platform-specific config directory for tdd.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tdd"))
}

/// Returns the platform-specific data directory for tdd.
///
/// On Linux: `~/.local/share/tdd`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("tdd"))
}
