//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Total daily dose calculator.
///
/// Reconciles insulin pump history against the basal schedule to work out
/// how much insulin was delivered, and keeps a history of past results.
#[derive(Debug, Parser)]
#[command(name = "tdd", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Calculate the total daily dose from pump history.
    Calculate {
        /// JSON file with the pump history events.
        #[arg(long)]
        history: PathBuf,

        /// JSON file with the basal schedule entries.
        #[arg(long)]
        schedule: PathBuf,

        /// Store the result in the database.
        #[arg(long)]
        store: bool,

        /// Output as JSON.
        #[arg(long)]
        json: bool,

        /// Calculation time (ISO 8601 or relative like "2 hours ago"). Defaults to now.
        #[arg(long)]
        now: Option<String>,
    },

    /// Check whether enough TDD results are stored to trust the weighted average.
    Sufficiency {
        /// Reference time (ISO 8601 or relative). Defaults to now.
        #[arg(long)]
        now: Option<String>,
    },

    /// Show the stored TDD for each recent day.
    Daily {
        /// Number of days to show, including today.
        #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(u32).range(1..))]
        days: u32,

        /// Output as JSON.
        #[arg(long)]
        json: bool,

        /// Reference time (ISO 8601 or relative). Defaults to now.
        #[arg(long)]
        now: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_calculate_flags() {
        let cli = Cli::try_parse_from([
            "tdd",
            "--verbose",
            "calculate",
            "--history",
            "history.json",
            "--schedule",
            "schedule.json",
            "--store",
            "--now",
            "2025-01-16T00:00:00Z",
        ])
        .expect("should parse");

        assert!(cli.verbose);
        let Some(Commands::Calculate {
            history,
            store,
            json,
            now,
            ..
        }) = cli.command
        else {
            panic!("expected calculate command");
        };
        assert_eq!(history, PathBuf::from("history.json"));
        assert!(store);
        assert!(!json);
        assert_eq!(now.as_deref(), Some("2025-01-16T00:00:00Z"));
    }

    #[test]
    fn daily_rejects_zero_days() {
        assert!(Cli::try_parse_from(["tdd", "daily", "--days", "0"]).is_err());

        let cli = Cli::try_parse_from(["tdd", "daily"]).expect("should parse");
        assert!(matches!(cli.command, Some(Commands::Daily { days: 7, .. })));
    }
}
