use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tdd_cli::commands::calculate::CalculateArgs;
use tdd_cli::commands::util::resolve_now;
use tdd_cli::commands::{calculate, daily, sufficiency};
use tdd_cli::{Cli, Commands, Config};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(tdd_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = tdd_db::Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so stdout stays parseable with --json
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let mut stdout = std::io::stdout().lock();

    match &cli.command {
        Some(Commands::Calculate {
            history,
            schedule,
            store,
            json,
            now,
        }) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            let args = CalculateArgs {
                history,
                schedule,
                store: *store,
                json: *json,
                now: resolve_now(now.as_deref())?,
            };
            calculate::run(&mut stdout, &db, &config, &args)?;
        }
        Some(Commands::Sufficiency { now }) => {
            let (db, _) = open_database(cli.config.as_deref())?;
            sufficiency::run(&mut stdout, &db, resolve_now(now.as_deref())?)?;
        }
        Some(Commands::Daily { days, json, now }) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            daily::run(
                &mut stdout,
                &db,
                config.time_zone()?,
                *days,
                *json,
                resolve_now(now.as_deref())?,
            )?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
