//! placemeter - operator CLI for the quota store
//!
//! Read-only views over the durable aggregate and request log: current
//! status, monthly history, and the audit log. The web layer that performs
//! reservations and commits runs elsewhere; this tool never mutates state.

mod cli;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use placemeter_core::{BudgetConfig, LogFilter, Outcome, UsageTracker};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "placemeter",
    version,
    about = "Monthly API budget inspection",
    long_about = "Inspect the placemeter quota store: current month usage versus \
                  configured limits, frozen monthly history, and the request audit log.\n\
                  \n\
                  Examples:\n\
                    placemeter status                # Current usage and status tier\n\
                    placemeter status --json         # Machine-readable snapshot\n\
                    placemeter history 6             # Last 6 completed months\n\
                    placemeter log -n 50             # Last attempts, oldest first\n\
                    placemeter log --outcome denied  # Only blocked attempts\n\
                  \n\
                  Environment Variables:\n\
                    PLACEMETER_CONFIG                # Path to budget config JSON\n\
                    PLACEMETER_DB                    # Override storage location"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to budget config JSON (defaults apply if absent)
    #[arg(long, env = "PLACEMETER_CONFIG")]
    config: Option<PathBuf>,

    /// Override the storage location from the config
    #[arg(long, env = "PLACEMETER_DB")]
    db: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Show current month usage versus limits
    Status,
    /// Show completed months, most recent first
    History {
        /// Number of months
        #[arg(default_value = "12")]
        months: usize,
    },
    /// Show the request audit log in insertion order
    Log {
        /// Filter by endpoint
        #[arg(long)]
        endpoint: Option<String>,
        /// Filter by operation tag
        #[arg(long)]
        tag: Option<String>,
        /// Filter by outcome: allowed-success, allowed-failure, denied
        #[arg(long)]
        outcome: Option<String>,
        /// Max entries
        #[arg(long, short = 'n', default_value = "100")]
        limit: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();

    let mut config = match &args.config {
        Some(path) => BudgetConfig::from_file(path)
            .with_context(|| format!("failed to load config: {}", path.display()))?,
        None => BudgetConfig::default(),
    };
    if let Some(db) = args.db {
        config.storage_location = Some(db);
    }

    let tracker = UsageTracker::open(config.clone()).context("failed to open quota store")?;

    match args.command {
        Command::Status => {
            let snapshot = tracker.snapshot()?;
            println!("{}", cli::format_snapshot(&snapshot, &config, args.json));
            if !args.json {
                if let Some(alert) = tracker.alert_message()? {
                    println!("{}", alert);
                }
            }
        }
        Command::History { months } => {
            let history = tracker.history(months)?;
            println!("{}", cli::format_history(&history, args.json));
        }
        Command::Log {
            endpoint,
            tag,
            outcome,
            limit,
        } => {
            let outcome = match outcome {
                Some(s) => Some(
                    Outcome::parse(&s)
                        .with_context(|| format!("unknown outcome filter: {}", s))?,
                ),
                None => None,
            };
            let filter = LogFilter {
                endpoint,
                operation_tag: tag,
                outcome,
                limit: Some(limit),
            };
            let entries: Vec<_> = tracker.log(&filter)?.collect();
            println!("{}", cli::format_log(&entries, args.json));
        }
    }

    Ok(())
}
