//! Bell Alert - market opening-bell notifications for Discord.
//!
//! Runs the cron scheduler by default; `once`, `check` and `schedule` are
//! one-shot commands for operating and debugging a deployment.

use anyhow::{bail, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use bell_alert::market::{AlertKind, Market};
use bell_alert::pipeline::TickOutcome;
use bell_alert::AlertService;
use bell_common::config::Config;
use bell_common::logging::init_logging_with_exclusions;

/// Market opening-bell alerts for Discord.
#[derive(Parser, Debug)]
#[command(name = "bell-alert")]
#[command(version)]
#[command(about = "Trading-day aware market index alerts", long_about = None)]
struct Cli {
    /// Config file (default: ~/.bell/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the scheduler until interrupted (default)
    Run,

    /// Run a single alert tick now and exit
    Once {
        /// Market (SET, NASDAQ)
        #[arg(short, long)]
        market: Market,

        /// Alert kind (open, briefing)
        #[arg(short, long, default_value = "open")]
        kind: AlertKind,

        /// Send even if today is not a trading day
        #[arg(long)]
        force: bool,
    },

    /// Print whether a market trades today
    Check {
        /// Market (SET, NASDAQ)
        #[arg(short, long)]
        market: Market,
    },

    /// Print the next fire time of every trigger
    Schedule,
}

#[tokio::main]
async fn main() -> Result<()> {
    let startup_start = std::time::Instant::now();
    let cli = Cli::parse();

    let config = Config::load_with_env(cli.config.as_deref())?;

    init_logging_with_exclusions(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    tracing::info!("Bell Alert v{}", env!("CARGO_PKG_VERSION"));

    let service = AlertService::from_config(&config)?;

    let startup_duration = startup_start.elapsed();
    tracing::info!(
        duration_ms = startup_duration.as_millis() as u64,
        markets = service.settings().markets.len(),
        "Service initialized"
    );

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => service.run().await,

        Commands::Once { market, kind, force } => match service.run_once(market, kind, force).await? {
            TickOutcome::Skipped { date } => {
                println!("{market} is closed on {date}, nothing sent");
                Ok(())
            }
            TickOutcome::Delivered(report) => {
                println!(
                    "{market} {kind}: delivered to {}/{} destinations",
                    report.succeeded(),
                    report.outcomes.len()
                );
                for (destination, error) in report.failures() {
                    println!("  {destination}: {error}");
                }
                if report.all_succeeded() {
                    Ok(())
                } else {
                    bail!("{} deliveries failed", report.failed())
                }
            }
            TickOutcome::Failed { stage, error } => {
                bail!("{market} {kind} failed while {stage}: {error}")
            }
        },

        Commands::Check { market } => {
            let now = Utc::now();
            let open = service.check_trading_day(market, now).await?;
            let date = bell_alert::calendar::local_date(market, now);
            println!("{market} {date}: {}", if open { "trading day" } else { "closed" });
            Ok(())
        }

        Commands::Schedule => {
            let scheduler = service.scheduler()?;
            for upcoming in scheduler.upcoming(Utc::now()) {
                let local = upcoming.at.with_timezone(&upcoming.timezone);
                println!("{:<7} {:<16} {}", upcoming.market, upcoming.kind, local.format("%Y-%m-%d %H:%M %Z"));
            }
            Ok(())
        }
    }
}
