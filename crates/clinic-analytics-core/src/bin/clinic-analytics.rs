use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use clinic_analytics_core::{CacheReadout, ClinicAnalytics, Settings};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "clinic-analytics")]
#[command(about = "Patient directory and retention KPIs from practitioner calendars")]
struct Cli {
    /// Settings file (JSON); CLINIC_* environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recompute analytics from the calendars and replace the cache
    Refresh,
    /// Print the cached snapshot as JSON
    Show {
        /// Only print the KPI snapshot
        #[arg(long)]
        kpis_only: bool,
    },
    /// Recompute analytics and print them as JSON without touching the cache
    Compute,
}

/// Entry point for the clinic analytics CLI
///
/// # Environment Variables
/// - `CLINIC_DATABASE_PATH`: document store location
/// - `CLINIC_ACCESS_TOKEN`: bearer token for remote calendars
/// - `RUST_LOG`: log filter (default directive `clinic_analytics=info`)
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("clinic_analytics=info".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref()).context("loading settings")?;
    let service = ClinicAnalytics::from_settings(settings).context("opening analytics service")?;

    match cli.command {
        Commands::Refresh => {
            let outcome = service.refresh_cache(service.now()).await;
            for failure in &outcome.analytics.failures {
                eprintln!("warning: {} unavailable: {}", failure.practitioner, failure.reason);
            }
            if !outcome.success {
                anyhow::bail!(outcome.message);
            }
            println!("{}", outcome.message);
        }
        Commands::Show { kpis_only } => {
            let readout = service.read_cache();
            if let CacheReadout::Cached(cached) = &readout {
                if !cached.consistent {
                    eprintln!("warning: cache was read mid-refresh; run `show` again");
                }
            }
            let json = if kpis_only {
                serde_json::to_string_pretty(readout.kpis())?
            } else {
                serde_json::to_string_pretty(&readout)?
            };
            println!("{}", json);
        }
        Commands::Compute => {
            let report = service.compute_analytics(service.now()).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
