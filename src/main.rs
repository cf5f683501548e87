mod config;
mod database;
mod entities;
mod logging;
mod plex_rs;
mod ports;
mod services;
#[cfg(test)]
mod test_utils;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use color_eyre::{Result, eyre::Context};
use tokio::time::MissedTickBehavior;

use crate::{
    config::Config,
    database::Database,
    logging::{init_tracing, shutdown_tracing},
    ports::plex::PlexCatalog,
    services::plex::client::PlexHttpAdapter,
    services::sync::{PlaylistOutcome, SyncReport, SyncService},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The config file to use
    #[arg(short, long, env = "PLEX_LIBRARY_SYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Tracing filter directive, e.g. `info` or `plex_library_sync=debug`
    #[arg(long, default_value = "info", global = true, env = "LOG_LEVEL")]
    log_level: String,

    /// OTLP/gRPC endpoint to export spans to
    #[arg(long, global = true, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconcile the local store with Plex once
    Sync,
    /// Reconcile the local store with Plex on an interval
    Watch {
        /// Time between runs, e.g. `15m`. Defaults to `sync.interval` from the config
        #[arg(short, long, value_parser = humantime::parse_duration)]
        interval: Option<Duration>,
    },
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Create a default config file, if it doesn't exist
    CreateDefault,
    /// Print the path to the config file
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let tracer_provider = init_tracing(
        "plex-library-sync",
        args.otlp_endpoint.as_deref(),
        &args.log_level,
    )?;

    let result = run(args).await;

    shutdown_tracing(tracer_provider);
    result
}

async fn run(args: Args) -> Result<()> {
    if let Commands::Config(config_commands) = &args.command {
        match config_commands {
            ConfigCommands::CreateDefault => {
                let path = Config::create_default()?;
                println!("{}", path.display());
            }
            ConfigCommands::Path => match Config::config_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("No default config path found"),
            },
        }
        return Ok(());
    }

    tracing::debug!("Loading configuration");
    let config = {
        if let Some(config) = &args.config {
            Config::from_file(config)
        } else {
            Config::load()
        }
    }
    .wrap_err("Failed to load plex-library-sync config")?;

    let database = Arc::new(Database::open(&config.database_path()).await?);

    let plex = config.plex_config()?;
    let catalog = PlexHttpAdapter::new(
        plex.server_url()?,
        plex.checked_token()?.to_string(),
        plex.request_timeout()?,
        plex.page_size,
    )?;
    let service = SyncService::new(database, catalog, config.fetch_timeout()?);

    match args.command {
        Commands::Sync => {
            let report = service.run().await.wrap_err("Reconciliation failed")?;
            print_report(&report);
        }
        Commands::Watch { interval } => {
            let interval = match interval {
                Some(interval) => interval,
                None => config.interval()?,
            };
            watch(&service, interval).await;
        }
        Commands::Config(_) => {}
    }

    Ok(())
}

/// Runs reconciliations back to back, one per tick, until interrupted.
///
/// A failed run is logged and retried on the next tick.
async fn watch<C: PlexCatalog>(service: &SyncService<C>, interval: Duration) {
    tracing::info!(
        "Reconciling every {}",
        humantime::format_duration(interval)
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping");
                return;
            }
        }

        let started = Instant::now();
        match service.run().await {
            Ok(report) => tracing::info!(
                committed = report.committed,
                "Refresh finished in {:?}",
                started.elapsed()
            ),
            Err(e) => tracing::error!("Refresh failed after {:?}: {}", started.elapsed(), e),
        }
    }
}

fn print_report(report: &SyncReport) {
    for (title, outcome) in &report.outcomes {
        println!("{:<10} {}", format!("{:?}", outcome).to_lowercase(), title);
    }
    println!(
        "playlists: {} created, {} updated, {} deleted, {} untouched, {} skipped",
        report.count(PlaylistOutcome::Created),
        report.count(PlaylistOutcome::Updated),
        report.count(PlaylistOutcome::Deleted),
        report.count(PlaylistOutcome::Untouched),
        report.count(PlaylistOutcome::Skipped),
    );
    println!(
        "items: {} associated, {} disassociated, {} skipped; entities: {} created, {} updated",
        report.items_associated,
        report.items_disassociated,
        report.items_skipped,
        report.entities_created,
        report.entities_updated,
    );
}
