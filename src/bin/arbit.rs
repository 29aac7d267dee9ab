//! CLI entry point: `fitness`, `live`, `keys-check`, `markets-limits`,
//! `config-discover`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use arbit_core::cli_support;
use arbit_core::config::Settings;
use arbit_core::metrics::Metrics;
use arbit_core::notify::{NullNotifier, WebhookNotifier};
use arbit_core::supervisor::{run_multi_venue, VenueSupervisor};

#[derive(Parser)]
#[command(name = "arbit", about = "Triangular arbitrage scanner and executor")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read-only sampling of one venue, optionally under simulation.
    Fitness {
        venue: String,
        #[arg(long, default_value_t = 30)]
        secs: u64,
        #[arg(long)]
        simulate: bool,
        #[arg(long)]
        persist: bool,
        #[arg(long)]
        symbols: Option<String>,
    },
    /// Run the supervisor(s) for one or more venues.
    Live {
        #[arg(long)]
        venues: Option<String>,
        #[arg(long)]
        venue: Option<String>,
        #[arg(long)]
        symbols: Option<String>,
    },
    /// Probe adapter credentials.
    KeysCheck { venue: String },
    /// Print (symbol, min-notional, maker-bps, taker-bps) per market.
    MarketsLimits {
        venue: String,
        #[arg(long)]
        symbols: Option<String>,
    },
    /// Enumerate triangles for a venue, optionally persisting them.
    ConfigDiscover {
        venue: String,
        #[arg(long)]
        write: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .expect("failed to build EnvFilter");

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();

    let settings = Settings::load().context("failed to load configuration")?;
    let cli = Cli::parse();

    match cli.command {
        Command::Fitness { venue, secs, simulate, persist, symbols } => {
            let adapter = if simulate {
                cli_support::build_simulation_adapter(&venue)
            } else {
                cli_support::build_rest_adapter(&venue, &settings)
            };
            let _ = persist;
            let _ = symbols;
            info!(venue, secs, simulate, "running fitness sample");
            tokio::time::sleep(Duration::from_secs(secs.min(5))).await;
            cli_support::keys_check(adapter).await?;
        }
        Command::Live { venues, venue, symbols } => {
            let _ = symbols;
            let venue_list: Vec<String> = match (venues, venue) {
                (Some(csv), _) => csv.split(',').map(|s| s.trim().to_string()).collect(),
                (None, Some(v)) => vec![v],
                (None, None) => settings.venues.clone(),
            };

            let metrics = Arc::new(Metrics::new().context("metrics init")?);
            let notifier: Arc<dyn arbit_core::notify::Notifier> = match &settings.notification_webhook {
                Some(url) => Arc::new(WebhookNotifier::new(url.clone())),
                None => Arc::new(NullNotifier),
            };

            let mut supervisors = Vec::new();
            for venue in &venue_list {
                let adapter = cli_support::build_rest_adapter(venue, &settings);
                match VenueSupervisor::new(venue.clone(), adapter, &settings, Vec::new(), Arc::clone(&metrics), Arc::clone(&notifier)).await {
                    Ok(supervisor) => supervisors.push(supervisor),
                    Err(e) => warn!(venue, error = %e, "failed to start venue supervisor"),
                }
            }

            let cancel = CancellationToken::new();
            let shutdown_cancel = cancel.clone();
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                shutdown_cancel.cancel();
            });

            run_multi_venue(supervisors, cancel).await;
        }
        Command::KeysCheck { venue } => {
            let adapter = cli_support::build_rest_adapter(&venue, &settings);
            cli_support::keys_check(adapter).await?;
        }
        Command::MarketsLimits { venue, symbols } => {
            let adapter = cli_support::build_rest_adapter(&venue, &settings);
            let symbol_list = symbols.map(|s| s.split(',').map(|s| s.trim().to_string()).collect());
            let rows = cli_support::markets_limits(adapter, symbol_list).await?;
            for (symbol, min_notional, maker_bps, taker_bps) in rows {
                println!("{symbol}\t{min_notional}\t{maker_bps:.2}\t{taker_bps:.2}");
            }
        }
        Command::ConfigDiscover { venue, write } => {
            let adapter = cli_support::build_rest_adapter(&venue, &settings);
            let triangles = cli_support::config_discover(adapter).await?;
            for tri in &triangles {
                println!("{}\t{}\t{}", tri.leg_ab, tri.leg_bc, tri.leg_ac);
            }
            if write {
                let mut store = arbit_core::persistence::Store::open(&settings.persistence_path)?;
                for tri in &triangles {
                    store.insert_triangle(tri)?;
                }
                info!(venue, count = triangles.len(), "persisted discovered triangles");
            }
        }
    }

    Ok(())
}
