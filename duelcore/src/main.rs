//! Duel coordination service daemon
//!
//! Wires the judge client, handle directory, session registry and
//! archival log together, starts the timeout sweep, and logs every
//! announcement the engine publishes. The presentation layer (a chat
//! frontend, typically) drives the same [`duelcore::DuelService`] this
//! binary constructs.
//!
//! ```bash
//! duelcore --sweep-interval-secs 5 --max-active 20
//! RUST_LOG=duelcore=debug duelcore
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use duelcore::{
    CodeforcesClient, DuelEventBus, DuelService, HandleDirectory, RecentDuelStore, ServiceConfig,
    SessionRegistry,
};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path of the archival log of finished duels
    #[arg(long)]
    recent_path: Option<std::path::PathBuf>,

    /// Path of the handle directory file
    #[arg(long)]
    handles_path: Option<std::path::PathBuf>,

    /// Ceiling on concurrently active duels
    #[arg(long)]
    max_active: Option<usize>,

    /// Timeout sweep interval in seconds
    #[arg(long)]
    sweep_interval_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = ServiceConfig::default();
    if let Some(path) = args.recent_path {
        config.recent_path = path;
    }
    if let Some(path) = args.handles_path {
        config.handles_path = path;
    }
    if let Some(max) = args.max_active {
        config.max_active_duels = max;
    }
    if let Some(secs) = args.sweep_interval_secs {
        config.sweep_interval = std::time::Duration::from_secs(secs);
    }

    let judge =
        Arc::new(CodeforcesClient::new(&config).context("building judge service client")?);
    let links = HandleDirectory::load(&config.handles_path).shared();
    let registry = SessionRegistry::new(config.max_active_duels).shared();
    let archive = RecentDuelStore::load(&config.recent_path, config.max_recent).shared();
    let events = DuelEventBus::new().shared();

    let service = DuelService::new(judge, links, registry, archive, events.clone());

    // Stand-in presentation subscriber: log every announcement.
    let mut announcements = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = announcements.recv().await {
            info!(
                event = event.event_type(),
                channel = event.channel(),
                "announcement"
            );
        }
    });

    let sweep = service.watcher(config.sweep_interval).spawn();
    info!(
        max_active = config.max_active_duels,
        sweep_secs = config.sweep_interval.as_secs(),
        "duel coordination service running"
    );

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutting down");
    sweep.abort();
    Ok(())
}
