use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use pulsewatch::{
    actors::{alert::AlertHandle, monitor::MonitorHandle},
    config::{Config, StorageConfig, read_config_file},
    storage::{MemoryBackend, StorageBackend, seed_views},
};
use tokio::sync::broadcast;
use tracing::{error, info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

/// Capacity of the view alert broadcast channel
const ALERT_CHANNEL_SIZE: usize = 256;

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short, long, env = "PULSEWATCH_CONFIG")]
    file: Option<String>,

    /// Log level for the hub and library
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

fn init(level: LevelFilter) {
    let filter = filter::Targets::new().with_targets(vec![
        ("pulsewatch", level),
        ("pulsewatch_hub", level),
        ("tower_http", LevelFilter::DEBUG.min(level)),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

async fn build_backend(config: &StorageConfig) -> anyhow::Result<Arc<dyn StorageBackend>> {
    match config {
        StorageConfig::None => {
            warn!("using in-memory storage, state is lost on restart");
            Ok(Arc::new(MemoryBackend::new()))
        }

        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite { path } => {
            let backend = pulsewatch::storage::sqlite::SqliteBackend::new(path)
                .await
                .with_context(|| format!("could not open database '{}'", path.display()))?;
            Ok(Arc::new(backend))
        }

        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => {
            anyhow::bail!("sqlite storage requested but the 'storage-sqlite' feature is disabled")
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init(args.log_level);
    trace!("started with args: {args:?}");

    let config = match &args.file {
        Some(path) => read_config_file(path)?,
        None => {
            info!("no config file given, using defaults");
            Config::default()
        }
    };
    config.validate()?;

    let backend = build_backend(&config.storage).await?;
    let seeded = seed_views(backend.as_ref(), &config.views)
        .await
        .context("could not seed configured views")?;
    info!("{} configured views, {} written", config.views.len(), seeded);

    let (alert_tx, alert_rx) = broadcast::channel(ALERT_CHANNEL_SIZE);
    let alerts = AlertHandle::spawn(config.views.clone(), alert_rx);
    let monitor = MonitorHandle::spawn(backend.clone(), alert_tx, config.monitor.beat_history);

    #[cfg(feature = "api")]
    {
        let state =
            pulsewatch::api::ApiState::new(monitor.clone(), alerts.clone(), backend.clone());
        let addr = pulsewatch::api::spawn_api_server(config.api.clone(), state).await?;
        info!("accepting beats on http://{addr}/api/v1/services/<name>");
    }

    tokio::signal::ctrl_c()
        .await
        .context("could not listen for shutdown signal")?;
    info!("shutting down");

    monitor.shutdown().await;
    alerts.shutdown().await;

    if let Err(e) = backend.close().await {
        error!("failed to close storage backend: {}", e);
    }

    Ok(())
}
