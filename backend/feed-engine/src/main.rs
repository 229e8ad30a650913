use anyhow::Context;
use feed_engine::jobs::start_subscription_sync;
use feed_engine::store::memory::{MemorySnapshot, MemoryStores};
use feed_engine::{Config, FeedEngine};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    // Load config
    let config = Config::from_env().context("failed to load config")?;

    info!(
        service = %config.service.service_name,
        sync_enabled = config.subscription.sync_enabled,
        sync_interval_secs = config.subscription.sync_interval_secs,
        "Starting feed engine"
    );

    // Seed the in-memory stores
    let stores = match &config.service.fixture_path {
        Some(path) => {
            let snapshot = MemorySnapshot::load(path)?;
            info!(
                path = %path.display(),
                items = snapshot.items.len(),
                behaviors = snapshot.behaviors.len(),
                subscriptions = snapshot.subscriptions.len(),
                pins = snapshot.pins.len(),
                "Loaded fixture snapshot"
            );
            snapshot.into_stores().await?
        }
        None => {
            info!("No fixture configured, starting with empty stores");
            MemoryStores::new()
        }
    };

    let engine = FeedEngine::new(&config, stores.engine_stores());

    let sync_job = start_subscription_sync(engine.sync_engine(), &config.subscription);

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received");
    sync_job.abort();

    Ok(())
}
