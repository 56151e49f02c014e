//! # Check Scheduler Binary
//!
//! Composition root: connects to Redis, restores the persisted schedule table,
//! publishes a `CheckDueV1` message for every due tick and periodically
//! reconciles live jobs with the schedule table written by the monitor CRUD
//! layer. Stops gracefully on Ctrl-C.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use check_scheduler::{DueCheckPublisher, Scheduler, SchedulerConfig};
use durable_store::{DurableStore, RedisStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with environment filter
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("check_scheduler=info".parse()?),
        )
        .init();

    info!("Starting check scheduler");

    let config = SchedulerConfig::from_env().context("Failed to load scheduler configuration")?;
    config.validate().context("Invalid scheduler configuration")?;

    let store: Arc<dyn DurableStore> = Arc::new(
        RedisStore::connect(&config.redis_url, config.redis_pool_size)
            .await
            .context("Failed to connect to Redis")?,
    );
    let callback = Arc::new(DueCheckPublisher::new(store.clone(), config.due_channel.clone()));
    let reconcile_interval = config.reconcile_interval();

    let scheduler = Arc::new(
        Scheduler::new(config, store, callback).context("Failed to create scheduler")?,
    );
    let restored = scheduler.start().await.context("Failed to start scheduler")?;
    info!(restored, "Scheduler ready");

    let reconciler = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(reconcile_interval);
            // The first tick completes immediately; start() already restored.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = scheduler.reconcile().await {
                    warn!("Schedule reconcile failed: {}", e);
                }
            }
        })
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    reconciler.abort();
    let abandoned = scheduler.stop().await;
    info!(abandoned, "Check scheduler shutdown complete");
    Ok(())
}
