use anyhow::{Context, Result};
use rinc_job::config::Config;
use rinc_job::{logging, Job};
use rinc_storage::{DocumentStore, SqliteDocumentStore};
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/rinc.toml".to_string());
    let config = Config::load(&config_path)?;
    logging::init(&config.log)?;

    tracing::info!(
        config = %config_path,
        storage = %config.storage.path,
        interval_secs = config.job.interval_secs,
        "rinc starting"
    );

    let store: Arc<dyn DocumentStore> = Arc::new(
        SqliteDocumentStore::open(Path::new(&config.storage.path))
            .context("opening document store")?,
    );
    let mut job = Job::from_config(&config, store).await?;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutting down gracefully");
                shutdown.cancel();
            }
        });
    }

    let timeout = config.job.run_timeout();
    if config.job.interval_secs == 0 {
        job.run(timeout, &shutdown).await?;
        return Ok(());
    }

    let mut tick = interval(Duration::from_secs(config.job.interval_secs));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tick.tick() => {}
        }
        if let Err(e) = job.run(timeout, &shutdown).await {
            tracing::error!(error = %e, "report run failed");
        }
    }
    Ok(())
}
