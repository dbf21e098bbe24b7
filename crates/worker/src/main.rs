mod observability;
mod runner;

use std::time::Duration;

use forum_infra::{config::AppConfig, logging::init_tracing, services::InteractionServices};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};

use crate::runner::ReconcileRunner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    init_tracing(&config, "forum-worker")?;
    observability::init_metrics(config.metrics_port)?;

    let services = InteractionServices::from_config(&config).await?;
    let runner = ReconcileRunner::new(services);
    if !config.uses_surreal() {
        warn!(
            data_backend = %config.data_backend,
            "memory backend: the worker only reconciles its own process-local stores"
        );
    }

    let period = Duration::from_millis(config.reconcile_interval_ms.max(1_000));
    info!(
        interval_ms = period.as_millis() as u64,
        metrics_port = config.metrics_port,
        swept = ?runner.swept_metrics(),
        "worker starting"
    );

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                runner.tick().await;
            }
        }
    }

    info!("worker shutdown");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
