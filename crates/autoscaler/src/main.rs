//! Marathon autoscaler service
//!
//! Long-lived control loop that watches label-annotated Marathon apps,
//! samples their per-task usage from the Mesos agents and adjusts instance
//! counts within declared bounds. No CLI surface; configuration comes from
//! the environment and the process runs until terminated.

use anyhow::Result;
use autoscaler_lib::{
    cluster::{ClusterConfig, HttpCluster},
    reconciler::{Reconciler, ReconcilerConfig},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting marathon autoscaler");

    let settings = config::AutoscalerConfig::load()?;
    info!(marathon_url = %settings.marathon_url, "Autoscaler configured");

    let cluster = HttpCluster::new(ClusterConfig {
        marathon_url: settings.marathon_url.clone(),
        agent_port: settings.agent_port,
        request_timeout: Duration::from_secs(settings.request_timeout_secs),
    })?;

    let reconciler = Reconciler::new(
        Arc::new(cluster),
        ReconcilerConfig {
            tick_interval: Duration::from_secs(settings.tick_interval_secs),
            sample_gap: Duration::from_secs(settings.sample_gap_secs),
        },
    );

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let loop_handle = tokio::spawn(reconciler.run(shutdown_rx));

    // Run until externally terminated
    tokio::signal::ctrl_c().await?;
    info!("SIGINT received, shutting down");
    let _ = shutdown_tx.send(());
    let _ = loop_handle.await;

    Ok(())
}
