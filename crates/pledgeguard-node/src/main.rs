//! PledgeGuard node binary

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use pledgeguard_common::{SystemClock, VERSION};
use pledgeguard_node::{build_protocol, router, sweeper, AppState, NodeConfig, NodeMetrics};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = NodeConfig::load()?;
    init_tracing(config.log_json);

    info!("Starting PledgeGuard node v{}", VERSION);
    info!(
        admins = config.escrow.admins.len(),
        trusted_attesters = config.trusted_attesters.len(),
        min_votes = config.oracle.min_votes_required,
        voting_period_ms = config.oracle.voting_period_ms,
        "Loaded configuration"
    );

    let protocol = Arc::new(build_protocol(&config, Arc::new(SystemClock::new()))?);
    let metrics = Arc::new(NodeMetrics::new()?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = sweeper::spawn(
        protocol.clone(),
        metrics.clone(),
        Duration::from_millis(config.sweep_interval_ms),
        shutdown_rx,
    );

    let app = router(AppState::new(protocol, metrics));
    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    sweeper.await?;

    info!("Shutting down PledgeGuard node");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(filter)
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
