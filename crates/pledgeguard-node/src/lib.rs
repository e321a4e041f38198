//! # PledgeGuard Node
//!
//! Hosts one [`Protocol`] instance behind an HTTP API.
//!
//! - [`api`]: JSON routes for campaigns, private pledges, oracle nodes, and admin
//! - [`sweeper`]: background finalization of expired verification requests
//! - [`metrics`]: Prometheus counters served at `/metrics`
//! - [`config`]: file and environment configuration

pub mod api;
pub mod config;
pub mod metrics;
pub mod sweeper;

use std::sync::Arc;

use pledgeguard_common::Clock;
use pledgeguard_escrow::Protocol;

pub use api::{router, AppState};
pub use config::NodeConfig;
pub use metrics::NodeMetrics;

/// Build the protocol described by `config`
pub fn build_protocol(config: &NodeConfig, clock: Arc<dyn Clock>) -> anyhow::Result<Protocol> {
    let verifier = Arc::new(config.verifier()?);
    let protocol = Protocol::new(
        config.escrow.clone(),
        config.oracle.clone(),
        verifier,
        clock,
    )?;
    Ok(protocol)
}
