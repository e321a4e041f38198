//! Background finalization of expired verification requests
//!
//! Requests nobody force-finalizes would otherwise sit open forever and keep
//! milestones stuck in Submitted. The sweeper resolves them on a fixed tick.

use std::sync::Arc;
use std::time::Duration;

use pledgeguard_escrow::Protocol;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::metrics::NodeMetrics;

/// Run one sweep and return how many requests it resolved
pub fn sweep_once(protocol: &Protocol, metrics: &NodeMetrics) -> usize {
    let resolved = protocol.sweep_expired();
    if !resolved.is_empty() {
        metrics.requests_resolved_total.inc_by(resolved.len() as u64);
        for request in &resolved {
            debug!(
                request_id = %request.id,
                campaign_id = %request.target.campaign_id,
                result = ?request.result,
                "Expired request finalized"
            );
        }
    }
    resolved.len()
}

/// Spawn the sweep loop; it exits once `shutdown` flips to true
pub fn spawn(
    protocol: Arc<Protocol>,
    metrics: Arc<NodeMetrics>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_ms = every.as_millis() as u64, "Deadline sweeper started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    sweep_once(&protocol, &metrics);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Deadline sweeper stopped");
    })
}
