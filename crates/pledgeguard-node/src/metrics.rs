//! Prometheus metrics for the node

use anyhow::Result;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Protocol counters exposed at `/metrics`
pub struct NodeMetrics {
    registry: Registry,
    /// Every API operation by outcome (`ok` or the error kind)
    pub operations_total: IntCounterVec,
    pub contributions_total: IntCounter,
    pub releases_total: IntCounter,
    pub refunds_total: IntCounter,
    pub votes_total: IntCounter,
    pub requests_resolved_total: IntCounter,
    pub campaigns: IntGauge,
    pub active_nodes: IntGauge,
}

impl NodeMetrics {
    pub fn new() -> Result<Self> {
        let metrics = Self {
            registry: Registry::new(),
            operations_total: IntCounterVec::new(
                Opts::new("pledgeguard_operations_total", "API operations by outcome"),
                &["operation", "outcome"],
            )?,
            contributions_total: IntCounter::new(
                "pledgeguard_contributions_total",
                "Contributions credited to escrow",
            )?,
            releases_total: IntCounter::new(
                "pledgeguard_milestone_releases_total",
                "Milestone releases",
            )?,
            refunds_total: IntCounter::new(
                "pledgeguard_refunds_total",
                "Campaign refunds executed",
            )?,
            votes_total: IntCounter::new("pledgeguard_oracle_votes_total", "Oracle votes recorded")?,
            requests_resolved_total: IntCounter::new(
                "pledgeguard_requests_resolved_total",
                "Verification requests resolved",
            )?,
            campaigns: IntGauge::new("pledgeguard_campaigns", "Campaigns in the ledger")?,
            active_nodes: IntGauge::new("pledgeguard_oracle_active_nodes", "Active oracle nodes")?,
        };
        metrics.register()?;
        Ok(metrics)
    }

    fn register(&self) -> Result<()> {
        self.registry.register(Box::new(self.operations_total.clone()))?;
        self.registry.register(Box::new(self.contributions_total.clone()))?;
        self.registry.register(Box::new(self.releases_total.clone()))?;
        self.registry.register(Box::new(self.refunds_total.clone()))?;
        self.registry.register(Box::new(self.votes_total.clone()))?;
        self.registry.register(Box::new(self.requests_resolved_total.clone()))?;
        self.registry.register(Box::new(self.campaigns.clone()))?;
        self.registry.register(Box::new(self.active_nodes.clone()))?;
        Ok(())
    }

    pub fn observe(&self, operation: &str, outcome: &str) {
        self.operations_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    /// Text exposition format
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_counters() {
        let metrics = NodeMetrics::new().unwrap();
        metrics.observe("contribute", "ok");
        metrics.observe("contribute", "validation");
        metrics.contributions_total.inc();

        let text = metrics.render().unwrap();
        assert!(text.contains("pledgeguard_contributions_total 1"));
        assert!(text.contains("outcome=\"validation\""));
    }
}
