//! Stake registry - oracle node registration, stake, and reputation
//!
//! The registry is the only place node records are mutated. Reputation
//! updates for one resolution are applied under a single write lock so a
//! concurrent reader never sees half of a settlement.

use std::collections::HashMap;

use parking_lot::RwLock;
use pledgeguard_common::{
    NodeId, NotFoundError, OracleNode, ResourceError, Result, StateError, ValidationError,
    MAX_REPUTATION,
};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::params::OracleParams;

/// Outcome of one node's vote at settlement time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub node_id: NodeId,
    pub matched: bool,
}

/// identity -> OracleNode
#[derive(Default)]
pub struct StakeRegistry {
    nodes: RwLock<HashMap<NodeId, OracleNode>>,
}

impl StakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node, or reactivate an inactive one with fresh stake
    pub fn register(
        &self,
        node_id: &str,
        endpoint: &str,
        stake: Decimal,
        params: &OracleParams,
        now: i64,
    ) -> Result<OracleNode> {
        if stake < params.minimum_stake {
            return Err(ResourceError::InsufficientStake {
                required: params.minimum_stake,
                available: stake,
            }
            .into());
        }

        let mut nodes = self.nodes.write();
        if let Some(existing) = nodes.get_mut(node_id) {
            if existing.active {
                return Err(StateError::NodeAlreadyRegistered {
                    node: node_id.to_string(),
                }
                .into());
            }
            let total = existing
                .stake
                .checked_add(stake)
                .ok_or(ResourceError::AmountOverflow { field: "stake" })?;
            existing.active = true;
            existing.stake = total;
            existing.endpoint = endpoint.to_string();
            existing.deactivated_at = None;
            info!(node = %node_id, stake = %existing.stake, "Oracle node reactivated");
            return Ok(existing.clone());
        }

        let node = OracleNode::new(
            node_id.to_string(),
            endpoint.to_string(),
            stake,
            params.initial_reputation,
            now,
        );
        nodes.insert(node_id.to_string(), node.clone());

        info!(
            node = %node_id,
            stake = %stake,
            reputation = node.reputation,
            "Oracle node registered"
        );
        Ok(node)
    }

    /// Mark a node inactive; its recorded votes stay counted
    pub fn deactivate(&self, node_id: &str, now: i64) -> Result<OracleNode> {
        let mut nodes = self.nodes.write();
        let node = nodes
            .get_mut(node_id)
            .ok_or_else(|| NotFoundError::Node(node_id.to_string()))?;

        if node.active {
            node.active = false;
            node.deactivated_at = Some(now);
            info!(node = %node_id, "Oracle node deactivated");
        }
        Ok(node.clone())
    }

    /// Top up a node's stake
    pub fn add_stake(&self, node_id: &str, amount: Decimal) -> Result<OracleNode> {
        if amount <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount(amount).into());
        }
        let mut nodes = self.nodes.write();
        let node = nodes
            .get_mut(node_id)
            .ok_or_else(|| NotFoundError::Node(node_id.to_string()))?;
        node.stake = node
            .stake
            .checked_add(amount)
            .ok_or(ResourceError::AmountOverflow { field: "stake" })?;
        debug!(node = %node_id, stake = %node.stake, "Stake added");
        Ok(node.clone())
    }

    /// Zero an inactive node's stake and hand it back to the caller
    pub fn withdraw_stake(&self, node_id: &str) -> Result<Decimal> {
        let mut nodes = self.nodes.write();
        let node = nodes
            .get_mut(node_id)
            .ok_or_else(|| NotFoundError::Node(node_id.to_string()))?;
        if node.active {
            return Err(StateError::NodeStillActive {
                node: node_id.to_string(),
            }
            .into());
        }
        if node.stake <= Decimal::ZERO {
            return Err(ResourceError::InsufficientStake {
                required: Decimal::ZERO,
                available: node.stake,
            }
            .into());
        }
        let amount = node.stake;
        node.stake = Decimal::ZERO;
        info!(node = %node_id, amount = %amount, "Stake reclaimed");
        Ok(amount)
    }

    /// Deactivate every active node whose stake fell below `minimum`
    pub fn enforce_minimum_stake(&self, minimum: Decimal, now: i64) -> Vec<NodeId> {
        let mut nodes = self.nodes.write();
        let mut dropped = Vec::new();
        for node in nodes.values_mut() {
            if node.active && node.stake < minimum {
                node.active = false;
                node.deactivated_at = Some(now);
                warn!(node = %node.id, stake = %node.stake, minimum = %minimum, "Node below minimum stake deactivated");
                dropped.push(node.id.clone());
            }
        }
        dropped
    }

    /// Apply one resolution's reputation changes atomically
    pub fn settle(&self, settlements: &[Settlement], params: &OracleParams) {
        let mut nodes = self.nodes.write();
        for s in settlements {
            let Some(node) = nodes.get_mut(&s.node_id) else {
                warn!(node = %s.node_id, "Settlement for unknown node skipped");
                continue;
            };
            node.total_requests += 1;
            if s.matched {
                node.correct_answers += 1;
                node.reputation = node
                    .reputation
                    .saturating_add(params.reputation_reward)
                    .min(MAX_REPUTATION);
            } else {
                // Floor only limits penalties; a node already below it stays put
                let floor = params.reputation_floor.min(node.reputation);
                node.reputation = node
                    .reputation
                    .saturating_sub(params.reputation_penalty)
                    .max(floor);
            }
            debug!(
                node = %node.id,
                matched = s.matched,
                reputation = node.reputation,
                "Reputation settled"
            );
        }
    }

    /// Overwrite a node's reputation (admin tooling and tests)
    pub fn set_reputation(&self, node_id: &str, reputation: u16) -> Result<()> {
        let mut nodes = self.nodes.write();
        let node = nodes
            .get_mut(node_id)
            .ok_or_else(|| NotFoundError::Node(node_id.to_string()))?;
        node.reputation = reputation.min(MAX_REPUTATION);
        Ok(())
    }

    pub fn get(&self, node_id: &str) -> Option<OracleNode> {
        self.nodes.read().get(node_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// Active nodes currently allowed to vote
    pub fn eligible_nodes(&self, params: &OracleParams) -> Vec<OracleNode> {
        self.nodes
            .read()
            .values()
            .filter(|n| n.is_eligible(params.node_reputation_threshold))
            .cloned()
            .collect()
    }

    /// (total, active, average reputation)
    pub fn summary(&self) -> (usize, usize, f64) {
        let nodes = self.nodes.read();
        let total = nodes.len();
        let active = nodes.values().filter(|n| n.active).count();
        let average = if total == 0 {
            0.0
        } else {
            nodes.values().map(|n| n.reputation as f64).sum::<f64>() / total as f64
        };
        (total, active, average)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pledgeguard_common::ProtocolError;
    use rust_decimal_macros::dec;

    #[test]
    fn test_register_requires_stake() {
        let registry = StakeRegistry::new();
        let params = OracleParams::default();

        let err = registry
            .register("n1", "http://n1", dec!(50), &params, 0)
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Resource(ResourceError::InsufficientStake { .. })
        ));
        assert!(registry.is_empty());

        let node = registry
            .register("n1", "http://n1", dec!(100), &params, 0)
            .unwrap();
        assert!(node.active);
        assert_eq!(node.reputation, params.initial_reputation);

        let err = registry
            .register("n1", "http://n1", dec!(100), &params, 0)
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::State(StateError::NodeAlreadyRegistered { .. })
        ));
    }

    #[test]
    fn test_deactivate_and_reactivate() {
        let registry = StakeRegistry::new();
        let params = OracleParams::default();
        registry
            .register("n1", "http://n1", dec!(100), &params, 0)
            .unwrap();

        let node = registry.deactivate("n1", 10).unwrap();
        assert!(!node.active);
        assert_eq!(node.deactivated_at, Some(10));

        let node = registry
            .register("n1", "http://n1b", dec!(150), &params, 20)
            .unwrap();
        assert!(node.active);
        assert_eq!(node.stake, dec!(250));
        assert_eq!(node.endpoint, "http://n1b");
    }

    #[test]
    fn test_stake_top_up_overflow_is_refused() {
        let registry = StakeRegistry::new();
        let params = OracleParams::default();
        let big = Decimal::MAX / dec!(2) + Decimal::ONE;
        registry.register("n1", "http://n1", big, &params, 0).unwrap();

        let err = registry.add_stake("n1", big).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Resource(ResourceError::AmountOverflow { .. })
        ));
        assert_eq!(registry.get("n1").unwrap().stake, big);

        registry.deactivate("n1", 5).unwrap();
        let err = registry
            .register("n1", "http://n1", big, &params, 6)
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Resource(ResourceError::AmountOverflow { .. })
        ));
        assert!(!registry.get("n1").unwrap().active);
    }

    #[test]
    fn test_settle_reward_and_floor() {
        let registry = StakeRegistry::new();
        let params = OracleParams {
            reputation_reward: 10,
            reputation_penalty: 50,
            reputation_floor: 460,
            ..OracleParams::default()
        };
        registry.register("a", "", dec!(100), &params, 0).unwrap();
        registry.register("b", "", dec!(100), &params, 0).unwrap();

        let settlements = vec![
            Settlement {
                node_id: "a".to_string(),
                matched: true,
            },
            Settlement {
                node_id: "b".to_string(),
                matched: false,
            },
        ];
        registry.settle(&settlements, &params);

        let a = registry.get("a").unwrap();
        let b = registry.get("b").unwrap();
        assert_eq!(a.reputation, 510);
        assert_eq!(a.correct_answers, 1);
        assert_eq!(a.total_requests, 1);
        assert_eq!(b.reputation, 460); // 500 - 50 clamped at floor
        assert_eq!(b.correct_answers, 0);
        assert_eq!(b.total_requests, 1);
    }

    #[test]
    fn test_withdraw_stake_requires_inactive() {
        let registry = StakeRegistry::new();
        let params = OracleParams::default();
        registry.register("n1", "", dec!(120), &params, 0).unwrap();

        assert!(matches!(
            registry.withdraw_stake("n1"),
            Err(ProtocolError::State(StateError::NodeStillActive { .. }))
        ));

        registry.deactivate("n1", 1).unwrap();
        assert_eq!(registry.withdraw_stake("n1").unwrap(), dec!(120));
        assert_eq!(registry.get("n1").unwrap().stake, Decimal::ZERO);
    }

    #[test]
    fn test_enforce_minimum_stake() {
        let registry = StakeRegistry::new();
        let params = OracleParams::default();
        registry.register("small", "", dec!(100), &params, 0).unwrap();
        registry.register("large", "", dec!(500), &params, 0).unwrap();

        let dropped = registry.enforce_minimum_stake(dec!(200), 5);
        assert_eq!(dropped, vec!["small".to_string()]);
        assert!(!registry.get("small").unwrap().active);
        assert!(registry.get("large").unwrap().active);

        let (total, active, _) = registry.summary();
        assert_eq!((total, active), (2, 1));
    }
}
