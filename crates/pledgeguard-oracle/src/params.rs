//! Oracle network parameters

use pledgeguard_common::{
    ValidationError, DEFAULT_INITIAL_REPUTATION, DEFAULT_VOTING_PERIOD_MS, MAX_REPUTATION,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// When a deactivated node may take its stake back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakeReclaimPolicy {
    /// Stake stays locked forever
    Never,
    /// Once every request the node voted on has resolved
    AfterOpenRequests,
}

/// Tunable consensus and reputation policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleParams {
    /// Stake required to register and stay active
    pub minimum_stake: Decimal,
    /// Votes needed before consensus can resolve early
    pub min_votes_required: u32,
    /// Voting window per request
    pub voting_period_ms: i64,
    /// Winning side's stake share required for early resolution (0.0 - 1.0)
    pub consensus_threshold: Decimal,
    /// Reputation a node needs to vote
    pub node_reputation_threshold: u16,
    /// Reputation assigned at registration
    pub initial_reputation: u16,
    /// Gain for voting with the outcome
    pub reputation_reward: u16,
    /// Loss for voting against the outcome
    pub reputation_penalty: u16,
    /// Penalties never push reputation below this
    pub reputation_floor: u16,
    pub stake_reclaim: StakeReclaimPolicy,
}

impl Default for OracleParams {
    fn default() -> Self {
        Self {
            minimum_stake: Decimal::new(100, 0),
            min_votes_required: 3,
            voting_period_ms: DEFAULT_VOTING_PERIOD_MS,
            consensus_threshold: Decimal::new(66, 2), // 66%
            node_reputation_threshold: 300,
            initial_reputation: DEFAULT_INITIAL_REPUTATION,
            reputation_reward: 10,
            reputation_penalty: 20,
            reputation_floor: 100,
            stake_reclaim: StakeReclaimPolicy::AfterOpenRequests,
        }
    }
}

impl OracleParams {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.minimum_stake < Decimal::ZERO {
            return Err(invalid("minimum_stake", "must not be negative"));
        }
        if self.min_votes_required == 0 {
            return Err(invalid("min_votes_required", "must be at least 1"));
        }
        if self.voting_period_ms <= 0 {
            return Err(invalid("voting_period_ms", "must be positive"));
        }
        if self.consensus_threshold <= Decimal::new(5, 1) || self.consensus_threshold > Decimal::ONE
        {
            return Err(invalid("consensus_threshold", "must be in (0.5, 1.0]"));
        }
        if self.initial_reputation > MAX_REPUTATION
            || self.node_reputation_threshold > MAX_REPUTATION
            || self.reputation_floor > MAX_REPUTATION
        {
            return Err(invalid("reputation", "values must be <= 1000"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ValidationError {
    ValidationError::InvalidParameter {
        field,
        reason: reason.to_string(),
    }
}
