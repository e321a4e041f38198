//! Oracle network records - staked nodes and verification requests

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::{hex32, Hash32};
use crate::error::{ProtocolError, ResourceError, StateError};

/// Opaque node identity from the identity collaborator
pub type NodeId = String;

/// Verification request identifier
pub type RequestId = Uuid;

/// Maximum reputation value
pub const MAX_REPUTATION: u16 = 1000;

/// Staked participant entitled to vote on deliverables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleNode {
    pub id: NodeId,
    /// Where the node can be reached; informational only
    pub endpoint: String,
    pub stake: Decimal,
    /// 0-1000
    pub reputation: u16,
    pub active: bool,
    /// Requests this node voted on that have since resolved
    pub total_requests: u64,
    /// Of those, how many it voted with the outcome
    pub correct_answers: u64,
    pub registered_at: i64,
    pub deactivated_at: Option<i64>,
}

impl OracleNode {
    pub fn new(id: NodeId, endpoint: String, stake: Decimal, reputation: u16, now: i64) -> Self {
        Self {
            id,
            endpoint,
            stake,
            reputation: reputation.min(MAX_REPUTATION),
            active: true,
            total_requests: 0,
            correct_answers: 0,
            registered_at: now,
            deactivated_at: None,
        }
    }

    /// Fraction of resolved votes that matched the outcome
    pub fn accuracy(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.correct_answers as f64 / self.total_requests as f64
        }
    }

    #[inline]
    pub fn is_eligible(&self, reputation_threshold: u16) -> bool {
        self.active && self.reputation >= reputation_threshold
    }
}

/// What a request is verifying
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerificationTarget {
    pub campaign_id: Uuid,
    /// `None` for campaign authenticity
    pub milestone_index: Option<usize>,
}

/// A single recorded vote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRecord {
    pub node_id: NodeId,
    pub approve: bool,
    /// Stake weight at the time of voting
    pub stake: Decimal,
    pub timestamp: i64,
}

/// Why a request resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionCause {
    /// Quorum and threshold reached while voting was open
    Consensus,
    /// Voting period elapsed; simple majority, ties fail
    Deadline,
}

/// Pending or resolved authenticity check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub id: RequestId,
    pub target: VerificationTarget,
    #[serde(with = "hex32")]
    pub deliverable_hash: Hash32,
    pub created_at: i64,
    pub voting_deadline: i64,
    pub votes_for: u32,
    pub votes_against: u32,
    pub stake_for: Decimal,
    pub stake_against: Decimal,
    /// Votes in arrival order
    pub votes: Vec<VoteRecord>,
    /// Dedup set over `votes`
    pub voters: BTreeSet<NodeId>,
    pub is_completed: bool,
    pub result: Option<bool>,
    pub cause: Option<ResolutionCause>,
    pub resolved_at: Option<i64>,
}

impl VerificationRequest {
    pub fn new(
        target: VerificationTarget,
        deliverable_hash: Hash32,
        now: i64,
        voting_period_ms: i64,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            target,
            deliverable_hash,
            created_at: now,
            voting_deadline: now.saturating_add(voting_period_ms),
            votes_for: 0,
            votes_against: 0,
            stake_for: Decimal::ZERO,
            stake_against: Decimal::ZERO,
            votes: Vec::new(),
            voters: BTreeSet::new(),
            is_completed: false,
            result: None,
            cause: None,
            resolved_at: None,
        }
    }

    #[inline]
    pub fn total_votes(&self) -> u32 {
        self.votes_for + self.votes_against
    }

    pub fn has_voted(&self, node_id: &str) -> bool {
        self.voters.contains(node_id)
    }

    /// Voting deadline elapsed
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.voting_deadline
    }

    /// Open and still inside the voting period
    pub fn accepts_votes(&self, now: i64) -> bool {
        !self.is_completed && !self.is_expired(now)
    }

    /// Append a vote; refuses a second vote from the same node.
    /// Nothing is recorded unless every counter update succeeds.
    pub fn record_vote(&mut self, vote: VoteRecord) -> Result<(), ProtocolError> {
        if self.is_completed {
            return Err(StateError::RequestResolved {
                request_id: self.id.to_string(),
            }
            .into());
        }
        if self.voters.contains(&vote.node_id) {
            return Err(StateError::DuplicateVote {
                node: vote.node_id,
                request_id: self.id.to_string(),
            }
            .into());
        }
        let side = if vote.approve {
            self.stake_for
        } else {
            self.stake_against
        };
        let stake = side
            .checked_add(vote.stake)
            .ok_or(ResourceError::AmountOverflow { field: "stake tally" })?;

        if vote.approve {
            self.votes_for += 1;
            self.stake_for = stake;
        } else {
            self.votes_against += 1;
            self.stake_against = stake;
        }
        self.voters.insert(vote.node_id.clone());
        self.votes.push(vote);
        Ok(())
    }

    /// Close the request. Only the first resolution sticks.
    pub fn resolve(&mut self, result: bool, cause: ResolutionCause, now: i64) -> bool {
        if self.is_completed {
            return false;
        }
        self.is_completed = true;
        self.result = Some(result);
        self.cause = Some(cause);
        self.resolved_at = Some(now);
        true
    }
}

/// Network-wide statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OracleStats {
    pub total_nodes: usize,
    pub active_nodes: usize,
    /// Active and above the reputation threshold
    pub eligible_nodes: usize,
    pub total_requests: usize,
    pub completed_requests: usize,
    pub average_reputation: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request() -> VerificationRequest {
        VerificationRequest::new(
            VerificationTarget {
                campaign_id: Uuid::now_v7(),
                milestone_index: Some(0),
            },
            [7u8; 32],
            1_000,
            60_000,
        )
    }

    fn vote(node: &str, approve: bool) -> VoteRecord {
        VoteRecord {
            node_id: node.to_string(),
            approve,
            stake: dec!(100),
            timestamp: 1_001,
        }
    }

    #[test]
    fn test_duplicate_vote_rejected() {
        let mut req = request();
        req.record_vote(vote("n1", true)).unwrap();
        let err = req.record_vote(vote("n1", false)).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::State(StateError::DuplicateVote { .. })
        ));
        assert_eq!(req.votes_for, 1);
        assert_eq!(req.votes_against, 0);
        assert_eq!(req.votes.len(), 1);
    }

    #[test]
    fn test_resolve_is_sticky() {
        let mut req = request();
        assert!(req.accepts_votes(1_500));
        assert!(!req.accepts_votes(61_000));

        assert!(req.resolve(true, ResolutionCause::Consensus, 2_000));
        assert!(!req.resolve(false, ResolutionCause::Deadline, 3_000));
        assert_eq!(req.result, Some(true));

        let err = req.record_vote(vote("n2", true)).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::State(StateError::RequestResolved { .. })
        ));
    }

    #[test]
    fn test_tally_overflow_leaves_request_untouched() {
        let mut req = request();
        let half = Decimal::MAX / dec!(2) + Decimal::ONE;
        req.record_vote(VoteRecord {
            stake: half,
            ..vote("a", true)
        })
        .unwrap();

        let err = req
            .record_vote(VoteRecord {
                stake: half,
                ..vote("b", true)
            })
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Resource(ResourceError::AmountOverflow { .. })
        ));
        assert_eq!(req.votes_for, 1);
        assert_eq!(req.stake_for, half);
        assert!(!req.has_voted("b"));
        assert_eq!(req.votes.len(), 1);

        // The refused node can still vote once the tally has room
        req.record_vote(vote("b", false)).unwrap();
        assert_eq!(req.votes_against, 1);
    }

    #[test]
    fn test_voting_deadline_saturates() {
        let req = VerificationRequest::new(
            VerificationTarget {
                campaign_id: Uuid::now_v7(),
                milestone_index: None,
            },
            [1u8; 32],
            1_000,
            i64::MAX,
        );
        assert_eq!(req.voting_deadline, i64::MAX);
        assert!(req.accepts_votes(1_001));
    }

    #[test]
    fn test_node_accuracy() {
        let mut node = OracleNode::new("n1".into(), "http://n1".into(), dec!(100), 2000, 0);
        assert_eq!(node.reputation, MAX_REPUTATION);
        assert_eq!(node.accuracy(), 0.0);
        node.total_requests = 4;
        node.correct_answers = 3;
        assert_eq!(node.accuracy(), 0.75);
    }
}
