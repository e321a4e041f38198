//! Consensus engine - per-request `Open → Resolved{true|false}` state machine
//!
//! Coordinates the verification process:
//! 1. Opens a request for a deliverable hash
//! 2. Accepts one vote per eligible node while voting is open
//! 3. Resolves early on quorum + stake-weighted threshold
//! 4. Otherwise resolves at the deadline by simple majority (ties fail)
//! 5. Settles reputation for every voter
//!
//! Lock order: request mutex, then registry. Nothing here ever touches
//! escrow state.

use std::sync::Arc;

use parking_lot::RwLock;
use pledgeguard_common::{
    AuthorizationError, Clock, Hash32, NotFoundError, OracleNode, OracleStats, ProtocolError,
    RequestId, ResolutionCause, ResourceError, Result, StateError, VerificationRequest,
    VerificationTarget, VoteRecord,
};
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use crate::consensus::quorum::QuorumManager;
use crate::params::{OracleParams, StakeReclaimPolicy};
use crate::registry::{Settlement, StakeRegistry};
use crate::verification::RequestStore;

/// Oracle consensus over verification requests
pub struct ConsensusEngine {
    params: RwLock<OracleParams>,
    registry: StakeRegistry,
    store: RequestStore,
    clock: Arc<dyn Clock>,
}

impl ConsensusEngine {
    /// Create an engine with validated parameters
    pub fn new(params: OracleParams, clock: Arc<dyn Clock>) -> Result<Self> {
        params
            .validate()
            .map_err(|e| ProtocolError::Config(e.to_string()))?;
        Ok(Self {
            params: RwLock::new(params),
            registry: StakeRegistry::new(),
            store: RequestStore::new(),
            clock,
        })
    }

    pub fn params(&self) -> OracleParams {
        self.params.read().clone()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn registry(&self) -> &StakeRegistry {
        &self.registry
    }

    pub fn store(&self) -> &RequestStore {
        &self.store
    }

    // ============ NODES ============

    /// Register a staked node
    #[instrument(skip(self))]
    pub fn register_node(&self, node_id: &str, endpoint: &str, stake: Decimal) -> Result<OracleNode> {
        let params = self.params();
        self.registry
            .register(node_id, endpoint, stake, &params, self.clock.now_millis())
    }

    /// Deactivate a node; its recorded votes remain counted
    #[instrument(skip(self))]
    pub fn deactivate_node(&self, node_id: &str) -> Result<OracleNode> {
        self.registry.deactivate(node_id, self.clock.now_millis())
    }

    pub fn add_stake(&self, node_id: &str, amount: Decimal) -> Result<OracleNode> {
        self.registry.add_stake(node_id, amount)
    }

    /// Return an inactive node's stake, subject to the reclaim policy
    #[instrument(skip(self))]
    pub fn reclaim_stake(&self, node_id: &str) -> Result<Decimal> {
        let params = self.params();
        if params.stake_reclaim == StakeReclaimPolicy::Never {
            return Err(ResourceError::StakeReclaimDisabled.into());
        }
        let node = self
            .registry
            .get(node_id)
            .ok_or_else(|| NotFoundError::Node(node_id.to_string()))?;
        if node.active {
            return Err(StateError::NodeStillActive {
                node: node_id.to_string(),
            }
            .into());
        }
        // Inactive nodes cannot vote, so this count can only go down
        let open = self.store.open_votes_of(node_id);
        if open > 0 {
            return Err(StateError::StakeLocked {
                node: node_id.to_string(),
                open,
            }
            .into());
        }
        self.registry.withdraw_stake(node_id)
    }

    /// Replace parameters. Nodes now under the minimum stake are deactivated.
    #[instrument(skip(self, params))]
    pub fn update_params(&self, params: OracleParams) -> Result<OracleParams> {
        params.validate()?;
        let minimum = params.minimum_stake;
        *self.params.write() = params.clone();

        let dropped = self
            .registry
            .enforce_minimum_stake(minimum, self.clock.now_millis());
        info!(
            minimum_stake = %params.minimum_stake,
            min_votes = params.min_votes_required,
            voting_period_ms = params.voting_period_ms,
            deactivated = dropped.len(),
            "Oracle parameters updated"
        );
        Ok(params)
    }

    // ============ REQUESTS ============

    /// Open a request; the voting period is fixed at creation
    #[instrument(skip(self, deliverable_hash))]
    pub fn open_request(
        &self,
        target: VerificationTarget,
        deliverable_hash: Hash32,
    ) -> Result<VerificationRequest> {
        let voting_period = self.params.read().voting_period_ms;
        let request = VerificationRequest::new(
            target,
            deliverable_hash,
            self.clock.now_millis(),
            voting_period,
        );
        self.store.insert(request.clone())?;

        info!(
            request_id = %request.id,
            campaign_id = %target.campaign_id,
            milestone = ?target.milestone_index,
            deadline = request.voting_deadline,
            "Verification request opened"
        );
        Ok(request)
    }

    /// Record a vote and resolve early when quorum conditions hold
    #[instrument(skip(self))]
    pub fn cast_vote(
        &self,
        request_id: &RequestId,
        node_id: &str,
        approve: bool,
    ) -> Result<VerificationRequest> {
        let params = self.params();
        let now = self.clock.now_millis();

        self.store.with_request(request_id, |request| {
            if request.is_completed {
                return Err(StateError::RequestResolved {
                    request_id: request_id.to_string(),
                }
                .into());
            }
            if request.is_expired(now) {
                return Err(StateError::VotingClosed {
                    request_id: request_id.to_string(),
                }
                .into());
            }

            let node = self
                .registry
                .get(node_id)
                .ok_or_else(|| NotFoundError::Node(node_id.to_string()))?;
            if !node.is_eligible(params.node_reputation_threshold) {
                return Err(AuthorizationError::NotEligible {
                    node: node_id.to_string(),
                    active: node.active,
                    reputation: node.reputation,
                    threshold: params.node_reputation_threshold,
                }
                .into());
            }

            request.record_vote(VoteRecord {
                node_id: node_id.to_string(),
                approve,
                stake: node.stake,
                timestamp: now,
            })?;

            debug!(
                request_id = %request_id,
                node = %node_id,
                approve = approve,
                votes_for = request.votes_for,
                votes_against = request.votes_against,
                "Oracle vote recorded"
            );

            let quorum = QuorumManager::from_params(&params);
            if let Some(result) = quorum.evaluate(request) {
                self.resolve_locked(request, result, ResolutionCause::Consensus, now, &params);
            }
            Ok(request.clone())
        })
    }

    /// Finalize a request whose voting period elapsed. Anyone may call this.
    #[instrument(skip(self))]
    pub fn force_finalize(&self, request_id: &RequestId) -> Result<VerificationRequest> {
        let params = self.params();
        let now = self.clock.now_millis();

        self.store.with_request(request_id, |request| {
            if request.is_completed {
                return Err(StateError::RequestResolved {
                    request_id: request_id.to_string(),
                }
                .into());
            }
            if !request.is_expired(now) {
                return Err(StateError::VotingOpen {
                    request_id: request_id.to_string(),
                }
                .into());
            }
            let result = QuorumManager::from_params(&params).deadline_result(request);
            self.resolve_locked(request, result, ResolutionCause::Deadline, now, &params);
            Ok(request.clone())
        })
    }

    /// Finalize every expired open request. Returns the ones resolved now.
    pub fn sweep_expired(&self) -> Vec<VerificationRequest> {
        let now = self.clock.now_millis();
        let mut resolved = Vec::new();
        for id in self.store.expired_open(now) {
            match self.force_finalize(&id) {
                Ok(req) => resolved.push(req),
                // Lost a race with another finalizer
                Err(ProtocolError::State(StateError::RequestResolved { .. })) => {}
                Err(e) => warn!(request_id = %id, error = %e, "Sweep failed to finalize request"),
            }
        }
        if !resolved.is_empty() {
            info!(count = resolved.len(), "Expired verification requests finalized");
        }
        resolved
    }

    fn resolve_locked(
        &self,
        request: &mut VerificationRequest,
        result: bool,
        cause: ResolutionCause,
        now: i64,
        params: &OracleParams,
    ) {
        if !request.resolve(result, cause, now) {
            return;
        }
        let settlements: Vec<Settlement> = request
            .votes
            .iter()
            .map(|v| Settlement {
                node_id: v.node_id.clone(),
                matched: v.approve == result,
            })
            .collect();
        self.registry.settle(&settlements, params);

        info!(
            request_id = %request.id,
            result = result,
            cause = ?cause,
            votes_for = request.votes_for,
            votes_against = request.votes_against,
            "Verification request resolved"
        );
    }

    // ============ READS ============

    pub fn get_request(&self, request_id: &RequestId) -> Result<VerificationRequest> {
        self.store
            .get(request_id)
            .ok_or_else(|| NotFoundError::Request(request_id.to_string()).into())
    }

    /// Resolution of a request, `None` while open
    pub fn request_result(&self, request_id: &RequestId) -> Option<bool> {
        self.store.result(request_id)
    }

    pub fn get_node(&self, node_id: &str) -> Result<OracleNode> {
        self.registry
            .get(node_id)
            .ok_or_else(|| NotFoundError::Node(node_id.to_string()).into())
    }

    pub fn eligible_nodes(&self) -> Vec<OracleNode> {
        self.registry.eligible_nodes(&self.params.read())
    }

    pub fn stats(&self) -> OracleStats {
        let (total_nodes, active_nodes, average_reputation) = self.registry.summary();
        let (total_requests, completed_requests) = self.store.counts();
        OracleStats {
            total_nodes,
            active_nodes,
            eligible_nodes: self.eligible_nodes().len(),
            total_requests,
            completed_requests,
            average_reputation,
        }
    }
}
