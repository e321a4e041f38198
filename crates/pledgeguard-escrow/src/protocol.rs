//! Protocol facade
//!
//! Wires the oracle, commitment registry, and escrow ledger around one
//! shared clock and exposes the read, write, and admin surfaces. Every write
//! returns a [`Receipt`] carrying a reference and the resulting state.

use std::sync::Arc;

use pledgeguard_common::{
    AuthorizationError, Campaign, CampaignId, Clock, CommitmentOpening, CommitmentRecord,
    ContributionProof, Hash32, Milestone, NotFoundError, OracleNode, OracleStats,
    ProofVerifier, Receipt, RequestId, Result, VerificationRequest,
};
use pledgeguard_oracle::{ConsensusEngine, OracleParams};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::EscrowConfig;
use crate::ledger::{EscrowLedger, NewCampaign, RefundReport};
use crate::privacy::CommitmentRegistry;

/// Amount moved by a withdrawal or claim and the recipient's new balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payout {
    pub identity: String,
    pub amount: Decimal,
    pub balance: Decimal,
}

/// Entry point for every protocol operation
pub struct Protocol {
    ledger: EscrowLedger,
    oracle: Arc<ConsensusEngine>,
    commitments: Arc<CommitmentRegistry>,
    clock: Arc<dyn Clock>,
}

impl Protocol {
    pub fn new(
        config: EscrowConfig,
        params: OracleParams,
        verifier: Arc<dyn ProofVerifier>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let oracle = Arc::new(ConsensusEngine::new(params, clock.clone())?);
        let commitments = Arc::new(CommitmentRegistry::new(verifier, clock.clone()));
        let ledger = EscrowLedger::new(config, oracle.clone(), commitments.clone(), clock.clone())?;

        info!(
            admins = ledger.config().admins.len(),
            amount_scale = ledger.config().amount_scale,
            "Protocol initialized"
        );
        Ok(Self {
            ledger,
            oracle,
            commitments,
            clock,
        })
    }

    pub fn ledger(&self) -> &EscrowLedger {
        &self.ledger
    }

    pub fn oracle(&self) -> &ConsensusEngine {
        &self.oracle
    }

    pub fn commitments(&self) -> &CommitmentRegistry {
        &self.commitments
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn require_admin(&self, caller: &str) -> Result<()> {
        if !self.ledger.config().is_admin(caller) {
            return Err(AuthorizationError::NotAdmin {
                caller: caller.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Node operations are open to the node itself and to admins
    fn require_node_or_admin(&self, node_id: &str, caller: &str) -> Result<()> {
        if node_id == caller {
            return Ok(());
        }
        self.require_admin(caller)
    }

    // ============ ESCROW WRITES ============

    pub fn create_campaign(&self, creator: &str, params: NewCampaign) -> Result<Receipt<Campaign>> {
        let campaign = self.ledger.create_campaign(creator, params)?;
        Ok(Receipt::new(campaign.id.to_string(), campaign))
    }

    pub fn contribute(
        &self,
        campaign_id: &CampaignId,
        amount: Decimal,
        contributor: &str,
    ) -> Result<Receipt<Campaign>> {
        let (contribution, campaign) = self.ledger.contribute(campaign_id, amount, contributor)?;
        Ok(Receipt::new(contribution.id.to_string(), campaign))
    }

    pub fn private_contribute(
        &self,
        campaign_id: &CampaignId,
        commitment: &Hash32,
        proof: &ContributionProof,
        amount: Decimal,
    ) -> Result<Receipt<Campaign>> {
        let (contribution, campaign) =
            self.ledger
                .private_contribute(campaign_id, commitment, proof, amount)?;
        Ok(Receipt::new(contribution.id.to_string(), campaign))
    }

    /// Reference is the verification request id
    pub fn submit_milestone_deliverable(
        &self,
        campaign_id: &CampaignId,
        index: usize,
        deliverable_hash: Hash32,
        submitter: &str,
    ) -> Result<Receipt<Campaign>> {
        let (request, campaign) = self.ledger.submit_milestone_deliverable(
            campaign_id,
            index,
            deliverable_hash,
            submitter,
        )?;
        Ok(Receipt::new(request.id.to_string(), campaign))
    }

    pub fn release_milestone_funds(
        &self,
        campaign_id: &CampaignId,
        index: usize,
    ) -> Result<Receipt<Campaign>> {
        let (_, campaign) = self.ledger.release_milestone_funds(campaign_id, index)?;
        Ok(Receipt::new(format!("{campaign_id}/{index}"), campaign))
    }

    pub fn withdraw_funds(&self, campaign_id: &CampaignId, caller: &str) -> Result<Receipt<Payout>> {
        let (amount, _) = self.ledger.withdraw_funds(campaign_id, caller)?;
        Ok(Receipt::new(
            campaign_id.to_string(),
            Payout {
                identity: caller.to_string(),
                amount,
                balance: self.ledger.account_balance(caller),
            },
        ))
    }

    pub fn refund_contributors(&self, campaign_id: &CampaignId) -> Result<Receipt<RefundReport>> {
        let report = self.ledger.refund_contributors(campaign_id)?;
        Ok(Receipt::new(campaign_id.to_string(), report))
    }

    pub fn claim_private_refund(
        &self,
        commitment: &Hash32,
        opening: &CommitmentOpening,
        recipient: &str,
    ) -> Result<Receipt<Payout>> {
        let amount = self
            .ledger
            .claim_private_refund(commitment, opening, recipient)?;
        Ok(Receipt::new(
            hex::encode(commitment),
            Payout {
                identity: recipient.to_string(),
                amount,
                balance: self.ledger.account_balance(recipient),
            },
        ))
    }

    /// Reference is the verification request id
    pub fn request_campaign_verification(
        &self,
        campaign_id: &CampaignId,
        evidence_hash: Hash32,
        caller: &str,
    ) -> Result<Receipt<Campaign>> {
        let (request, campaign) =
            self.ledger
                .request_campaign_verification(campaign_id, evidence_hash, caller)?;
        Ok(Receipt::new(request.id.to_string(), campaign))
    }

    pub fn register_commitment(
        &self,
        commitment: Hash32,
        min_amount: Decimal,
        nullifier_hash: Hash32,
    ) -> Result<Receipt<CommitmentRecord>> {
        let record = self
            .commitments
            .register(commitment, min_amount, nullifier_hash)?;
        Ok(Receipt::new(hex::encode(commitment), record))
    }

    // ============ ORACLE WRITES ============

    pub fn register_node(
        &self,
        node_id: &str,
        endpoint: &str,
        stake: Decimal,
    ) -> Result<Receipt<OracleNode>> {
        let node = self.oracle.register_node(node_id, endpoint, stake)?;
        Ok(Receipt::new(node.id.clone(), node))
    }

    pub fn deactivate_node(&self, node_id: &str, caller: &str) -> Result<Receipt<OracleNode>> {
        self.require_node_or_admin(node_id, caller)?;
        let node = self.oracle.deactivate_node(node_id)?;
        Ok(Receipt::new(node.id.clone(), node))
    }

    pub fn add_stake(
        &self,
        node_id: &str,
        amount: Decimal,
        caller: &str,
    ) -> Result<Receipt<OracleNode>> {
        self.require_node_or_admin(node_id, caller)?;
        let node = self.oracle.add_stake(node_id, amount)?;
        Ok(Receipt::new(node.id.clone(), node))
    }

    pub fn reclaim_stake(&self, node_id: &str, caller: &str) -> Result<Receipt<Payout>> {
        if node_id != caller {
            return Err(AuthorizationError::NotAdmin {
                caller: caller.to_string(),
            }
            .into());
        }
        let amount = self.oracle.reclaim_stake(node_id)?;
        let balance = self.ledger.accounts().credit(node_id, amount);
        Ok(Receipt::new(
            node_id.to_string(),
            Payout {
                identity: node_id.to_string(),
                amount,
                balance,
            },
        ))
    }

    pub fn cast_vote(
        &self,
        request_id: &RequestId,
        node_id: &str,
        approve: bool,
    ) -> Result<Receipt<VerificationRequest>> {
        let request = self.oracle.cast_vote(request_id, node_id, approve)?;
        Ok(Receipt::new(request.id.to_string(), request))
    }

    /// Finalize a request past its voting deadline. Open to any caller.
    pub fn force_finalize_verification(
        &self,
        request_id: &RequestId,
    ) -> Result<Receipt<VerificationRequest>> {
        let request = self.oracle.force_finalize(request_id)?;
        Ok(Receipt::new(request.id.to_string(), request))
    }

    pub fn sweep_expired(&self) -> Vec<VerificationRequest> {
        self.oracle.sweep_expired()
    }

    // ============ ADMIN ============

    pub fn update_oracle_params(
        &self,
        caller: &str,
        params: OracleParams,
    ) -> Result<Receipt<OracleParams>> {
        self.require_admin(caller)?;
        let params = self.oracle.update_params(params)?;
        Ok(Receipt::new("oracle-params", params))
    }

    pub fn emergency_stop(
        &self,
        campaign_id: &CampaignId,
        stop: bool,
        caller: &str,
    ) -> Result<Receipt<Campaign>> {
        let campaign = self.ledger.emergency_stop(campaign_id, stop, caller)?;
        Ok(Receipt::new(campaign_id.to_string(), campaign))
    }

    // ============ READS ============

    pub fn get_campaign(&self, campaign_id: &CampaignId) -> Result<Campaign> {
        self.ledger.get_campaign(campaign_id)
    }

    pub fn list_campaigns(&self) -> Vec<Campaign> {
        self.ledger.list_campaigns()
    }

    pub fn get_milestone(&self, campaign_id: &CampaignId, index: usize) -> Result<Milestone> {
        self.ledger.get_milestone(campaign_id, index)
    }

    pub fn get_verification_request(&self, request_id: &RequestId) -> Result<VerificationRequest> {
        self.oracle.get_request(request_id)
    }

    pub fn get_oracle_node(&self, node_id: &str) -> Result<OracleNode> {
        self.oracle.get_node(node_id)
    }

    pub fn oracle_stats(&self) -> OracleStats {
        self.oracle.stats()
    }

    pub fn oracle_params(&self) -> OracleParams {
        self.oracle.params()
    }

    pub fn account_balance(&self, identity: &str) -> Decimal {
        self.ledger.account_balance(identity)
    }

    pub fn get_commitment(&self, commitment: &Hash32) -> Result<CommitmentRecord> {
        self.commitments
            .get(commitment)
            .ok_or_else(|| NotFoundError::Commitment(hex::encode(commitment)).into())
    }
}
