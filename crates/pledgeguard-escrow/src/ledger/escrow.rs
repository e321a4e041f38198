//! Escrow ledger - campaigns, contributions, and fund movement
//!
//! The ledger is the sole owner of "who holds how much". Every campaign sits
//! behind its own mutex; an operation locks it, folds in any verification
//! results the oracle has reached since the last visit, validates fully, and
//! only then mutates.
//!
//! Lock order: campaign, then verification request (via the oracle), then
//! commitment registry. Nothing below the campaign ever takes a campaign lock.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use pledgeguard_common::{
    AuthorizationError, Campaign, CampaignId, CampaignStatus, Clock, CommitmentOpening,
    Contribution, ContributionProof, Contributor, Hash32, Milestone, MilestoneSpec,
    MilestoneStatus, NotFoundError, ProtocolError, ResourceError, Result, StateError,
    ValidationError, VerificationRequest, VerificationTarget,
};
use pledgeguard_oracle::ConsensusEngine;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::EscrowConfig;
use crate::ledger::accounts::Accounts;
use crate::ledger::refund::pro_rata;
use crate::privacy::CommitmentRegistry;

/// Parameters for opening a campaign
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCampaign {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub funding_goal: Decimal,
    /// Unix milliseconds
    pub deadline: i64,
    pub milestones: Vec<MilestoneSpec>,
}

/// One contribution's share of a refund
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundPayout {
    pub contribution_id: Uuid,
    pub contributor: Contributor,
    pub amount: Decimal,
}

/// Outcome of a refund
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundReport {
    pub campaign_id: CampaignId,
    pub total: Decimal,
    pub payouts: Vec<RefundPayout>,
}

/// Campaign escrow ledger
pub struct EscrowLedger {
    config: EscrowConfig,
    campaigns: DashMap<CampaignId, Arc<Mutex<Campaign>>>,
    oracle: Arc<ConsensusEngine>,
    commitments: Arc<CommitmentRegistry>,
    accounts: Accounts,
    clock: Arc<dyn Clock>,
}

impl EscrowLedger {
    pub fn new(
        config: EscrowConfig,
        oracle: Arc<ConsensusEngine>,
        commitments: Arc<CommitmentRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| ProtocolError::Config(e.to_string()))?;
        Ok(Self {
            config,
            campaigns: DashMap::new(),
            oracle,
            commitments,
            accounts: Accounts::new(),
            clock,
        })
    }

    pub fn config(&self) -> &EscrowConfig {
        &self.config
    }

    pub fn oracle(&self) -> &Arc<ConsensusEngine> {
        &self.oracle
    }

    pub fn commitments(&self) -> &Arc<CommitmentRegistry> {
        &self.commitments
    }

    pub fn accounts(&self) -> &Accounts {
        &self.accounts
    }

    // ============ CAMPAIGNS ============

    /// Open a campaign. Milestone amounts must sum exactly to the goal.
    #[instrument(skip(self, params), fields(title = %params.title))]
    pub fn create_campaign(&self, creator: &str, params: NewCampaign) -> Result<Campaign> {
        let now = self.clock.now_millis();
        self.validate_campaign(&params, now)?;

        let campaign = Campaign::new(
            creator.to_string(),
            params.title,
            params.description,
            params.funding_goal,
            params.deadline,
            params.milestones,
            now,
        );
        let id = campaign.id;
        if self.campaigns.contains_key(&id) {
            return Err(ProtocolError::Internal(format!("campaign id collision: {id}")));
        }
        self.campaigns.insert(id, Arc::new(Mutex::new(campaign.clone())));

        info!(
            campaign_id = %id,
            creator = %creator,
            goal = %campaign.funding_goal,
            milestones = campaign.milestones.len(),
            deadline = campaign.deadline,
            "Campaign created"
        );
        Ok(campaign)
    }

    fn validate_campaign(&self, params: &NewCampaign, now: i64) -> Result<()> {
        if params.title.trim().is_empty() {
            return Err(ValidationError::InvalidParameter {
                field: "title",
                reason: "must not be blank".to_string(),
            }
            .into());
        }
        if params.funding_goal <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount(params.funding_goal).into());
        }
        self.check_scale("funding_goal", params.funding_goal)?;
        if params.deadline <= now {
            return Err(ValidationError::DeadlineInPast {
                deadline: params.deadline,
                now,
            }
            .into());
        }
        if params.milestones.is_empty() {
            return Err(ValidationError::NoMilestones.into());
        }
        if params.milestones.len() > self.config.max_milestones {
            return Err(ValidationError::InvalidParameter {
                field: "milestones",
                reason: format!(
                    "{} exceeds the limit of {}",
                    params.milestones.len(),
                    self.config.max_milestones
                ),
            }
            .into());
        }

        let mut previous_deadline = i64::MIN;
        for (index, m) in params.milestones.iter().enumerate() {
            if m.fund_amount <= Decimal::ZERO {
                return Err(ValidationError::NonPositiveAmount(m.fund_amount).into());
            }
            self.check_scale("fund_amount", m.fund_amount)?;
            if m.deadline <= now || m.deadline > params.deadline {
                return Err(ValidationError::MilestoneDeadline {
                    index,
                    deadline: m.deadline,
                    now,
                    campaign_deadline: params.deadline,
                }
                .into());
            }
            if m.deadline < previous_deadline {
                return Err(ValidationError::MilestoneOrder { index }.into());
            }
            previous_deadline = m.deadline;
        }

        let sum = params
            .milestones
            .iter()
            .try_fold(Decimal::ZERO, |acc, m| acc.checked_add(m.fund_amount))
            .ok_or_else(|| ValidationError::InvalidParameter {
                field: "milestones",
                reason: "milestone amounts overflow".to_string(),
            })?;
        if sum != params.funding_goal {
            return Err(ValidationError::MilestoneSumMismatch {
                sum,
                goal: params.funding_goal,
            }
            .into());
        }
        Ok(())
    }

    fn check_scale(&self, field: &'static str, amount: Decimal) -> Result<()> {
        if amount.normalize().scale() > self.config.amount_scale {
            return Err(ValidationError::InvalidParameter {
                field,
                reason: format!(
                    "{amount} has more than {} decimal places",
                    self.config.amount_scale
                ),
            }
            .into());
        }
        Ok(())
    }

    fn handle(&self, id: &CampaignId) -> Result<Arc<Mutex<Campaign>>> {
        self.campaigns
            .get(id)
            .map(|c| c.value().clone())
            .ok_or_else(|| NotFoundError::Campaign(id.to_string()).into())
    }

    /// Lock a campaign, fold in oracle results, then run `f`.
    fn with_campaign<R>(
        &self,
        id: &CampaignId,
        f: impl FnOnce(&mut Campaign, i64) -> Result<R>,
    ) -> Result<R> {
        let handle = self.handle(id)?;
        let mut campaign = handle.lock();
        let resolved = self.sync_resolutions(&mut campaign);
        if resolved > 0 {
            debug!(campaign_id = %id, resolved = resolved, "Folded verification results");
        }
        f(&mut campaign, self.clock.now_millis())
    }

    /// Pull resolved verification results into milestone and authenticity
    /// status. Returns how many milestones changed.
    fn sync_resolutions(&self, campaign: &mut Campaign) -> usize {
        let mut changed = 0;
        for m in campaign
            .milestones
            .iter_mut()
            .filter(|m| m.status == MilestoneStatus::Submitted)
        {
            let Some(request_id) = m.request_id else {
                continue;
            };
            if let Some(result) = self.oracle.request_result(&request_id) {
                m.status = if result {
                    MilestoneStatus::Verified
                } else {
                    MilestoneStatus::Rejected
                };
                changed += 1;
            }
        }
        if campaign.authenticity_verified.is_none() {
            if let Some(request_id) = campaign.authenticity_request {
                campaign.authenticity_verified = self.oracle.request_result(&request_id);
            }
        }
        changed
    }

    fn require_creator(campaign: &Campaign, caller: &str) -> Result<()> {
        if campaign.creator != caller {
            return Err(AuthorizationError::NotCreator {
                caller: caller.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Shared checks for both contribution paths
    fn check_accepting(&self, campaign: &Campaign, amount: Decimal, now: i64) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount(amount).into());
        }
        self.check_scale("amount", amount)?;
        if campaign.emergency_stopped {
            return Err(StateError::EmergencyStopped.into());
        }
        if campaign.status != CampaignStatus::Active {
            return Err(StateError::CampaignNotActive {
                status: campaign.status.to_string(),
            }
            .into());
        }
        if campaign.is_expired(now) {
            return Err(StateError::CampaignExpired.into());
        }
        let remaining = campaign.remaining_goal();
        if amount > remaining {
            return Err(ValidationError::ExceedsGoal { amount, remaining }.into());
        }
        Ok(())
    }

    // ============ CONTRIBUTIONS ============

    /// Credit a public contribution
    #[instrument(skip(self))]
    pub fn contribute(
        &self,
        campaign_id: &CampaignId,
        amount: Decimal,
        contributor: &str,
    ) -> Result<(Contribution, Campaign)> {
        self.with_campaign(campaign_id, |campaign, now| {
            self.check_accepting(campaign, amount, now)?;

            let contribution = Contribution {
                id: Uuid::now_v7(),
                campaign_id: *campaign_id,
                contributor: Contributor::Public {
                    identity: contributor.to_string(),
                },
                amount,
                refunded: Decimal::ZERO,
                timestamp: now,
            };
            campaign.credit(contribution.clone(), now)?;

            info!(
                campaign_id = %campaign_id,
                contributor = %contributor,
                amount = %amount,
                raised = %campaign.raised_amount,
                status = %campaign.status,
                "Contribution credited"
            );
            Ok((contribution, campaign.clone()))
        })
    }

    /// Credit a contribution whose amount is bound to a registered
    /// commitment. The contribution records only the commitment digest.
    #[instrument(skip(self, commitment, proof))]
    pub fn private_contribute(
        &self,
        campaign_id: &CampaignId,
        commitment: &Hash32,
        proof: &ContributionProof,
        amount: Decimal,
    ) -> Result<(Contribution, Campaign)> {
        self.with_campaign(campaign_id, |campaign, now| {
            self.check_accepting(campaign, amount, now)?;
            self.commitments
                .spend(commitment, proof, amount, *campaign_id)?;

            let contribution = Contribution {
                id: Uuid::now_v7(),
                campaign_id: *campaign_id,
                contributor: Contributor::Private {
                    commitment: *commitment,
                },
                amount,
                refunded: Decimal::ZERO,
                timestamp: now,
            };
            campaign.credit(contribution.clone(), now)?;

            info!(
                campaign_id = %campaign_id,
                amount = %amount,
                raised = %campaign.raised_amount,
                "Private contribution credited"
            );
            Ok((contribution, campaign.clone()))
        })
    }

    // ============ MILESTONES ============

    /// Submit a deliverable for a pending milestone and open its
    /// verification request
    #[instrument(skip(self, deliverable_hash))]
    pub fn submit_milestone_deliverable(
        &self,
        campaign_id: &CampaignId,
        index: usize,
        deliverable_hash: Hash32,
        submitter: &str,
    ) -> Result<(VerificationRequest, Campaign)> {
        self.with_campaign(campaign_id, |campaign, now| {
            Self::require_creator(campaign, submitter)?;
            if campaign.emergency_stopped {
                return Err(StateError::EmergencyStopped.into());
            }
            if campaign.status != CampaignStatus::Funded {
                return Err(StateError::CampaignNotFunded {
                    status: campaign.status.to_string(),
                }
                .into());
            }
            let milestone = campaign
                .milestone(index)
                .ok_or_else(|| NotFoundError::Milestone {
                    campaign_id: campaign_id.to_string(),
                    index,
                })?;
            if milestone.status != MilestoneStatus::Pending {
                return Err(StateError::MilestoneNotPending {
                    index,
                    status: milestone.status.to_string(),
                }
                .into());
            }
            if now >= milestone.deadline {
                return Err(StateError::MilestoneExpired { index }.into());
            }

            let request = self.oracle.open_request(
                VerificationTarget {
                    campaign_id: *campaign_id,
                    milestone_index: Some(index),
                },
                deliverable_hash,
            )?;

            if let Some(m) = campaign.milestone_mut(index) {
                m.status = MilestoneStatus::Submitted;
                m.deliverable_hash = Some(deliverable_hash);
                m.request_id = Some(request.id);
                m.submitted_at = Some(now);
            }
            campaign.touch(now);

            info!(
                campaign_id = %campaign_id,
                milestone = index,
                request_id = %request.id,
                "Milestone deliverable submitted"
            );
            Ok((request, campaign.clone()))
        })
    }

    /// Move a verified milestone's funds to the creator's claimable balance.
    /// Of any number of concurrent calls exactly one succeeds.
    #[instrument(skip(self))]
    pub fn release_milestone_funds(
        &self,
        campaign_id: &CampaignId,
        index: usize,
    ) -> Result<(Decimal, Campaign)> {
        self.with_campaign(campaign_id, |campaign, now| {
            if campaign.emergency_stopped {
                return Err(StateError::EmergencyStopped.into());
            }
            if campaign.milestone(index).is_none() {
                return Err(NotFoundError::Milestone {
                    campaign_id: campaign_id.to_string(),
                    index,
                }
                .into());
            }
            let amount = campaign.release_milestone(index, now)?;

            info!(
                campaign_id = %campaign_id,
                milestone = index,
                amount = %amount,
                escrow = %campaign.escrow_balance,
                status = %campaign.status,
                "Milestone funds released"
            );
            Ok((amount, campaign.clone()))
        })
    }

    /// Pay the creator's released-but-unclaimed balance into their account
    #[instrument(skip(self))]
    pub fn withdraw_funds(
        &self,
        campaign_id: &CampaignId,
        caller: &str,
    ) -> Result<(Decimal, Campaign)> {
        self.with_campaign(campaign_id, |campaign, now| {
            Self::require_creator(campaign, caller)?;
            if campaign.creator_claimable <= Decimal::ZERO {
                return Err(ResourceError::InsufficientBalance {
                    required: Decimal::new(1, self.config.amount_scale),
                    available: campaign.creator_claimable,
                }
                .into());
            }
            let amount = campaign.take_claimable(now);
            let balance = self.accounts.credit(caller, amount);

            info!(
                campaign_id = %campaign_id,
                creator = %caller,
                amount = %amount,
                balance = %balance,
                "Creator funds withdrawn"
            );
            Ok((amount, campaign.clone()))
        })
    }

    // ============ REFUNDS ============

    /// Return refundable escrow pro-rata to every contribution.
    ///
    /// Allowed once the deadline passed, every milestone is resolved, or the
    /// campaign is under emergency stop. Funds of verified, unreleased
    /// milestones stay reserved for the creator.
    #[instrument(skip(self))]
    pub fn refund_contributors(&self, campaign_id: &CampaignId) -> Result<RefundReport> {
        self.with_campaign(campaign_id, |campaign, now| {
            let eligible = campaign.emergency_stopped
                || campaign.is_expired(now)
                || (campaign.status != CampaignStatus::Active
                    && campaign.all_milestones_resolved());
            if !eligible {
                return Err(StateError::NotRefundable.into());
            }

            let refundable = campaign.refundable_escrow();
            if refundable <= Decimal::ZERO {
                return Err(StateError::NothingToRefund.into());
            }

            let weights: Vec<(usize, Decimal)> = campaign
                .contributions
                .iter()
                .enumerate()
                .map(|(pos, c)| (pos, c.net()))
                .collect();
            let shares = pro_rata(refundable, &weights, self.config.amount_scale);

            let mut payouts = Vec::with_capacity(shares.len());
            for (pos, amount) in &shares {
                let contribution = &campaign.contributions[*pos];
                match &contribution.contributor {
                    Contributor::Public { identity } => {
                        self.accounts.credit(identity, *amount);
                    }
                    Contributor::Private { commitment } => {
                        self.commitments.park_refund(*commitment, *amount);
                    }
                }
                payouts.push(RefundPayout {
                    contribution_id: contribution.id,
                    contributor: contribution.contributor.clone(),
                    amount: *amount,
                });
            }
            let total = campaign.apply_refund(&shares, now);

            if !campaign.balances_consistent() {
                warn!(campaign_id = %campaign_id, "Balance identities violated after refund");
            }
            info!(
                campaign_id = %campaign_id,
                total = %total,
                payouts = payouts.len(),
                reserved = %campaign.reserved_escrow(),
                "Contributors refunded"
            );
            Ok(RefundReport {
                campaign_id: *campaign_id,
                total,
                payouts,
            })
        })
    }

    /// Claim a refund parked under a commitment by revealing its opening
    #[instrument(skip(self, commitment, opening))]
    pub fn claim_private_refund(
        &self,
        commitment: &Hash32,
        opening: &CommitmentOpening,
        recipient: &str,
    ) -> Result<Decimal> {
        let amount = self.commitments.claim_refund(commitment, opening)?;
        let balance = self.accounts.credit(recipient, amount);
        info!(
            recipient = %recipient,
            amount = %amount,
            balance = %balance,
            "Private refund claimed"
        );
        Ok(amount)
    }

    // ============ ADMIN ============

    /// Circuit breaker halting contributions, submissions, and releases.
    /// Past releases are untouched.
    #[instrument(skip(self))]
    pub fn emergency_stop(&self, campaign_id: &CampaignId, stop: bool, caller: &str) -> Result<Campaign> {
        if !self.config.is_admin(caller) {
            return Err(AuthorizationError::NotAdmin {
                caller: caller.to_string(),
            }
            .into());
        }
        self.with_campaign(campaign_id, |campaign, now| {
            if campaign.emergency_stopped != stop {
                campaign.emergency_stopped = stop;
                campaign.touch(now);
            }
            warn!(
                campaign_id = %campaign_id,
                stopped = stop,
                admin = %caller,
                "Emergency stop toggled"
            );
            Ok(campaign.clone())
        })
    }

    /// Open an authenticity request for the campaign itself
    #[instrument(skip(self, evidence_hash))]
    pub fn request_campaign_verification(
        &self,
        campaign_id: &CampaignId,
        evidence_hash: Hash32,
        caller: &str,
    ) -> Result<(VerificationRequest, Campaign)> {
        self.with_campaign(campaign_id, |campaign, now| {
            Self::require_creator(campaign, caller)?;
            if campaign.authenticity_request.is_some() && campaign.authenticity_verified.is_none() {
                return Err(StateError::VerificationPending.into());
            }

            let request = self.oracle.open_request(
                VerificationTarget {
                    campaign_id: *campaign_id,
                    milestone_index: None,
                },
                evidence_hash,
            )?;
            campaign.authenticity_request = Some(request.id);
            campaign.authenticity_verified = None;
            campaign.touch(now);

            info!(
                campaign_id = %campaign_id,
                request_id = %request.id,
                "Campaign authenticity verification requested"
            );
            Ok((request, campaign.clone()))
        })
    }

    // ============ READS ============

    /// Snapshot with verification results folded in
    pub fn get_campaign(&self, campaign_id: &CampaignId) -> Result<Campaign> {
        let handle = self.handle(campaign_id)?;
        let mut snapshot = handle.lock().clone();
        self.sync_resolutions(&mut snapshot);
        Ok(snapshot)
    }

    pub fn get_milestone(&self, campaign_id: &CampaignId, index: usize) -> Result<Milestone> {
        self.get_campaign(campaign_id)?
            .milestones
            .get(index)
            .cloned()
            .ok_or_else(|| {
                NotFoundError::Milestone {
                    campaign_id: campaign_id.to_string(),
                    index,
                }
                .into()
            })
    }

    /// Every campaign, oldest first
    pub fn list_campaigns(&self) -> Vec<Campaign> {
        let ids: Vec<CampaignId> = self.campaigns.iter().map(|e| *e.key()).collect();
        let mut campaigns: Vec<Campaign> = ids
            .iter()
            .filter_map(|id| self.get_campaign(id).ok())
            .collect();
        campaigns.sort_by_key(|c| (c.created_at, c.id));
        campaigns
    }

    pub fn account_balance(&self, identity: &str) -> Decimal {
        self.accounts.balance(identity)
    }

    pub fn len(&self) -> usize {
        self.campaigns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.campaigns.is_empty()
    }
}
