//! Campaign, Milestone, Contribution - the escrow ledger records
//!
//! A campaign holds every pledged unit in escrow until one of two things
//! happens to it:
//! - its milestone is verified and released to the creator's claimable balance
//! - it is refunded pro-rata to the contributions that funded it
//!
//! Balance bookkeeping (all amounts in the same unit):
//! - `raised_amount == Σ contribution.net()`
//! - `escrow_balance == raised_amount - released_total`
//! - `creator_claimable + withdrawn_total == released_total`

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::{hex32, hex32_opt, Hash32};
use crate::error::{ProtocolError, StateError, ValidationError};

/// Campaign identifier
pub type CampaignId = Uuid;

/// Campaign lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CampaignStatus {
    /// Accepting contributions
    Active,
    /// Funding goal reached; milestones may be submitted
    Funded,
    /// Every milestone released
    Completed,
    /// Remaining escrow returned to contributors
    Refunded,
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Milestone verification lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MilestoneStatus {
    Pending,
    Submitted,
    Verified,
    Rejected,
}

impl fmt::Display for MilestoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Milestone definition supplied at campaign creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilestoneSpec {
    pub description: String,
    pub fund_amount: Decimal,
    /// Unix milliseconds
    pub deadline: i64,
}

/// Deliverable tied to a portion of the escrow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    /// Position in the campaign's ordered milestone list
    pub index: usize,
    pub description: String,
    pub fund_amount: Decimal,
    pub deadline: i64,
    pub status: MilestoneStatus,
    pub funds_released: bool,
    /// Funds were returned to contributors instead of released
    #[serde(default)]
    pub refunded: bool,
    /// Content-addressed deliverable reference, never interpreted
    #[serde(with = "hex32_opt", default)]
    pub deliverable_hash: Option<Hash32>,
    pub request_id: Option<Uuid>,
    pub submitted_at: Option<i64>,
    pub released_at: Option<i64>,
}

impl Milestone {
    pub fn from_spec(index: usize, spec: MilestoneSpec) -> Self {
        Self {
            index,
            description: spec.description,
            fund_amount: spec.fund_amount,
            deadline: spec.deadline,
            status: MilestoneStatus::Pending,
            funds_released: false,
            refunded: false,
            deliverable_hash: None,
            request_id: None,
            submitted_at: None,
            released_at: None,
        }
    }

    /// Verified but not yet paid out
    pub fn is_reserved(&self) -> bool {
        self.status == MilestoneStatus::Verified && !self.funds_released && !self.refunded
    }

    pub fn is_resolved(&self) -> bool {
        matches!(
            self.status,
            MilestoneStatus::Verified | MilestoneStatus::Rejected
        )
    }
}

/// Who funded a contribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Contributor {
    /// Attributed to an identity
    Public { identity: String },
    /// Only the commitment digest is known
    Private {
        #[serde(with = "hex32")]
        commitment: Hash32,
    },
}

impl Contributor {
    pub fn identity(&self) -> Option<&str> {
        match self {
            Contributor::Public { identity } => Some(identity),
            Contributor::Private { .. } => None,
        }
    }
}

/// A pledge credited to escrow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contribution {
    pub id: Uuid,
    pub campaign_id: CampaignId,
    pub contributor: Contributor,
    pub amount: Decimal,
    /// Portion already returned by a refund
    pub refunded: Decimal,
    pub timestamp: i64,
}

impl Contribution {
    /// Amount still counted toward the campaign
    #[inline]
    pub fn net(&self) -> Decimal {
        self.amount - self.refunded
    }
}

/// Milestone-gated funding request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub creator: String,
    pub title: String,
    pub description: String,
    pub funding_goal: Decimal,
    pub raised_amount: Decimal,
    pub escrow_balance: Decimal,
    pub released_total: Decimal,
    /// Released to the creator but not yet withdrawn
    pub creator_claimable: Decimal,
    pub withdrawn_total: Decimal,
    pub refunded_total: Decimal,
    pub deadline: i64,
    pub status: CampaignStatus,
    pub emergency_stopped: bool,
    pub milestones: Vec<Milestone>,
    pub contributions: Vec<Contribution>,
    /// Campaign-level authenticity request, if one was opened
    pub authenticity_request: Option<Uuid>,
    pub authenticity_verified: Option<bool>,
    pub created_at: i64,
    pub updated_at: i64,
    /// Bumped on every mutation
    pub version: u64,
}

impl Campaign {
    /// Build a new active campaign. Parameter validation is the ledger's job.
    pub fn new(
        creator: String,
        title: String,
        description: String,
        funding_goal: Decimal,
        deadline: i64,
        milestones: Vec<MilestoneSpec>,
        now: i64,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            creator,
            title,
            description,
            funding_goal,
            raised_amount: Decimal::ZERO,
            escrow_balance: Decimal::ZERO,
            released_total: Decimal::ZERO,
            creator_claimable: Decimal::ZERO,
            withdrawn_total: Decimal::ZERO,
            refunded_total: Decimal::ZERO,
            deadline,
            status: CampaignStatus::Active,
            emergency_stopped: false,
            milestones: milestones
                .into_iter()
                .enumerate()
                .map(|(i, spec)| Milestone::from_spec(i, spec))
                .collect(),
            contributions: Vec::new(),
            authenticity_request: None,
            authenticity_verified: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.deadline
    }

    /// Goal not yet covered by contributions
    pub fn remaining_goal(&self) -> Decimal {
        (self.funding_goal - self.raised_amount).max(Decimal::ZERO)
    }

    /// Sum of recorded contributions net of refunds
    pub fn contributed_total(&self) -> Decimal {
        self.contributions.iter().map(Contribution::net).sum()
    }

    /// Escrow earmarked for verified, unreleased milestones
    pub fn reserved_escrow(&self) -> Decimal {
        self.milestones
            .iter()
            .filter(|m| m.is_reserved())
            .map(|m| m.fund_amount)
            .sum()
    }

    /// Escrow a refund may return
    pub fn refundable_escrow(&self) -> Decimal {
        (self.escrow_balance - self.reserved_escrow()).max(Decimal::ZERO)
    }

    pub fn all_milestones_resolved(&self) -> bool {
        self.milestones.iter().all(Milestone::is_resolved)
    }

    pub fn milestone(&self, index: usize) -> Option<&Milestone> {
        self.milestones.get(index)
    }

    pub fn milestone_mut(&mut self, index: usize) -> Option<&mut Milestone> {
        self.milestones.get_mut(index)
    }

    /// Credit a contribution into escrow.
    ///
    /// Reaching the goal flips the campaign to `Funded`.
    pub fn credit(&mut self, contribution: Contribution, now: i64) -> Result<(), ValidationError> {
        if contribution.amount <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount(contribution.amount));
        }
        let remaining = self.remaining_goal();
        if contribution.amount > remaining {
            return Err(ValidationError::ExceedsGoal {
                amount: contribution.amount,
                remaining,
            });
        }

        self.raised_amount += contribution.amount;
        self.escrow_balance += contribution.amount;
        self.contributions.push(contribution);

        if self.raised_amount == self.funding_goal {
            self.status = CampaignStatus::Funded;
        }
        self.touch(now);
        Ok(())
    }

    /// Move a verified milestone's funds from escrow to the creator's
    /// claimable balance. Check and flag flip happen together.
    pub fn release_milestone(&mut self, index: usize, now: i64) -> Result<Decimal, ProtocolError> {
        let escrow = self.escrow_balance;
        let milestone = self
            .milestones
            .get_mut(index)
            .ok_or(StateError::NotVerified { index })?;

        if milestone.funds_released {
            return Err(StateError::AlreadyReleased { index }.into());
        }
        if milestone.refunded {
            return Err(StateError::CampaignClosed {
                status: self.status.to_string(),
            }
            .into());
        }
        if milestone.status != MilestoneStatus::Verified {
            return Err(StateError::NotVerified { index }.into());
        }
        let amount = milestone.fund_amount;
        if escrow < amount {
            // Reserved funds always stay in escrow
            return Err(ProtocolError::Internal(format!(
                "campaign {} escrow {escrow} below reserved milestone {index} amount {amount}",
                self.id
            )));
        }

        milestone.funds_released = true;
        milestone.released_at = Some(now);

        self.escrow_balance -= amount;
        self.released_total += amount;
        self.creator_claimable += amount;

        if self.milestones.iter().all(|m| m.funds_released) {
            self.status = CampaignStatus::Completed;
        }
        self.touch(now);
        Ok(amount)
    }

    /// Drain the creator's claimable balance
    pub fn take_claimable(&mut self, now: i64) -> Decimal {
        let amount = self.creator_claimable;
        if amount > Decimal::ZERO {
            self.creator_claimable = Decimal::ZERO;
            self.withdrawn_total += amount;
            self.touch(now);
        }
        amount
    }

    /// Apply per-contribution refund shares computed by the ledger.
    ///
    /// Every milestone that is neither released nor reserved loses its funds
    /// to the refund and can no longer be released.
    pub fn apply_refund(&mut self, shares: &[(usize, Decimal)], now: i64) -> Decimal {
        for m in self.milestones.iter_mut() {
            if !m.funds_released && !m.is_reserved() {
                m.refunded = true;
            }
        }
        let mut total = Decimal::ZERO;
        for (pos, share) in shares {
            if let Some(c) = self.contributions.get_mut(*pos) {
                c.refunded += *share;
                total += *share;
            }
        }
        self.raised_amount -= total;
        self.escrow_balance -= total;
        self.refunded_total += total;
        self.status = CampaignStatus::Refunded;
        self.touch(now);
        total
    }

    /// Bookkeeping identities that must hold after every transaction
    pub fn balances_consistent(&self) -> bool {
        self.raised_amount == self.contributed_total()
            && self.escrow_balance == self.raised_amount - self.released_total
            && self.creator_claimable + self.withdrawn_total == self.released_total
            && self.escrow_balance >= Decimal::ZERO
    }

    pub fn touch(&mut self, now: i64) {
        self.version += 1;
        self.updated_at = now;
    }
}

impl fmt::Display for Campaign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Campaign({}, status={}, raised={}/{}, escrow={})",
            self.id, self.status, self.raised_amount, self.funding_goal, self.escrow_balance
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn campaign() -> Campaign {
        Campaign::new(
            "creator".to_string(),
            "Solar kiln".to_string(),
            String::new(),
            dec!(10.0),
            10_000,
            vec![
                MilestoneSpec {
                    description: "prototype".to_string(),
                    fund_amount: dec!(4.0),
                    deadline: 5_000,
                },
                MilestoneSpec {
                    description: "production".to_string(),
                    fund_amount: dec!(6.0),
                    deadline: 10_000,
                },
            ],
            0,
        )
    }

    fn pledge(c: &Campaign, who: &str, amount: Decimal) -> Contribution {
        Contribution {
            id: Uuid::now_v7(),
            campaign_id: c.id,
            contributor: Contributor::Public {
                identity: who.to_string(),
            },
            amount,
            refunded: Decimal::ZERO,
            timestamp: 1,
        }
    }

    #[test]
    fn test_credit_until_funded() {
        let mut c = campaign();
        let p = pledge(&c, "alice", dec!(7));
        c.credit(p, 1).unwrap();
        assert_eq!(c.status, CampaignStatus::Active);
        assert_eq!(c.remaining_goal(), dec!(3));

        let over = pledge(&c, "bob", dec!(4));
        assert!(matches!(
            c.credit(over, 2),
            Err(ValidationError::ExceedsGoal { .. })
        ));

        let p = pledge(&c, "bob", dec!(3));
        c.credit(p, 3).unwrap();
        assert_eq!(c.status, CampaignStatus::Funded);
        assert!(c.balances_consistent());
    }

    #[test]
    fn test_release_once() {
        let mut c = campaign();
        let p = pledge(&c, "alice", dec!(10));
        c.credit(p, 1).unwrap();

        assert_eq!(
            c.release_milestone(0, 2),
            Err(StateError::NotVerified { index: 0 }.into())
        );

        c.milestones[0].status = MilestoneStatus::Verified;
        assert_eq!(c.reserved_escrow(), dec!(4));
        assert_eq!(c.refundable_escrow(), dec!(6));

        assert_eq!(c.release_milestone(0, 3).unwrap(), dec!(4));
        assert_eq!(
            c.release_milestone(0, 4),
            Err(StateError::AlreadyReleased { index: 0 }.into())
        );
        assert_eq!(c.escrow_balance, dec!(6));
        assert_eq!(c.creator_claimable, dec!(4));
        assert!(c.balances_consistent());

        assert_eq!(c.take_claimable(5), dec!(4));
        assert_eq!(c.take_claimable(6), Decimal::ZERO);
        assert!(c.balances_consistent());
    }

    #[test]
    fn test_release_with_short_escrow_is_internal() {
        let mut c = campaign();
        let p = pledge(&c, "alice", dec!(10));
        c.credit(p, 1).unwrap();
        c.milestones[0].status = MilestoneStatus::Verified;
        c.escrow_balance = dec!(1);

        assert!(matches!(
            c.release_milestone(0, 2),
            Err(ProtocolError::Internal(_))
        ));
        assert!(!c.milestones[0].funds_released);
        assert_eq!(c.creator_claimable, Decimal::ZERO);
    }

    #[test]
    fn test_apply_refund() {
        let mut c = campaign();
        let a = pledge(&c, "alice", dec!(4));
        let b = pledge(&c, "bob", dec!(6));
        c.credit(a, 1).unwrap();
        c.credit(b, 2).unwrap();

        let total = c.apply_refund(&[(0, dec!(4)), (1, dec!(6))], 3);
        assert_eq!(total, dec!(10));
        assert_eq!(c.raised_amount, Decimal::ZERO);
        assert_eq!(c.status, CampaignStatus::Refunded);
        assert!(c.balances_consistent());
    }
}
