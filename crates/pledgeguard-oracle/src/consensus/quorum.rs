//! Quorum rules for resolving a verification request
//!
//! Two ways out of `Open`:
//! - early: at least `min_votes` cast and the heavier side holds at least
//!   `threshold` of the voted stake
//! - deadline: simple majority by vote count; ties and empty tallies fail

use pledgeguard_common::VerificationRequest;
use rust_decimal::Decimal;

use crate::params::OracleParams;

/// Quorum decision rules
#[derive(Debug, Clone)]
pub struct QuorumManager {
    min_votes: u32,
    threshold: Decimal,
}

impl QuorumManager {
    pub fn new(min_votes: u32, threshold: Decimal) -> Self {
        Self {
            min_votes,
            threshold,
        }
    }

    pub fn from_params(params: &OracleParams) -> Self {
        Self::new(params.min_votes_required, params.consensus_threshold)
    }

    /// Early resolution while voting is open. `None` keeps the request open.
    pub fn evaluate(&self, request: &VerificationRequest) -> Option<bool> {
        if request.total_votes() < self.min_votes {
            return None;
        }

        let staked = request.stake_for > Decimal::ZERO || request.stake_against > Decimal::ZERO;
        let (winner, winning_share) = if staked {
            if request.stake_for == request.stake_against {
                return None;
            }
            let approve = request.stake_for > request.stake_against;
            let winning = if approve {
                request.stake_for
            } else {
                request.stake_against
            };
            (approve, stake_share(winning, request.stake_for, request.stake_against))
        } else {
            // Zero-stake tallies fall back to head count
            if request.votes_for == request.votes_against {
                return None;
            }
            let approve = request.votes_for > request.votes_against;
            let winning = request.votes_for.max(request.votes_against);
            (
                approve,
                Decimal::from(winning) / Decimal::from(request.total_votes()),
            )
        };

        (winning_share >= self.threshold).then_some(winner)
    }

    /// Result once the voting period elapsed
    pub fn deadline_result(&self, request: &VerificationRequest) -> bool {
        request.votes_for > request.votes_against
    }
}

/// `winning / (a + b)`, halving both sides when the sum does not fit
fn stake_share(winning: Decimal, a: Decimal, b: Decimal) -> Decimal {
    match a.checked_add(b) {
        Some(total) => winning / total,
        None => (winning / Decimal::TWO) / (a / Decimal::TWO + b / Decimal::TWO),
    }
}
