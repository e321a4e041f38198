//! Commitment registry
//!
//! Registration, spending, and private refund claims all go through one
//! mutex. A commitment and its nullifier hash are checked and inserted in the
//! same critical section, so no nullifier hash is ever accepted twice.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use pledgeguard_common::{
    Clock, CommitmentOpening, CommitmentRecord, ContributionProof, Hash32, NotFoundError,
    ProofVerifier, Result, StateError, ValidationError,
};
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Default)]
struct RegistryState {
    commitments: HashMap<Hash32, CommitmentRecord>,
    /// nullifier hash -> commitment
    nullifiers: HashMap<Hash32, Hash32>,
    /// Refund shares parked for private contributors
    refunds: HashMap<Hash32, Decimal>,
}

/// Registered commitments and their spend state
pub struct CommitmentRegistry {
    state: Mutex<RegistryState>,
    verifier: Arc<dyn ProofVerifier>,
    clock: Arc<dyn Clock>,
}

impl CommitmentRegistry {
    pub fn new(verifier: Arc<dyn ProofVerifier>, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            verifier,
            clock,
        }
    }

    /// Register a commitment with the lower bound its proof will attest
    pub fn register(
        &self,
        commitment: Hash32,
        min_amount: Decimal,
        nullifier_hash: Hash32,
    ) -> Result<CommitmentRecord> {
        if min_amount <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount(min_amount).into());
        }

        let mut state = self.state.lock();
        if state.commitments.contains_key(&commitment) {
            return Err(StateError::CommitmentReused.into());
        }
        if state.nullifiers.contains_key(&nullifier_hash) {
            return Err(StateError::NullifierReused.into());
        }

        let record = CommitmentRecord {
            commitment,
            min_amount,
            nullifier_hash,
            used: false,
            registered_at: self.clock.now_millis(),
            spent_in: None,
            spent_at: None,
        };
        state.nullifiers.insert(nullifier_hash, commitment);
        state.commitments.insert(commitment, record.clone());

        info!(
            commitment = %hex::encode(commitment),
            min_amount = %min_amount,
            "Commitment registered"
        );
        Ok(record)
    }

    /// Check a proof against a registered commitment without spending it
    pub fn verify_proof(
        &self,
        commitment: &Hash32,
        proof: &ContributionProof,
        min_amount: Decimal,
    ) -> bool {
        let state = self.state.lock();
        match state.commitments.get(commitment) {
            Some(record) => self.proof_binds(record, commitment, proof, min_amount),
            None => false,
        }
    }

    fn proof_binds(
        &self,
        record: &CommitmentRecord,
        commitment: &Hash32,
        proof: &ContributionProof,
        amount: Decimal,
    ) -> bool {
        proof.nullifier_hash == record.nullifier_hash
            && self.verifier.verify(commitment, proof, amount)
    }

    /// Validate and consume a commitment for a private contribution of
    /// `amount` into `campaign_id`. Nothing changes on failure.
    pub fn spend(
        &self,
        commitment: &Hash32,
        proof: &ContributionProof,
        amount: Decimal,
        campaign_id: Uuid,
    ) -> Result<CommitmentRecord> {
        let mut state = self.state.lock();
        let record = state
            .commitments
            .get(commitment)
            .ok_or_else(|| NotFoundError::Commitment(hex::encode(commitment)))?;

        if record.used {
            return Err(StateError::CommitmentSpent.into());
        }
        if amount < record.min_amount {
            return Err(ValidationError::BelowCommitmentBound {
                amount,
                min_amount: record.min_amount,
            }
            .into());
        }
        if !self.proof_binds(record, commitment, proof, amount) {
            return Err(ValidationError::InvalidProof.into());
        }

        let now = self.clock.now_millis();
        let record = state
            .commitments
            .get_mut(commitment)
            .ok_or_else(|| NotFoundError::Commitment(hex::encode(commitment)))?;
        record.used = true;
        record.spent_in = Some(campaign_id);
        record.spent_at = Some(now);

        debug!(
            commitment = %hex::encode(commitment),
            campaign_id = %campaign_id,
            "Commitment spent"
        );
        Ok(record.clone())
    }

    pub fn get(&self, commitment: &Hash32) -> Option<CommitmentRecord> {
        self.state.lock().commitments.get(commitment).cloned()
    }

    /// Park a refund share for the holder of the commitment's opening
    pub fn park_refund(&self, commitment: Hash32, amount: Decimal) {
        if amount <= Decimal::ZERO {
            return;
        }
        *self
            .state
            .lock()
            .refunds
            .entry(commitment)
            .or_insert(Decimal::ZERO) += amount;
    }

    pub fn pending_refund(&self, commitment: &Hash32) -> Decimal {
        self.state
            .lock()
            .refunds
            .get(commitment)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Take the parked refund for `commitment`. The opening must reproduce it.
    pub fn claim_refund(&self, commitment: &Hash32, opening: &CommitmentOpening) -> Result<Decimal> {
        if !opening.opens(commitment) {
            return Err(ValidationError::OpeningMismatch.into());
        }
        self.state
            .lock()
            .refunds
            .remove(commitment)
            .filter(|amount| *amount > Decimal::ZERO)
            .ok_or_else(|| NotFoundError::PrivateRefund(hex::encode(commitment)).into())
    }

    pub fn len(&self) -> usize {
        self.state.lock().commitments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
