//! Range attestations for private contributions
//!
//! The ledger never sees a private amount. Instead a trusted attester (the
//! payment processor that actually received the funds) checks the opening
//! off-ledger and signs:
//!
//! ```text
//! "pledgeguard/range/v1" || commitment || nullifier_hash || len(bound) || bound
//! ```
//!
//! Proof payload layout: `attester_key (32) || signature (64)`.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rust_decimal::Decimal;
use std::collections::HashSet;

use crate::types::commitment::{CommitmentOpening, ContributionProof};
use crate::types::Hash32;

const DOMAIN: &[u8] = b"pledgeguard/range/v1";
const PAYLOAD_LEN: usize = 32 + 64;

/// Pluggable proof system for hidden-amount contributions
pub trait ProofVerifier: Send + Sync {
    /// True iff `proof` attests the amount behind `commitment` is ≥ `min_amount`
    fn verify(&self, commitment: &Hash32, proof: &ContributionProof, min_amount: Decimal) -> bool;
}

fn message(commitment: &Hash32, nullifier_hash: &Hash32, bound: Decimal) -> Vec<u8> {
    let bound = bound.normalize().to_string();
    let mut msg = Vec::with_capacity(DOMAIN.len() + 64 + 4 + bound.len());
    msg.extend_from_slice(DOMAIN);
    msg.extend_from_slice(commitment);
    msg.extend_from_slice(nullifier_hash);
    msg.extend_from_slice(&(bound.len() as u32).to_le_bytes());
    msg.extend_from_slice(bound.as_bytes());
    msg
}

/// Signs range attestations after checking an opening
pub struct RangeAttester {
    signing_key: SigningKey,
}

impl RangeAttester {
    pub fn new(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    pub fn generate() -> Self {
        Self::new(SigningKey::generate(&mut rand::rngs::OsRng))
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Attest `opening.amount >= bound`. Returns `None` when it does not hold.
    pub fn attest(&self, opening: &CommitmentOpening, bound: Decimal) -> Option<ContributionProof> {
        if opening.amount < bound || bound <= Decimal::ZERO {
            return None;
        }
        let commitment = opening.commitment();
        let nullifier_hash = opening.nullifier_hash();
        let signature = self
            .signing_key
            .sign(&message(&commitment, &nullifier_hash, bound));

        let mut payload = Vec::with_capacity(PAYLOAD_LEN);
        payload.extend_from_slice(self.verifying_key().as_bytes());
        payload.extend_from_slice(&signature.to_bytes());

        Some(ContributionProof {
            nullifier_hash,
            payload,
        })
    }
}

/// Accepts attestations signed by any key in a trusted set
#[derive(Debug, Default, Clone)]
pub struct AttestationVerifier {
    trusted: HashSet<[u8; 32]>,
}

impl AttestationVerifier {
    pub fn new<I: IntoIterator<Item = VerifyingKey>>(keys: I) -> Self {
        Self {
            trusted: keys.into_iter().map(|k| k.to_bytes()).collect(),
        }
    }

    /// Build from hex-encoded public keys (configuration input)
    pub fn from_hex_keys<S: AsRef<str>>(keys: &[S]) -> Result<Self, String> {
        let mut parsed = Vec::with_capacity(keys.len());
        for key in keys {
            let bytes = crate::types::parse_hash32(key.as_ref())?;
            let vk = VerifyingKey::from_bytes(&bytes).map_err(|e| e.to_string())?;
            parsed.push(vk);
        }
        Ok(Self::new(parsed))
    }

    pub fn trusted_count(&self) -> usize {
        self.trusted.len()
    }
}

impl ProofVerifier for AttestationVerifier {
    fn verify(&self, commitment: &Hash32, proof: &ContributionProof, min_amount: Decimal) -> bool {
        if proof.payload.len() != PAYLOAD_LEN {
            return false;
        }
        let mut key_bytes = [0u8; 32];
        key_bytes.copy_from_slice(&proof.payload[..32]);
        if !self.trusted.contains(&key_bytes) {
            return false;
        }
        let Ok(key) = VerifyingKey::from_bytes(&key_bytes) else {
            return false;
        };
        let mut sig_bytes = [0u8; 64];
        sig_bytes.copy_from_slice(&proof.payload[32..]);
        let signature = Signature::from_bytes(&sig_bytes);

        key.verify(
            &message(commitment, &proof.nullifier_hash, min_amount),
            &signature,
        )
        .is_ok()
    }
}
