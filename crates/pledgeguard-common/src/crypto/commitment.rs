//! Pedersen-style commitments built on BLAKE3
//!
//! ```text
//! commitment     = H_commit(len(amount) || amount || secret || nullifier)
//! nullifier_hash = H_null(nullifier)
//! ```
//!
//! Each hash uses BLAKE3 key derivation with its own context string, so a
//! commitment can never collide with a nullifier hash. Amounts are encoded in
//! normalized decimal form (`10.0` and `10` commit identically).

use rand::rngs::OsRng;
use rand::RngCore;
use rust_decimal::Decimal;

use crate::types::commitment::CommitmentOpening;
use crate::types::Hash32;

const COMMITMENT_CONTEXT: &str = "pledgeguard 2024-06 contribution commitment v1";
const NULLIFIER_CONTEXT: &str = "pledgeguard 2024-06 nullifier hash v1";

/// Digest binding a hidden amount to a secret and nullifier
pub fn commit(amount: Decimal, secret: &Hash32, nullifier: &Hash32) -> Hash32 {
    let encoded = amount.normalize().to_string();
    let mut hasher = blake3::Hasher::new_derive_key(COMMITMENT_CONTEXT);
    hasher.update(&(encoded.len() as u32).to_le_bytes());
    hasher.update(encoded.as_bytes());
    hasher.update(secret);
    hasher.update(nullifier);
    *hasher.finalize().as_bytes()
}

/// Public tag of a nullifier; revealing it marks the pledge as used
pub fn nullifier_hash(nullifier: &Hash32) -> Hash32 {
    let mut hasher = blake3::Hasher::new_derive_key(NULLIFIER_CONTEXT);
    hasher.update(nullifier);
    *hasher.finalize().as_bytes()
}

/// Fresh 32 random bytes for secrets and nullifiers
pub fn random_bytes() -> Hash32 {
    let mut out = [0u8; 32];
    OsRng.fill_bytes(&mut out);
    out
}

impl CommitmentOpening {
    /// New opening with random secret and nullifier
    pub fn random(amount: Decimal) -> Self {
        Self {
            amount,
            secret: random_bytes(),
            nullifier: random_bytes(),
        }
    }

    pub fn commitment(&self) -> Hash32 {
        commit(self.amount, &self.secret, &self.nullifier)
    }

    pub fn nullifier_hash(&self) -> Hash32 {
        nullifier_hash(&self.nullifier)
    }

    /// Does this opening reproduce `commitment`
    pub fn opens(&self, commitment: &Hash32) -> bool {
        &self.commitment() == commitment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_commitment_binding() {
        let opening = CommitmentOpening::random(dec!(25));
        let c = opening.commitment();
        assert!(opening.opens(&c));

        let mut other = opening.clone();
        other.amount = dec!(26);
        assert!(!other.opens(&c));

        let mut other = opening.clone();
        other.secret[0] ^= 1;
        assert!(!other.opens(&c));
    }

    #[test]
    fn test_amount_normalized() {
        let secret = [1u8; 32];
        let nullifier = [2u8; 32];
        assert_eq!(
            commit(dec!(10.0), &secret, &nullifier),
            commit(dec!(10), &secret, &nullifier)
        );
    }

    #[test]
    fn test_domain_separation() {
        let x = [3u8; 32];
        assert_ne!(nullifier_hash(&x), commit(Decimal::ZERO, &x, &x));
        assert_ne!(random_bytes(), random_bytes());
    }
}
