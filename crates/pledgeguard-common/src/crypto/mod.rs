//! Cryptographic primitives for private contributions
//!
//! This module provides:
//! - BLAKE3 commitments and nullifier hashes
//! - Ed25519 range attestations and the pluggable `ProofVerifier` seam

pub mod attestation;
pub mod commitment;

// Re-export commonly used items
pub use attestation::{AttestationVerifier, ProofVerifier, RangeAttester};
pub use commitment::{commit, nullifier_hash, random_bytes};
