//! # PledgeGuard Common
//!
//! Shared types, errors, and cryptographic primitives for the PledgeGuard
//! milestone escrow protocol.
//!
//! ## Core Types
//!
//! - [`Campaign`]/[`Milestone`]/[`Contribution`]: escrow ledger records
//! - [`OracleNode`]: staked verifier with reputation
//! - [`VerificationRequest`]: per-deliverable vote tally
//! - [`CommitmentRecord`]: commitment/nullifier pair for private pledges
//! - [`Receipt`]: `{reference, state}` envelope returned by writes
//!
//! ## Crypto
//!
//! - [`crypto::commitment`]: BLAKE3 commitments and nullifier hashes
//! - [`crypto::attestation`]: Ed25519 range attestations, [`ProofVerifier`]
//!
//! ## Time
//!
//! - [`Clock`]: the single monotonic time source every component shares

pub mod clock;
pub mod crypto;
pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use clock::{Clock, ManualClock, SystemClock};
pub use crypto::ProofVerifier;
pub use error::{
    AuthorizationError, NotFoundError, ProtocolError, ResourceError, Result, StateError,
    ValidationError,
};
pub use types::{
    campaign::{
        Campaign, CampaignId, CampaignStatus, Contribution, Contributor, Milestone,
        MilestoneSpec, MilestoneStatus,
    },
    commitment::{CommitmentOpening, CommitmentRecord, ContributionProof},
    oracle::{
        NodeId, OracleNode, OracleStats, RequestId, ResolutionCause, VerificationRequest,
        VerificationTarget, VoteRecord, MAX_REPUTATION,
    },
    receipt::Receipt,
    Hash32,
};

/// PledgeGuard version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Decimal places amounts are rounded to when splitting refunds
pub const DEFAULT_AMOUNT_SCALE: u32 = 8;

/// Starting reputation for newly registered oracle nodes
pub const DEFAULT_INITIAL_REPUTATION: u16 = 500;

/// Default voting period (72 hours)
pub const DEFAULT_VOTING_PERIOD_MS: i64 = 72 * 60 * 60 * 1000;
