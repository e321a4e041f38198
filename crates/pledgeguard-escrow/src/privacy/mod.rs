//! Privacy-preserving contribution layer
//!
//! Binds hidden contribution amounts to public escrow credits through
//! commitment/nullifier pairs.

pub mod registry;

pub use registry::CommitmentRegistry;
