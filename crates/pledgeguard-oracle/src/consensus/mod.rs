//! Consensus module - stake-weighted oracle voting
//!
//! This module provides:
//! - Quorum rules (early stake-weighted resolution, deadline majority)
//! - The consensus engine driving each request to a boolean result

pub mod engine;
pub mod quorum;

pub use engine::ConsensusEngine;
pub use quorum::QuorumManager;
