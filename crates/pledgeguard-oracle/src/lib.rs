//! # PledgeGuard Oracle
//!
//! Staked oracle network deciding whether a submitted deliverable satisfies
//! its milestone.
//!
//! ## Components
//!
//! - **Registry**: node registration, stake, active flag, reputation
//! - **Verification**: per-request vote records with dedup
//! - **Consensus**: quorum rules and the `Open → Resolved` state machine
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ConsensusEngine                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐ │
//! │  │   Quorum    │  │  Request    │  │   Stake Registry    │ │
//! │  │   rules     │──│   Store     │──│ (nodes, reputation) │ │
//! │  │             │  │ (per-lock)  │  │                     │ │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod consensus;
pub mod params;
pub mod registry;
pub mod verification;

pub use consensus::{ConsensusEngine, QuorumManager};
pub use params::{OracleParams, StakeReclaimPolicy};
pub use registry::{Settlement, StakeRegistry};
pub use verification::RequestStore;
