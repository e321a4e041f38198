//! # PledgeGuard Escrow
//!
//! Milestone-gated escrow for crowdfunded campaigns.
//!
//! ## Components
//!
//! - **Ledger**: campaigns, contributions, releases, withdrawals, refunds
//! - **Privacy**: commitment/nullifier registry for hidden-amount pledges
//! - **Protocol**: facade wiring ledger, oracle, and registry together
//!
//! ## Flow
//!
//! ```text
//! create ─► contribute ─► Funded ─► submit deliverable ─► oracle votes
//!                                                           │
//!              refund ◄── Rejected / deadline ◄─────────────┤
//!                                                           ▼
//!                           withdraw ◄── release ◄──── Verified
//! ```

pub mod config;
pub mod ledger;
pub mod privacy;
pub mod protocol;

pub use config::EscrowConfig;
pub use ledger::{pro_rata, Accounts, EscrowLedger, NewCampaign, RefundPayout, RefundReport};
pub use privacy::CommitmentRegistry;
pub use protocol::{Payout, Protocol};
