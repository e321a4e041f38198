//! Escrow ledger: campaigns, fund movement, payouts

pub mod accounts;
pub mod escrow;
pub mod refund;

pub use accounts::Accounts;
pub use escrow::{EscrowLedger, NewCampaign, RefundPayout, RefundReport};
pub use refund::pro_rata;
