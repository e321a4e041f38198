//! Error types for the PledgeGuard protocol
//!
//! Every fallible operation returns one of five categories. The category is
//! what callers branch on; the inner variant carries the detail.

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type alias using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Unified error type for protocol operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    // Bad parameters
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // Wrong caller
    #[error("Authorization error: {0}")]
    Authorization(#[from] AuthorizationError),

    // Invalid for the current lifecycle state
    #[error("State error: {0}")]
    State(#[from] StateError),

    // Unknown id
    #[error("Not found: {0}")]
    NotFound(#[from] NotFoundError),

    // Insufficient stake or balance
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    // Ledger corruption or id collision
    #[error("Internal error: {0}")]
    Internal(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProtocolError {
    /// Stable category name, used by the HTTP surface and metrics labels
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolError::Validation(_) => "validation",
            ProtocolError::Authorization(_) => "authorization",
            ProtocolError::State(_) => "state",
            ProtocolError::NotFound(_) => "not_found",
            ProtocolError::Resource(_) => "resource",
            ProtocolError::Internal(_) => "internal",
            ProtocolError::Config(_) => "config",
        }
    }
}

/// Parameter validation failures
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    #[error("Deadline {deadline} is not after now ({now})")]
    DeadlineInPast { deadline: i64, now: i64 },

    #[error("Milestone amounts sum to {sum}, funding goal is {goal}")]
    MilestoneSumMismatch { sum: Decimal, goal: Decimal },

    #[error("Campaign must have at least one milestone")]
    NoMilestones,

    #[error("Milestone {index} deadline {deadline} is outside ({now}, {campaign_deadline}]")]
    MilestoneDeadline {
        index: usize,
        deadline: i64,
        now: i64,
        campaign_deadline: i64,
    },

    #[error("Milestone deadlines must be non-decreasing (milestone {index})")]
    MilestoneOrder { index: usize },

    #[error("Contribution {amount} exceeds remaining goal {remaining}")]
    ExceedsGoal { amount: Decimal, remaining: Decimal },

    #[error("Private contribution {amount} is below the commitment bound {min_amount}")]
    BelowCommitmentBound { amount: Decimal, min_amount: Decimal },

    #[error("Commitment opening does not match")]
    OpeningMismatch,

    #[error("Proof rejected by verifier")]
    InvalidProof,

    #[error("Invalid parameter {field}: {reason}")]
    InvalidParameter { field: &'static str, reason: String },
}

/// Caller is not allowed to perform the operation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthorizationError {
    #[error("{caller} is not the campaign creator")]
    NotCreator { caller: String },

    #[error("{caller} is not an administrator")]
    NotAdmin { caller: String },

    #[error("Node {node} is not eligible to vote (active={active}, reputation={reputation}, threshold={threshold})")]
    NotEligible {
        node: String,
        active: bool,
        reputation: u16,
        threshold: u16,
    },
}

/// Operation is invalid in the current lifecycle state
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StateError {
    #[error("Campaign is not accepting contributions (status {status})")]
    CampaignNotActive { status: String },

    #[error("Campaign deadline has passed")]
    CampaignExpired,

    #[error("Campaign is not funded (status {status})")]
    CampaignNotFunded { status: String },

    #[error("Campaign is closed (status {status})")]
    CampaignClosed { status: String },

    #[error("Campaign is under emergency stop")]
    EmergencyStopped,

    #[error("Milestone {index} is {status}, expected Pending")]
    MilestoneNotPending { index: usize, status: String },

    #[error("Milestone {index} deadline has passed")]
    MilestoneExpired { index: usize },

    #[error("Milestone {index} has not been verified")]
    NotVerified { index: usize },

    #[error("Milestone {index} funds already released")]
    AlreadyReleased { index: usize },

    #[error("Campaign is not refundable yet")]
    NotRefundable,

    #[error("Campaign has no refundable escrow")]
    NothingToRefund,

    #[error("Campaign authenticity request already open")]
    VerificationPending,

    #[error("Node {node} already voted on request {request_id}")]
    DuplicateVote { node: String, request_id: String },

    #[error("Voting on request {request_id} has closed")]
    VotingClosed { request_id: String },

    #[error("Voting on request {request_id} is still open")]
    VotingOpen { request_id: String },

    #[error("Request {request_id} is already resolved")]
    RequestResolved { request_id: String },

    #[error("Node {node} is already registered and active")]
    NodeAlreadyRegistered { node: String },

    #[error("Node {node} must be deactivated first")]
    NodeStillActive { node: String },

    #[error("Node {node} has votes on {open} open requests")]
    StakeLocked { node: String, open: usize },

    #[error("Commitment already registered")]
    CommitmentReused,

    #[error("Nullifier already used")]
    NullifierReused,

    #[error("Commitment already spent")]
    CommitmentSpent,
}

/// Unknown identifiers
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NotFoundError {
    #[error("Campaign {0}")]
    Campaign(String),

    #[error("Milestone {index} of campaign {campaign_id}")]
    Milestone { campaign_id: String, index: usize },

    #[error("Verification request {0}")]
    Request(String),

    #[error("Oracle node {0}")]
    Node(String),

    #[error("Commitment {0}")]
    Commitment(String),

    #[error("Refund for commitment {0}")]
    PrivateRefund(String),
}

/// Insufficient stake or balance
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResourceError {
    #[error("Insufficient stake: need {required}, have {available}")]
    InsufficientStake {
        required: Decimal,
        available: Decimal,
    },

    #[error("Insufficient balance: need {required}, have {available}")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },

    #[error("Stake reclamation disabled by policy")]
    StakeReclaimDisabled,

    #[error("Amount overflow in {field}")]
    AmountOverflow { field: &'static str },
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::Internal(err.to_string())
    }
}

impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        ProtocolError::Internal(err.to_string())
    }
}

impl From<anyhow::Error> for ProtocolError {
    fn from(err: anyhow::Error) -> Self {
        ProtocolError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_display() {
        let err = ProtocolError::NotFound(NotFoundError::Campaign("c-1".to_string()));
        assert!(err.to_string().contains("c-1"));
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_stake_error() {
        let err: ProtocolError = ResourceError::InsufficientStake {
            required: dec!(100),
            available: dec!(40),
        }
        .into();
        assert!(err.to_string().contains("need 100, have 40"));
        assert_eq!(err.kind(), "resource");
    }

    #[test]
    fn test_state_error_from() {
        let err: ProtocolError = StateError::NullifierReused.into();
        assert_eq!(err, ProtocolError::State(StateError::NullifierReused));
    }
}
