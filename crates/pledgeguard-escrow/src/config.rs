//! Escrow ledger configuration

use pledgeguard_common::{ValidationError, DEFAULT_AMOUNT_SCALE};
use serde::{Deserialize, Serialize};

/// Escrow ledger settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EscrowConfig {
    /// Decimal places amounts may carry; refund shares round toward zero here
    pub amount_scale: u32,
    /// Upper bound on milestones per campaign
    pub max_milestones: usize,
    /// Identities allowed on the admin surface
    pub admins: Vec<String>,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            amount_scale: DEFAULT_AMOUNT_SCALE,
            max_milestones: 32,
            admins: Vec::new(),
        }
    }
}

impl EscrowConfig {
    pub fn with_admins<I, S>(mut self, admins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.admins = admins.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_admin(&self, identity: &str) -> bool {
        self.admins.iter().any(|a| a == identity)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        // rust_decimal carries at most 28 fractional digits
        if self.amount_scale > 28 {
            return Err(ValidationError::InvalidParameter {
                field: "amount_scale",
                reason: format!("{} exceeds 28", self.amount_scale),
            });
        }
        if self.max_milestones == 0 {
            return Err(ValidationError::InvalidParameter {
                field: "max_milestones",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
