//! Payout accounts
//!
//! Funds that have left escrow (creator withdrawals, public refunds) are
//! credited here by identity. Settlement to an external rail is outside the
//! ledger.

use dashmap::DashMap;
use rust_decimal::Decimal;

/// identity -> paid-out balance
#[derive(Default)]
pub struct Accounts {
    balances: DashMap<String, Decimal>,
}

impl Accounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` to an identity's balance, returning the new balance
    pub fn credit(&self, identity: &str, amount: Decimal) -> Decimal {
        let mut entry = self
            .balances
            .entry(identity.to_string())
            .or_insert(Decimal::ZERO);
        *entry += amount;
        *entry
    }

    pub fn balance(&self, identity: &str) -> Decimal {
        self.balances
            .get(identity)
            .map(|b| *b.value())
            .unwrap_or(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_credit_accumulates() {
        let accounts = Accounts::new();
        assert_eq!(accounts.balance("alice"), Decimal::ZERO);
        assert_eq!(accounts.credit("alice", dec!(1.5)), dec!(1.5));
        assert_eq!(accounts.credit("alice", dec!(2)), dec!(3.5));
        assert_eq!(accounts.credit("bob", dec!(1)), dec!(1));
        assert_eq!(accounts.balance("alice"), dec!(3.5));
    }
}
