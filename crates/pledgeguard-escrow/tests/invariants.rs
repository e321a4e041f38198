//! Property tests for the escrow accounting identities

use std::sync::Arc;

use pledgeguard_common::crypto::AttestationVerifier;
use pledgeguard_common::{ManualClock, MilestoneSpec};
use pledgeguard_escrow::{pro_rata, EscrowConfig, NewCampaign, Protocol};
use pledgeguard_oracle::OracleParams;
use proptest::prelude::*;
use rust_decimal::Decimal;

const DAY: i64 = 24 * 60 * 60 * 1000;

fn cents(v: u64) -> Decimal {
    Decimal::new(v as i64, 2)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Refund shares sum to the total, never exceed a weight, and are
    /// deterministic
    #[test]
    fn refund_split_is_exact(
        weights in prop::collection::vec(1u64..1_000_000, 1..20),
        fraction in 1u64..=100,
        scale in 0u32..=8,
    ) {
        let weights: Vec<(usize, Decimal)> =
            weights.into_iter().map(cents).enumerate().collect();
        let sum: Decimal = weights.iter().map(|(_, w)| *w).sum();
        let total = (sum * Decimal::new(fraction as i64, 2)).round_dp(2).min(sum);

        let shares = pro_rata(total, &weights, scale);
        let paid: Decimal = shares.iter().map(|(_, s)| *s).sum();
        prop_assert_eq!(paid, total);
        for (pos, share) in &shares {
            prop_assert!(*share > Decimal::ZERO);
            prop_assert!(*share <= weights[*pos].1);
        }
        prop_assert_eq!(shares, pro_rata(total, &weights, scale));
    }

    /// raised == Σ contributions after any sequence of pledges and a refund
    #[test]
    fn raised_matches_contributions(
        pledges in prop::collection::vec(1u64..5_000, 1..30),
        refund in any::<bool>(),
    ) {
        let clock = Arc::new(ManualClock::new(0));
        let protocol = Protocol::new(
            EscrowConfig::default(),
            OracleParams::default(),
            Arc::new(AttestationVerifier::default()),
            clock.clone(),
        ).unwrap();

        let goal = cents(100_000);
        let id = protocol.create_campaign("creator", NewCampaign {
            title: "Property".to_string(),
            description: String::new(),
            funding_goal: goal,
            deadline: 10 * DAY,
            milestones: vec![MilestoneSpec {
                description: "all".to_string(),
                fund_amount: goal,
                deadline: 10 * DAY,
            }],
        }).unwrap().state.id;

        for (i, p) in pledges.iter().enumerate() {
            let _ = protocol.contribute(&id, cents(*p), &format!("backer-{}", i % 4));
            let c = protocol.get_campaign(&id).unwrap();
            prop_assert_eq!(c.raised_amount, c.contributed_total());
            prop_assert!(c.balances_consistent());
        }

        if refund {
            let raised = protocol.get_campaign(&id).unwrap().raised_amount;
            clock.set(10 * DAY);
            let report = protocol.refund_contributors(&id).unwrap().state;
            prop_assert_eq!(report.total, raised);

            let c = protocol.get_campaign(&id).unwrap();
            prop_assert_eq!(c.raised_amount, Decimal::ZERO);
            prop_assert!(c.balances_consistent());

            let paid: Decimal = (0..4)
                .map(|i| protocol.account_balance(&format!("backer-{i}")))
                .sum();
            prop_assert_eq!(paid, raised);
        }
    }
}
