//! Pro-rata refund distribution
//!
//! Shares are rounded toward zero at the amount scale. The rounding dust goes
//! to the last contribution, spilling backwards only if that would push a
//! contribution past its own net amount. The shares always sum to exactly the
//! refundable total.

use rust_decimal::{Decimal, RoundingStrategy};

/// Split `total` across `(position, weight)` pairs in proportion to weight.
///
/// Non-positive weights receive nothing. Returns `(position, share)` pairs
/// with a positive share, in input order. `total` must not exceed the sum of
/// weights.
pub fn pro_rata(total: Decimal, weights: &[(usize, Decimal)], scale: u32) -> Vec<(usize, Decimal)> {
    let weights: Vec<(usize, Decimal)> = weights
        .iter()
        .copied()
        .filter(|(_, w)| *w > Decimal::ZERO)
        .collect();
    let weight_sum: Decimal = weights.iter().map(|(_, w)| *w).sum();
    if total <= Decimal::ZERO || weight_sum <= Decimal::ZERO {
        return Vec::new();
    }

    let mut shares: Vec<Decimal> = weights
        .iter()
        .map(|(_, w)| {
            let exact = total
                .checked_mul(*w)
                .map(|x| x / weight_sum)
                .unwrap_or_else(|| total * (*w / weight_sum));
            exact
                .round_dp_with_strategy(scale, RoundingStrategy::ToZero)
                .min(*w)
        })
        .collect();

    let mut remainder = total - shares.iter().copied().sum::<Decimal>();
    for (share, (_, w)) in shares.iter_mut().zip(weights.iter()).rev() {
        if remainder <= Decimal::ZERO {
            break;
        }
        let give = remainder.min(*w - *share);
        *share += give;
        remainder -= give;
    }

    weights
        .iter()
        .zip(shares)
        .filter(|(_, share)| *share > Decimal::ZERO)
        .map(|((pos, _), share)| (*pos, share))
        .collect()
}
