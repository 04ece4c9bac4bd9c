//! Payout arithmetic.
//!
//! The house subsidy (`initial_liquidity` on each side) never earns a
//! payout, so it is removed from both pools first:
//!
//! ```text
//! effective_total   = max(0, total   - 2 × liquidity)
//! effective_winning = max(0, winning - liquidity)
//!
//! either effective pool 0  →  payout = stake                  (refund)
//! otherwise                →  ratio  = round10(eff_total / eff_winning) × fee_multiplier
//!                             payout = floor(stake × ratio)
//! ```

use predmatch_types::{Pools, Side, constants};
use rust_decimal::{Decimal, RoundingStrategy};

/// Pool figures of a question at finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub total: Decimal,
    pub winning: Decimal,
    pub initial_liquidity: Decimal,
}

impl PoolSnapshot {
    #[must_use]
    pub fn from_pools(pools: &Pools, winning_side: Side, initial_liquidity: Decimal) -> Self {
        Self {
            total: pools.total,
            winning: pools.side(winning_side),
            initial_liquidity,
        }
    }

    #[must_use]
    pub fn effective_total(&self) -> Decimal {
        (self.total - self.initial_liquidity * Decimal::TWO).max(Decimal::ZERO)
    }

    #[must_use]
    pub fn effective_winning(&self) -> Decimal {
        (self.winning - self.initial_liquidity).max(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SettlementCalculator {
    fee_multiplier: Decimal,
}

impl SettlementCalculator {
    #[must_use]
    pub fn new(fee_multiplier: Decimal) -> Self {
        Self { fee_multiplier }
    }

    #[must_use]
    pub fn fee_multiplier(&self) -> Decimal {
        self.fee_multiplier
    }

    /// Payout per unit of stake, or `None` when stakes are refunded: no
    /// real winners to divide among, or no real money to divide.
    #[must_use]
    pub fn payout_ratio(&self, pools: &PoolSnapshot) -> Option<Decimal> {
        let effective_winning = pools.effective_winning();
        if effective_winning.is_zero() || pools.effective_total().is_zero() {
            return None;
        }
        let ratio = (pools.effective_total() / effective_winning)
            .round_dp_with_strategy(constants::PAYOUT_RATIO_SCALE, RoundingStrategy::MidpointAwayFromZero);
        Some(ratio * self.fee_multiplier)
    }

    /// Whole-unit payout of a winning stake.
    #[must_use]
    pub fn payout(&self, stake: Decimal, pools: &PoolSnapshot) -> Decimal {
        match self.payout_ratio(pools) {
            None => stake,
            Some(ratio) => (stake * ratio).trunc(),
        }
    }
}

impl Default for SettlementCalculator {
    fn default() -> Self {
        Self::new(Decimal::new(constants::SETTLEMENT_FEE_MULTIPLIER_HUNDREDTHS, 2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pools(total: i64, winning: i64, liquidity: i64) -> PoolSnapshot {
        PoolSnapshot {
            total: Decimal::from(total),
            winning: Decimal::from(winning),
            initial_liquidity: Decimal::from(liquidity),
        }
    }

    #[test]
    fn subsidy_only_total_refunds_stake() {
        // total 1000, yes 600, liquidity 500: eff_total 0, eff_winning 100.
        let p = pools(1000, 600, 500);
        assert_eq!(p.effective_total(), Decimal::ZERO);
        assert_eq!(p.effective_winning(), Decimal::from(100));
        let calc = SettlementCalculator::default();
        assert_eq!(calc.payout_ratio(&p), None);
        assert_eq!(calc.payout(Decimal::from(40), &p), Decimal::from(40));
    }

    #[test]
    fn empty_effective_winning_pool_refunds() {
        let calc = SettlementCalculator::default();
        let p = pools(1200, 450, 500);
        assert_eq!(calc.payout_ratio(&p), None);
        assert_eq!(calc.payout(Decimal::from(37), &p), Decimal::from(37));
    }

    #[test]
    fn ratio_applies_fee_and_floors() {
        let calc = SettlementCalculator::default();
        // eff_total 300, eff_winning 100 -> 3 × 0.99 = 2.97
        let p = pools(1300, 600, 500);
        assert_eq!(calc.payout_ratio(&p), Some(Decimal::new(297, 2)));
        assert_eq!(calc.payout(Decimal::from(33), &p), Decimal::from(98)); // 98.01
    }

    #[test]
    fn ratio_rounds_to_ten_places_half_up() {
        let calc = SettlementCalculator::new(Decimal::ONE);
        // 200 / 300 = 0.6666666666...
        let p = pools(1200, 800, 500);
        assert_eq!(calc.payout_ratio(&p), Some(Decimal::new(6_666_666_667, 10)));
    }

    #[test]
    fn from_pools_picks_winning_side() {
        let pools = Pools {
            total: Decimal::from(1100),
            yes: Decimal::from(600),
            no: Decimal::from(500),
        };
        let snap = PoolSnapshot::from_pools(&pools, Side::No, Decimal::from(500));
        assert_eq!(snap.winning, Decimal::from(500));
        assert_eq!(snap.effective_winning(), Decimal::ZERO);
    }
}
