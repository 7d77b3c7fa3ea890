use crate::model::Amount;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle phase of the rebalancing state machine. `Holding` is the only
/// steady state; every other phase must complete or explicitly fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    NoPositions,
    Balancing,
    Opening,
    Holding,
    Closing,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::NoPositions => "NoPositions",
            Phase::Balancing => "Balancing",
            Phase::Opening => "Opening",
            Phase::Holding => "Holding",
            Phase::Closing => "Closing",
        };
        write!(f, "{}", name)
    }
}

/// What the monitor should do for the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// No positions: balance and open a fresh pair.
    Open,
    /// Both positions live and the tick is inside the thresholds.
    Hold,
    /// Tick breached a threshold.
    Close,
    /// A previous close left one leg open; finish closing before anything else.
    ResumeClose,
}

/// Inclusive-exclusive tick interval aligned to the pool tick spacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickRange {
    pub lower: i32,
    pub upper: i32,
}

impl TickRange {
    pub fn new(lower: i32, upper: i32) -> Self {
        Self { lower, upper }
    }
}

/// Output of the range planner; computed fresh every rebalance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangePlan {
    pub lower_ticks: TickRange,
    pub upper_ticks: TickRange,
    pub transition_tick: i32,
    pub lower_bound_price: f64,
    pub transition_price: f64,
    pub upper_bound_price: f64,
}

/// Tick levels outside which the pair is closed. The comparison is strict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub lower: i32,
    pub upper: i32,
}

/// A close receipt split into the original deposit and earned fees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeeSplit {
    pub principal0: Amount,
    pub principal1: Amount,
    pub fees0: Amount,
    pub fees1: Amount,
}

impl FeeSplit {
    pub fn accumulate(&mut self, other: &FeeSplit) {
        self.principal0 = self.principal0.saturating_add(other.principal0);
        self.principal1 = self.principal1.saturating_add(other.principal1);
        self.fees0 = self.fees0.saturating_add(other.fees0);
        self.fees1 = self.fees1.saturating_add(other.fees1);
    }
}

/// Swap needed to bring both tokens to equal value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwapPlan {
    /// `true` sells token0 for token1.
    pub zero_for_one: bool,
    pub amount_in: Amount,
    pub deviation_percent: f64,
}

/// Cumulative strategy counters. Monotonic except the `current_*` fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyStats {
    pub total_fees0: Amount,
    pub total_fees1: Amount,
    pub rebalance_count: u64,
    pub cycle_count: u64,
    pub positions_opened: u64,
    pub swap_count: u64,
    /// Times reconciliation replaced tracked balances with the wallet's.
    pub balance_corrections: u64,
    pub started_at: i64,
    pub last_rebalance_at: Option<i64>,
    pub current_price: f64,
    pub current_tick: Option<i32>,
}

impl StrategyStats {
    pub fn new(started_at: i64) -> Self {
        Self {
            total_fees0: 0,
            total_fees1: 0,
            rebalance_count: 0,
            cycle_count: 0,
            positions_opened: 0,
            swap_count: 0,
            balance_corrections: 0,
            started_at,
            last_rebalance_at: None,
            current_price: 0.0,
            current_tick: None,
        }
    }

    pub fn record_fees(&mut self, split: &FeeSplit) {
        self.total_fees0 = self.total_fees0.saturating_add(split.fees0);
        self.total_fees1 = self.total_fees1.saturating_add(split.fees1);
    }
}

/// Percentage cut applied to expected mint amounts. 2.0 means 2%.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spread {
    pub value: f64,
}

impl Spread {
    pub const fn new(value: f64) -> Self {
        Self { value }
    }

    /// Integer markdown for raw token amounts, rounded down.
    pub fn markdown_amount(&self, amount: Amount) -> Amount {
        let bps = (self.value * 100.0).round().clamp(0.0, 10_000.0) as Amount;
        let cut = (amount / 10_000) * bps + (amount % 10_000) * bps / 10_000;
        amount.saturating_sub(cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spread_markdown_amount() {
        let spread = Spread::new(2.0);
        assert_eq!(spread.markdown_amount(1_000_000), 980_000);
        assert_eq!(spread.markdown_amount(0), 0);
        // Rounds the cut down, so the minimum never exceeds 98% + 1 unit
        assert_eq!(spread.markdown_amount(99), 98);
        // No overflow near the top of the range
        assert!(spread.markdown_amount(u128::MAX) < u128::MAX);
    }

    #[test]
    fn test_fee_split_accumulate() {
        let mut total = FeeSplit::default();
        total.accumulate(&FeeSplit {
            principal0: 10,
            principal1: 0,
            fees0: 1,
            fees1: 2,
        });
        total.accumulate(&FeeSplit {
            principal0: 0,
            principal1: 5,
            fees0: 0,
            fees1: 3,
        });
        assert_eq!(total.principal0, 10);
        assert_eq!(total.principal1, 5);
        assert_eq!(total.fees0, 1);
        assert_eq!(total.fees1, 5);
    }
}
