//! Console renderer for dry-run output.

use crate::config::strategy::RangePairConfig;
use crate::engine::context::PoolContext;
use crate::error::BotError;
use crate::model::{PriceSample, WalletBalances};
use crate::strategy::common::{effective_tolerance, plan_balancing_swap, thresholds};
use crate::strategy::liquidity_math::raw_sqrt_price;
use crate::strategy::range_planner::plan_ranges;
use crate::strategy::types::{RangePlan, SwapPlan, Thresholds};

/// What the bot would do right now, without doing it.
#[derive(Debug, Clone)]
pub struct DryRunReport {
    pub config: RangePairConfig,
    pub pool: PoolContext,
    pub sample: PriceSample,
    pub balances: WalletBalances,
    pub plan: RangePlan,
    pub thresholds: Thresholds,
    pub swap: Option<SwapPlan>,
}

impl DryRunReport {
    pub fn build(
        config: &RangePairConfig,
        pool: &PoolContext,
        sample: PriceSample,
        balances: WalletBalances,
    ) -> Result<Self, BotError> {
        let (decimals0, decimals1) = pool.decimals();
        let plan = plan_ranges(
            sample.price,
            config.width_percent,
            pool.tick_spacing,
            decimals0,
            decimals1,
        )?;
        let limits = thresholds(
            plan.lower_ticks.lower,
            plan.upper_ticks.upper,
            pool.tick_spacing,
            config.threshold_buffer_spacings,
        );
        let tolerance = effective_tolerance(
            plan.upper_ticks,
            raw_sqrt_price(sample.price, decimals0, decimals1),
            balances,
            config.rebalance_tolerance_percent,
        )?;
        let swap = plan_balancing_swap(
            balances,
            sample.price,
            &pool.token0,
            &pool.token1,
            tolerance,
        );
        Ok(Self {
            config: config.clone(),
            pool: pool.clone(),
            sample,
            balances,
            plan,
            thresholds: limits,
            swap,
        })
    }

    pub fn lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        let pool = &self.pool;
        let plan = &self.plan;

        out.push("CONFIGURATION".to_string());
        out.push(format!("Pair:        {}", self.config.pair));
        out.push(format!("Width:       {:.2}%", self.config.width_percent));
        out.push(format!(
            "Pool:        fee {:.2}%, tick spacing {}",
            pool.fee_percent(),
            pool.tick_spacing
        ));
        out.push(format!(
            "Price:       {:.6} (tick {})",
            self.sample.price, self.sample.tick
        ));

        out.push(String::new());
        out.push("PLANNED RANGES".to_string());
        out.push(format!(
            "Upper:       [{}, {}]  {:.6} - {:.6}",
            plan.upper_ticks.lower,
            plan.upper_ticks.upper,
            plan.transition_price,
            plan.upper_bound_price
        ));
        out.push(format!(
            "Lower:       [{}, {}]  {:.6} - {:.6}",
            plan.lower_ticks.lower,
            plan.lower_ticks.upper,
            plan.lower_bound_price,
            plan.transition_price
        ));
        out.push(format!(
            "Close when:  tick < {} or tick > {}",
            self.thresholds.lower, self.thresholds.upper
        ));

        out.push(String::new());
        out.push("BALANCES".to_string());
        out.push(format!(
            "Wallet:      {}",
            pool.format_amounts(self.balances.token0, self.balances.token1)
        ));
        out.push(format!(
            "Value:       {:.3} {}",
            pool.value_in_quote(self.balances, self.sample.price),
            pool.token1.symbol
        ));
        match &self.swap {
            Some(swap) => {
                let (token_in, token_out) = if swap.zero_for_one {
                    (&pool.token0, &pool.token1)
                } else {
                    (&pool.token1, &pool.token0)
                };
                out.push(format!(
                    "Swap:        {:.6} {} -> {} (deviation {:.2}%)",
                    token_in.to_human(swap.amount_in),
                    token_in.symbol,
                    token_out.symbol,
                    swap.deviation_percent
                ));
            }
            None => out.push(format!(
                "Swap:        none (within {:.2}% tolerance)",
                self.config.rebalance_tolerance_percent
            )),
        }
        out
    }
}

/// Console renderer for dry-run reports.
pub struct ConsoleRenderer;

impl ConsoleRenderer {
    pub fn render(report: &DryRunReport) {
        println!();
        println!("{}", "=".repeat(60));
        println!(" DRY RUN REPORT");
        println!("{}", "=".repeat(60));
        for line in report.lines() {
            println!("{}", line);
        }
        println!("{}", "=".repeat(60));
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TokenInfo;
    use crate::strategy::tick_math;
    use ethers::types::{Address, U256};

    fn config() -> RangePairConfig {
        toml::from_str(
            r#"
            pair = "WETH/USDC"
            token0 = "0x0101010101010101010101010101010101010101"
            token1 = "0x0202020202020202020202020202020202020202"
            width_percent = 20.0
            "#,
        )
        .unwrap()
    }

    fn pool() -> PoolContext {
        PoolContext::new(
            TokenInfo::new(Address::repeat_byte(1), "WETH", 18),
            TokenInfo::new(Address::repeat_byte(2), "USDC", 6),
            3000,
            60,
        )
    }

    fn sample(price: f64) -> PriceSample {
        PriceSample {
            price,
            tick: tick_math::price_to_tick(price, 18, 6).unwrap(),
            sqrt_price_x96: U256::zero(),
            timestamp: 0,
        }
    }

    #[test]
    fn test_report_plans_swap_for_one_sided_wallet() {
        // 2 WETH, no USDC: swap half the value into USDC
        let balances = WalletBalances::new(2_000_000_000_000_000_000, 0);
        let report = DryRunReport::build(&config(), &pool(), sample(2500.0), balances).unwrap();

        assert!(report.thresholds.lower < report.plan.lower_ticks.lower);
        assert!(report.thresholds.upper > report.plan.upper_ticks.upper);
        let swap = report.swap.unwrap();
        assert!(swap.zero_for_one);
        assert_eq!(swap.amount_in, 1_000_000_000_000_000_000);

        let lines = report.lines();
        assert!(lines.iter().any(|l| l.contains("Swap:        1.000000 WETH -> USDC")));
        assert!(lines.iter().any(|l| l.starts_with("Close when:")));
    }

    #[test]
    fn test_report_swaps_when_upper_range_takes_all_token1() {
        let mut config = config();
        config.rebalance_tolerance_percent = 90.0;
        let balances = WalletBalances::new(1_000_000_000_000_000_000, 150_000_000);
        let report = DryRunReport::build(&config, &pool(), sample(2500.0), balances).unwrap();
        let swap = report.swap.unwrap();
        assert!(swap.zero_for_one);
        assert!(swap.deviation_percent < 90.0);
    }

    #[test]
    fn test_report_without_swap() {
        let balances = WalletBalances::new(1_000_000_000_000_000_000, 2_500_000_000);
        let report = DryRunReport::build(&config(), &pool(), sample(2500.0), balances).unwrap();
        assert!(report.swap.is_none());
        assert!(report.lines().iter().any(|l| l.contains("none (within 10.00% tolerance)")));
    }
}
