use crate::constants::{
    DEFAULT_CHECK_INTERVAL, DEFAULT_ERROR_BACKOFF, DEFAULT_MINT_SLIPPAGE,
    DEFAULT_REBALANCE_TOLERANCE_PERCENT, DEFAULT_SWAP_SLIPPAGE_PERCENT,
    DEFAULT_THRESHOLD_BUFFER_SPACINGS, DEFAULT_TX_TIMEOUT,
};
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(tag = "type")]
pub enum StrategyConfig {
    #[serde(rename = "range_pair")]
    RangePair(RangePairConfig),
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RangePairConfig {
    /// "BASE/QUOTE", base is the pool's token0.
    pub pair: String,
    pub token0: Address,
    pub token1: Address,
    /// Total width of both ranges as a percentage of price.
    pub width_percent: f64,
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,
    #[serde(default = "default_rebalance_tolerance_percent")]
    pub rebalance_tolerance_percent: f64,
    #[serde(default = "default_swap_slippage_percent")]
    pub swap_slippage_percent: f64,
    #[serde(default = "default_mint_slippage_percent")]
    pub mint_slippage_percent: f64,
    /// Tick spacings beyond the outer range edges before a close triggers.
    #[serde(default = "default_threshold_buffer_spacings")]
    pub threshold_buffer_spacings: i32,
    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,
    #[serde(default = "default_tx_timeout_secs")]
    pub tx_timeout_secs: u64,
}

fn default_check_interval_ms() -> u64 {
    DEFAULT_CHECK_INTERVAL.as_millis() as u64
}

fn default_rebalance_tolerance_percent() -> f64 {
    DEFAULT_REBALANCE_TOLERANCE_PERCENT
}

fn default_swap_slippage_percent() -> f64 {
    DEFAULT_SWAP_SLIPPAGE_PERCENT
}

fn default_mint_slippage_percent() -> f64 {
    DEFAULT_MINT_SLIPPAGE.value
}

fn default_threshold_buffer_spacings() -> i32 {
    DEFAULT_THRESHOLD_BUFFER_SPACINGS
}

fn default_error_backoff_ms() -> u64 {
    DEFAULT_ERROR_BACKOFF.as_millis() as u64
}

fn default_tx_timeout_secs() -> u64 {
    DEFAULT_TX_TIMEOUT.as_secs()
}

impl StrategyConfig {
    pub fn type_name(&self) -> &str {
        match self {
            StrategyConfig::RangePair(_) => "Range Pair",
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            StrategyConfig::RangePair(c) => &c.pair,
        }
    }

    pub fn range_pair(&self) -> &RangePairConfig {
        match self {
            StrategyConfig::RangePair(c) => c,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        match self {
            StrategyConfig::RangePair(c) => c.validate(),
        }
    }
}

impl RangePairConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.width_percent > 0.0 && self.width_percent < 200.0) {
            return Err(anyhow::anyhow!(
                "width_percent {} must be within (0, 200).",
                self.width_percent
            ));
        }
        if self.check_interval_ms == 0 {
            return Err(anyhow::anyhow!("check_interval_ms must be positive."));
        }
        if !(0.0..100.0).contains(&self.rebalance_tolerance_percent) {
            return Err(anyhow::anyhow!(
                "rebalance_tolerance_percent {} must be within [0, 100).",
                self.rebalance_tolerance_percent
            ));
        }
        if !(0.0..=100.0).contains(&self.swap_slippage_percent) {
            return Err(anyhow::anyhow!(
                "swap_slippage_percent {} must be within [0, 100].",
                self.swap_slippage_percent
            ));
        }
        if !(0.0..=100.0).contains(&self.mint_slippage_percent) {
            return Err(anyhow::anyhow!(
                "mint_slippage_percent {} must be within [0, 100].",
                self.mint_slippage_percent
            ));
        }
        if self.threshold_buffer_spacings < 0 {
            return Err(anyhow::anyhow!("threshold_buffer_spacings must not be negative."));
        }
        if self.tx_timeout_secs == 0 {
            return Err(anyhow::anyhow!("tx_timeout_secs must be positive."));
        }
        if self.token0 == self.token1 {
            return Err(anyhow::anyhow!("token0 and token1 must differ."));
        }
        if self.token0.is_zero() || self.token1.is_zero() {
            return Err(anyhow::anyhow!("Token addresses must not be the zero address."));
        }
        if !self.pair.contains('/') || self.pair.len() < 3 {
            return Err(anyhow::anyhow!("pair must be in 'Base/Quote' format"));
        }
        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

pub fn print_params_help() {
    println!("Available Strategies:\n");

    println!("1. Range Pair Strategy (type = 'range_pair')");
    println!("   Description: Two adjacent concentrated-liquidity ranges around the price,");
    println!("   closed and re-opened when the tick leaves them.");
    println!("   Parameters:");
    println!("     - pair (String): Pool symbol, base is token0 (e.g., 'WETH/USDC').");
    println!("     - token0 (Address): Pool token0 address.");
    println!("     - token1 (Address): Pool token1 address.");
    println!("     - width_percent (f64): Total width of both ranges as % of price, (0, 200).");
    println!("     - check_interval_ms (u64): Polling interval (default: 60000).");
    println!(
        "     - rebalance_tolerance_percent (f64): Value deviation tolerated before swapping (default: 10)."
    );
    println!("     - swap_slippage_percent (f64): Max swap slippage (default: 1).");
    println!("     - mint_slippage_percent (f64): Mint minimum discount (default: 2).");
    println!(
        "     - threshold_buffer_spacings (i32): Tick spacings past the ranges before closing (default: 2)."
    );
    println!("     - error_backoff_ms (u64): Wait after a failed cycle (default: 30000).");
    println!("     - tx_timeout_secs (u64): Per-call timeout (default: 120).");
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> RangePairConfig {
        RangePairConfig {
            pair: "WETH/USDC".to_string(),
            token0: Address::repeat_byte(1),
            token1: Address::repeat_byte(2),
            width_percent: 20.0,
            check_interval_ms: 60_000,
            rebalance_tolerance_percent: 10.0,
            swap_slippage_percent: 1.0,
            mint_slippage_percent: 2.0,
            threshold_buffer_spacings: 2,
            error_backoff_ms: 30_000,
            tx_timeout_secs: 120,
        }
    }

    #[test]
    fn test_validation_width_bounds() {
        for width in [0.0, -5.0, 200.0, 350.0] {
            let mut config = valid();
            config.width_percent = width;
            let res = config.validate();
            assert!(res.is_err());
            assert!(res.unwrap_err().to_string().contains("width_percent"));
        }
        let mut config = valid();
        config.width_percent = 199.9;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_zero_interval() {
        let mut config = valid();
        config.check_interval_ms = 0;
        assert_eq!(
            config.validate().unwrap_err().to_string(),
            "check_interval_ms must be positive."
        );
    }

    #[test]
    fn test_validation_tolerances() {
        let mut config = valid();
        config.rebalance_tolerance_percent = -1.0;
        assert!(config.validate().is_err());

        config.rebalance_tolerance_percent = 0.0;
        assert!(config.validate().is_ok());

        config.swap_slippage_percent = 101.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_tokens_and_pair() {
        let mut config = valid();
        config.token1 = config.token0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.token0 = Address::zero();
        assert!(config.validate().is_err());

        let mut config = valid();
        config.pair = "WETHUSDC".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_defaults_from_toml() {
        let toml = r#"
type = "range_pair"
pair = "WETH/USDC"
token0 = "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"
token1 = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"
width_percent = 15.0
"#;
        let config: StrategyConfig = toml::from_str(toml).unwrap();
        let c = config.range_pair();
        assert_eq!(config.type_name(), "Range Pair");
        assert_eq!(c.check_interval(), DEFAULT_CHECK_INTERVAL);
        assert_eq!(c.error_backoff(), DEFAULT_ERROR_BACKOFF);
        assert_eq!(c.mint_slippage_percent, 2.0);
        assert_eq!(c.threshold_buffer_spacings, 2);
        assert_eq!(c.rebalance_tolerance_percent, 10.0);
        assert!(config.validate().is_ok());
    }
}
