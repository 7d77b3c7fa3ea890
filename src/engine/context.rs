use crate::model::{Amount, PositionSnapshot, TokenInfo, WalletBalances};
use serde::Serialize;

/// Static pool facts cached by the oracle at startup.
#[derive(Debug, Clone, Serialize)]
pub struct PoolContext {
    pub token0: TokenInfo,
    pub token1: TokenInfo,
    pub fee_tier: u32,
    pub tick_spacing: i32,
}

impl PoolContext {
    pub fn new(token0: TokenInfo, token1: TokenInfo, fee_tier: u32, tick_spacing: i32) -> Self {
        Self {
            token0,
            token1,
            fee_tier,
            tick_spacing,
        }
    }

    pub fn symbol(&self) -> String {
        format!("{}/{}", self.token0.symbol, self.token1.symbol)
    }

    pub fn decimals(&self) -> (u8, u8) {
        (self.token0.decimals, self.token1.decimals)
    }

    /// Fee tier as a percentage (3000 -> 0.3).
    pub fn fee_percent(&self) -> f64 {
        self.fee_tier as f64 / 10_000.0
    }

    /// Whether a position belongs to this pool (same token pair and fee tier).
    pub fn contains(&self, position: &PositionSnapshot) -> bool {
        position.token0 == self.token0.address
            && position.token1 == self.token1.address
            && position.fee == self.fee_tier
    }

    /// Quote value of a balance pair: token0 at `price`, token1 at 1.
    pub fn value_in_quote(&self, balances: WalletBalances, price: f64) -> f64 {
        self.token0.to_human(balances.token0) * price + self.token1.to_human(balances.token1)
    }

    pub fn format_amounts(&self, amount0: Amount, amount1: Amount) -> String {
        format!(
            "{:.6} {} / {:.6} {}",
            self.token0.to_human(amount0),
            self.token0.symbol,
            self.token1.to_human(amount1),
            self.token1.symbol
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::Address;

    #[test]
    fn test_pool_context_helpers() {
        let ctx = PoolContext::new(
            TokenInfo::new(Address::repeat_byte(1), "WETH", 18),
            TokenInfo::new(Address::repeat_byte(2), "USDC", 6),
            3000,
            60,
        );
        assert_eq!(ctx.symbol(), "WETH/USDC");
        assert!((ctx.fee_percent() - 0.3).abs() < 1e-12);

        let value = ctx.value_in_quote(
            WalletBalances::new(1_000_000_000_000_000_000, 500_000_000),
            2500.0,
        );
        assert!((value - 3000.0).abs() < 1e-9);

        let mut position = PositionSnapshot {
            token_id: ethers::types::U256::one(),
            token0: Address::repeat_byte(1),
            token1: Address::repeat_byte(2),
            fee: 3000,
            tick_lower: 0,
            tick_upper: 60,
            liquidity: 1,
            amount0: 0,
            amount1: 0,
            tokens_owed0: 0,
            tokens_owed1: 0,
        };
        assert!(ctx.contains(&position));
        position.fee = 500;
        assert!(!ctx.contains(&position));
        assert_eq!(
            ctx.format_amounts(500_000_000_000_000_000, 1_250_000),
            "0.500000 WETH / 1.250000 USDC"
        );
    }
}
