use crate::strategy::tick_math;
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw token amount in the token's smallest unit.
pub type Amount = u128;

/// Which of the two strategy positions a value refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    /// Base-asset-heavy range, from the transition tick up.
    Upper,
    /// Quote-only range, below the transition tick.
    Lower,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::Upper, Slot::Lower];
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Upper => write!(f, "upper"),
            Slot::Lower => write!(f, "lower"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WalletBalances {
    pub token0: Amount,
    pub token1: Amount,
}

impl WalletBalances {
    pub fn new(token0: Amount, token1: Amount) -> Self {
        Self { token0, token1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenInfo {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
}

impl TokenInfo {
    pub fn new(address: Address, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            address,
            symbol: symbol.into(),
            decimals,
        }
    }

    pub fn to_human(&self, raw: Amount) -> f64 {
        raw as f64 / 10f64.powi(self.decimals as i32)
    }

    pub fn to_raw(&self, human: f64) -> Amount {
        if !human.is_finite() || human <= 0.0 {
            return 0;
        }
        (human * 10f64.powi(self.decimals as i32)).floor() as Amount
    }
}

/// One open concentrated-liquidity position owned by the strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub token_id: U256,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: u128,
    /// Amounts actually deposited at mint; the basis for fee accounting.
    pub principal_amount0: Amount,
    pub principal_amount1: Amount,
    pub price_lower: f64,
    pub price_upper: f64,
    pub is_active: bool,
}

impl Position {
    pub fn new(
        token_id: U256,
        tick_lower: i32,
        tick_upper: i32,
        liquidity: u128,
        principal: (Amount, Amount),
        decimals: (u8, u8),
    ) -> Self {
        let (decimals0, decimals1) = decimals;
        Self {
            token_id,
            tick_lower,
            tick_upper,
            liquidity,
            principal_amount0: principal.0,
            principal_amount1: principal.1,
            price_lower: tick_math::tick_to_price(tick_lower, decimals0, decimals1)
                .unwrap_or_default(),
            price_upper: tick_math::tick_to_price(tick_upper, decimals0, decimals1)
                .unwrap_or_default(),
            is_active: true,
        }
    }

    /// Pool convention: a position earns while `tick_lower <= tick < tick_upper`.
    pub fn contains_tick(&self, tick: i32) -> bool {
        tick >= self.tick_lower && tick < self.tick_upper
    }
}

// --- Collaborator payloads ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintRequest {
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub amount0_desired: Amount,
    pub amount1_desired: Amount,
    pub amount0_min: Amount,
    pub amount1_min: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintReceipt {
    pub token_id: U256,
    pub liquidity: u128,
    pub amount0_used: Amount,
    pub amount1_used: Amount,
}

/// Principal plus fees returned when a position is burned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CloseReceipt {
    pub amount0: Amount,
    pub amount1: Amount,
}

/// Position state as reported by the position manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub token_id: U256,
    /// Pool identity; an owner may hold positions in many pools.
    pub token0: Address,
    pub token1: Address,
    pub fee: u32,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: u128,
    /// Underlying amounts at the current pool price.
    pub amount0: Amount,
    pub amount1: Amount,
    pub tokens_owed0: Amount,
    pub tokens_owed1: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSlot {
    pub tick: i32,
    pub sqrt_price_x96: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    /// token1 per token0, decimal adjusted.
    pub price: f64,
    pub tick: i32,
    pub sqrt_price_x96: U256,
    /// Unix millis.
    pub timestamp: i64,
}

/// Observability records handed to the persistence sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    PriceSample(PriceSample),
    PositionOpened {
        slot: Slot,
        position: Position,
    },
    PositionClosed {
        slot: Slot,
        token_id: U256,
        amount0: Amount,
        amount1: Amount,
    },
    FeesCollected {
        slot: Slot,
        token_id: U256,
        fees0: Amount,
        fees1: Amount,
    },
    Swap {
        token_in: Address,
        token_out: Address,
        amount_in: Amount,
        amount_out: Amount,
    },
    CycleFailed {
        reason: String,
        critical: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_info_conversions() {
        let usdc = TokenInfo::new(Address::zero(), "USDC", 6);
        assert_eq!(usdc.to_raw(12.5), 12_500_000);
        assert!((usdc.to_human(12_500_000) - 12.5).abs() < 1e-12);
        assert_eq!(usdc.to_raw(-1.0), 0);
        assert_eq!(usdc.to_raw(f64::NAN), 0);
    }

    #[test]
    fn test_position_contains_tick() {
        let position = Position::new(U256::one(), -120, 60, 1_000, (10, 0), (6, 6));
        assert!(position.contains_tick(-120));
        assert!(position.contains_tick(59));
        assert!(!position.contains_tick(60));
        assert!(!position.contains_tick(-121));
        assert!(position.price_lower < 1.0 && position.price_upper > 1.0);
    }
}
