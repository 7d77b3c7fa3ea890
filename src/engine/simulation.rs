//! Paper exchange for paper trading, dry-run mode and tests.
//!
//! One in-memory pool, position manager, swap router and wallet behind the
//! collaborator traits. Position amounts use concentrated-liquidity math on
//! sqrt prices; swaps fill at the pool price minus the fee tier and do not
//! move it. The price follows a deterministic sine path or is set directly.

use crate::config::simulation::PaperConfig;
use crate::constants::{MAX_TICK, MIN_TICK};
use crate::engine::traits::{
    LiquidityManager, PoolReader, SwapExecutor, WalletReader,
};
use crate::error::BotError;
use crate::model::{
    Amount, CloseReceipt, MintReceipt, MintRequest, PoolSlot, PositionSnapshot, TokenInfo,
    WalletBalances,
};
use crate::strategy::liquidity_math::{
    amounts_for_liquidity, liquidity_for_amounts, raw_sqrt_price, sqrt_ratio_at_tick,
};
use crate::strategy::tick_math;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use ethers::types::{Address, U256};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct PaperPosition {
    owner: Address,
    tick_lower: i32,
    tick_upper: i32,
    liquidity: u128,
    owed0: Amount,
    owed1: Amount,
}

#[derive(Debug)]
struct PaperState {
    price: f64,
    step: u64,
    balances: WalletBalances,
    positions: BTreeMap<U256, PaperPosition>,
    next_token_id: u64,
    mint_calls: u64,
    fail_mint_call: Option<u64>,
    close_failures: u32,
    fail_next_swap: bool,
}

pub struct PaperExchange {
    config: PaperConfig,
    token0: Address,
    token1: Address,
    owner: Address,
    state: Mutex<PaperState>,
}

impl PaperExchange {
    pub fn new(
        config: PaperConfig,
        token0: Address,
        token1: Address,
        owner: Address,
    ) -> Result<Self, BotError> {
        if !config.initial_price.is_finite() || config.initial_price <= 0.0 {
            return Err(BotError::InvalidPrice(config.initial_price));
        }
        if config.tick_spacing <= 0 {
            return Err(BotError::InvalidTickSpacing(config.tick_spacing));
        }
        let balances = WalletBalances::new(
            TokenInfo::new(token0, "", config.token0_decimals).to_raw(config.initial_token0),
            TokenInfo::new(token1, "", config.token1_decimals).to_raw(config.initial_token1),
        );
        info!(
            "[PAPER] Pool at {:.4}, spacing {}, fee tier {}",
            config.initial_price, config.tick_spacing, config.fee_tier
        );
        let state = PaperState {
            price: config.initial_price,
            step: 0,
            balances,
            positions: BTreeMap::new(),
            next_token_id: 1,
            mint_calls: 0,
            fail_mint_call: None,
            close_failures: 0,
            fail_next_swap: false,
        };
        Ok(Self {
            config,
            token0,
            token1,
            owner,
            state: Mutex::new(state),
        })
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    fn lock(&self) -> Result<MutexGuard<'_, PaperState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("paper exchange state poisoned"))
    }

    /// Moves the price one step along the sine path and accrues fees to
    /// in-range positions.
    pub fn advance(&self) -> Result<f64> {
        let mut state = self.lock()?;
        state.step += 1;
        let period = self.config.price_period_steps.max(1) as f64;
        let phase = 2.0 * std::f64::consts::PI * state.step as f64 / period;
        state.price = self.config.initial_price * (1.0 + self.config.price_amplitude * phase.sin());
        self.accrue_fees(&mut state)?;
        debug!("[PAPER] Step {} price {:.4}", state.step, state.price);
        Ok(state.price)
    }

    pub fn set_price(&self, price: f64) -> Result<()> {
        if !price.is_finite() || price <= 0.0 {
            return Err(BotError::InvalidPrice(price).into());
        }
        self.lock()?.price = price;
        Ok(())
    }

    pub fn price(&self) -> Result<f64> {
        Ok(self.lock()?.price)
    }

    pub fn balances(&self) -> Result<WalletBalances> {
        Ok(self.lock()?.balances)
    }

    pub fn position_count(&self) -> Result<usize> {
        Ok(self.lock()?.positions.len())
    }

    /// The `nth` mint call from now (1 = the next one) reverts.
    pub fn fail_mint_call(&self, nth: u64) -> Result<()> {
        let mut state = self.lock()?;
        state.fail_mint_call = Some(state.mint_calls + nth);
        Ok(())
    }

    /// The next `count` close calls revert.
    pub fn fail_next_closes(&self, count: u32) -> Result<()> {
        self.lock()?.close_failures = count;
        Ok(())
    }

    pub fn fail_next_swap(&self) -> Result<()> {
        self.lock()?.fail_next_swap = true;
        Ok(())
    }

    fn raw_price(&self, price: f64) -> f64 {
        price
            / 10f64.powi(self.config.token0_decimals as i32 - self.config.token1_decimals as i32)
    }

    fn sqrt_price(&self, price: f64) -> f64 {
        raw_sqrt_price(
            price,
            self.config.token0_decimals,
            self.config.token1_decimals,
        )
    }

    fn current_tick(&self, price: f64) -> Result<i32, BotError> {
        tick_math::price_to_tick(
            price,
            self.config.token0_decimals,
            self.config.token1_decimals,
        )
    }

    fn check_ticks(&self, tick_lower: i32, tick_upper: i32) -> Result<()> {
        let spacing = self.config.tick_spacing;
        if tick_lower >= tick_upper {
            bail!("TLU: tick_lower {} >= tick_upper {}", tick_lower, tick_upper);
        }
        if tick_lower < MIN_TICK || tick_upper > MAX_TICK {
            bail!("TLM/TUM: ticks out of bounds");
        }
        if tick_lower.rem_euclid(spacing) != 0 || tick_upper.rem_euclid(spacing) != 0 {
            bail!(
                "ticks [{}, {}] not aligned to spacing {}",
                tick_lower,
                tick_upper,
                spacing
            );
        }
        Ok(())
    }

    fn position_amounts(&self, price: f64, position: &PaperPosition) -> Result<(f64, f64)> {
        let sqrt_a = sqrt_ratio_at_tick(position.tick_lower)?;
        let sqrt_b = sqrt_ratio_at_tick(position.tick_upper)?;
        Ok(amounts_for_liquidity(
            self.sqrt_price(price),
            sqrt_a,
            sqrt_b,
            position.liquidity,
        ))
    }

    fn accrue_fees(&self, state: &mut PaperState) -> Result<()> {
        let rate = self.config.fee_accrual_per_step;
        if rate <= 0.0 {
            return Ok(());
        }
        let price = state.price;
        let tick = self.current_tick(price)?;
        for position in state.positions.values_mut() {
            if tick < position.tick_lower || tick >= position.tick_upper {
                continue;
            }
            let (a0, a1) = self.position_amounts(price, position)?;
            position.owed0 = position.owed0.saturating_add((a0 * rate).floor() as Amount);
            position.owed1 = position.owed1.saturating_add((a1 * rate).floor() as Amount);
        }
        Ok(())
    }

    fn snapshot(&self, price: f64, token_id: U256, position: &PaperPosition) -> Result<PositionSnapshot> {
        let (a0, a1) = self.position_amounts(price, position)?;
        Ok(PositionSnapshot {
            token_id,
            token0: self.token0,
            token1: self.token1,
            fee: self.config.fee_tier,
            tick_lower: position.tick_lower,
            tick_upper: position.tick_upper,
            liquidity: position.liquidity,
            amount0: a0.floor() as Amount,
            amount1: a1.floor() as Amount,
            tokens_owed0: position.owed0,
            tokens_owed1: position.owed1,
        })
    }
}

#[async_trait]
impl LiquidityManager for PaperExchange {
    async fn mint(&self, request: MintRequest) -> Result<MintReceipt> {
        let mut state = self.lock()?;
        state.mint_calls += 1;
        if state.fail_mint_call == Some(state.mint_calls) {
            state.fail_mint_call = None;
            bail!("execution reverted (injected mint failure)");
        }
        self.check_ticks(request.tick_lower, request.tick_upper)?;
        if request.amount0_desired > state.balances.token0
            || request.amount1_desired > state.balances.token1
        {
            bail!("STF: insufficient wallet balance for mint");
        }

        let sqrt_a = sqrt_ratio_at_tick(request.tick_lower)?;
        let sqrt_b = sqrt_ratio_at_tick(request.tick_upper)?;
        let sqrt_price = self.sqrt_price(state.price);
        let liquidity = liquidity_for_amounts(
            sqrt_price,
            sqrt_a,
            sqrt_b,
            request.amount0_desired,
            request.amount1_desired,
        );
        if liquidity == 0 {
            bail!("zero liquidity for requested amounts");
        }

        let (a0, a1) = amounts_for_liquidity(sqrt_price, sqrt_a, sqrt_b, liquidity);
        let used0 = (a0.ceil() as Amount).min(request.amount0_desired);
        let used1 = (a1.ceil() as Amount).min(request.amount1_desired);
        if used0 < request.amount0_min || used1 < request.amount1_min {
            bail!(
                "Price slippage check: used ({}, {}) below minimum ({}, {})",
                used0,
                used1,
                request.amount0_min,
                request.amount1_min
            );
        }

        state.balances.token0 -= used0;
        state.balances.token1 -= used1;
        let token_id = U256::from(state.next_token_id);
        state.next_token_id += 1;
        state.positions.insert(
            token_id,
            PaperPosition {
                owner: self.owner,
                tick_lower: request.tick_lower,
                tick_upper: request.tick_upper,
                liquidity,
                owed0: 0,
                owed1: 0,
            },
        );
        debug!(
            "[PAPER] Minted #{} [{}, {}] liquidity {} using ({}, {})",
            token_id, request.tick_lower, request.tick_upper, liquidity, used0, used1
        );

        Ok(MintReceipt {
            token_id,
            liquidity,
            amount0_used: used0,
            amount1_used: used1,
        })
    }

    async fn close(&self, token_id: U256) -> Result<CloseReceipt> {
        let mut state = self.lock()?;
        if state.close_failures > 0 {
            state.close_failures -= 1;
            bail!("execution reverted (injected close failure)");
        }
        let position = state
            .positions
            .get(&token_id)
            .cloned()
            .ok_or_else(|| anyhow!("unknown position {}", token_id))?;
        let (a0, a1) = self.position_amounts(state.price, &position)?;
        let amount0 = (a0.floor() as Amount).saturating_add(position.owed0);
        let amount1 = (a1.floor() as Amount).saturating_add(position.owed1);

        state.positions.remove(&token_id);
        state.balances.token0 = state.balances.token0.saturating_add(amount0);
        state.balances.token1 = state.balances.token1.saturating_add(amount1);
        debug!("[PAPER] Closed #{} returning ({}, {})", token_id, amount0, amount1);

        Ok(CloseReceipt { amount0, amount1 })
    }

    async fn get_position(&self, token_id: U256) -> Result<PositionSnapshot> {
        let state = self.lock()?;
        let position = state
            .positions
            .get(&token_id)
            .ok_or_else(|| anyhow!("unknown position {}", token_id))?;
        self.snapshot(state.price, token_id, position)
    }

    async fn list_positions(&self, owner: Address) -> Result<Vec<PositionSnapshot>> {
        let state = self.lock()?;
        state
            .positions
            .iter()
            .filter(|(_, p)| p.owner == owner)
            .map(|(id, p)| self.snapshot(state.price, *id, p))
            .collect()
    }
}

#[async_trait]
impl SwapExecutor for PaperExchange {
    async fn swap(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: Amount,
        max_slippage_percent: f64,
    ) -> Result<Amount> {
        let mut state = self.lock()?;
        if state.fail_next_swap {
            state.fail_next_swap = false;
            bail!("swap quote expired (injected swap failure)");
        }
        let fee_percent = self.config.fee_tier as f64 / 10_000.0;
        if fee_percent > max_slippage_percent {
            bail!(
                "pool fee {}% exceeds max slippage {}%",
                fee_percent,
                max_slippage_percent
            );
        }

        let zero_for_one = if (token_in, token_out) == (self.token0, self.token1) {
            true
        } else if (token_in, token_out) == (self.token1, self.token0) {
            false
        } else {
            bail!("unknown token pair ({:?}, {:?})", token_in, token_out);
        };

        let available = if zero_for_one {
            state.balances.token0
        } else {
            state.balances.token1
        };
        if amount_in > available {
            bail!("STF: insufficient balance for swap");
        }

        let raw_price = self.raw_price(state.price);
        let gross = if zero_for_one {
            amount_in as f64 * raw_price
        } else {
            amount_in as f64 / raw_price
        };
        let amount_out = (gross * (1.0 - fee_percent / 100.0)).floor().max(0.0) as Amount;

        if zero_for_one {
            state.balances.token0 -= amount_in;
            state.balances.token1 = state.balances.token1.saturating_add(amount_out);
        } else {
            state.balances.token1 -= amount_in;
            state.balances.token0 = state.balances.token0.saturating_add(amount_out);
        }
        debug!(
            "[PAPER] Swapped {} -> {} (zero_for_one={})",
            amount_in, amount_out, zero_for_one
        );
        Ok(amount_out)
    }
}

#[async_trait]
impl PoolReader for PaperExchange {
    async fn current_tick_and_price(&self) -> Result<PoolSlot> {
        if self.config.advance_on_read {
            self.advance()?;
        }
        let price = self.price()?;
        Ok(PoolSlot {
            tick: self.current_tick(price)?,
            sqrt_price_x96: tick_math::price_to_sqrt_price_x96(
                price,
                self.config.token0_decimals,
                self.config.token1_decimals,
            )?,
        })
    }

    async fn fee_tier(&self) -> Result<u32> {
        Ok(self.config.fee_tier)
    }

    async fn tick_spacing(&self) -> Result<i32> {
        Ok(self.config.tick_spacing)
    }

    async fn token_order(&self) -> Result<(Address, Address)> {
        Ok((self.token0, self.token1))
    }

    async fn token_decimals(&self, token: Address) -> Result<u8> {
        if token == self.token0 {
            Ok(self.config.token0_decimals)
        } else if token == self.token1 {
            Ok(self.config.token1_decimals)
        } else {
            Err(anyhow!("token {:?} is not in this pool", token))
        }
    }
}

#[async_trait]
impl WalletReader for PaperExchange {
    async fn token_balances(&self) -> Result<WalletBalances> {
        self.balances()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::tick_math::align_tick;

    const ONE_WETH: Amount = 1_000_000_000_000_000_000;
    const ONE_USDC: Amount = 1_000_000;

    fn paper() -> PaperExchange {
        let config = PaperConfig {
            advance_on_read: false,
            ..PaperConfig::default()
        };
        PaperExchange::new(
            config,
            Address::repeat_byte(1),
            Address::repeat_byte(2),
            Address::repeat_byte(9),
        )
        .unwrap()
    }

    fn aligned(price: f64, round_up: bool) -> i32 {
        align_tick(tick_math::price_to_tick(price, 18, 6).unwrap(), 60, round_up).unwrap()
    }

    #[tokio::test]
    async fn test_mint_and_close_at_same_price() {
        let paper = paper();
        let request = MintRequest {
            tick_lower: aligned(2475.0, false),
            tick_upper: aligned(2750.0, true),
            amount0_desired: ONE_WETH,
            amount1_desired: 2_500 * ONE_USDC,
            amount0_min: ONE_WETH / 100 * 98,
            amount1_min: 0,
        };
        let receipt = paper.mint(request).await.unwrap();
        assert!(receipt.amount0_used > ONE_WETH / 100 * 99);
        assert!(receipt.amount1_used < 2_500 * ONE_USDC / 2);

        let wallet = paper.balances().unwrap();
        assert_eq!(wallet.token0, ONE_WETH - receipt.amount0_used);
        assert_eq!(wallet.token1, 2_500 * ONE_USDC - receipt.amount1_used);

        let listed = paper.list_positions(paper.owner()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(
            (listed[0].token0, listed[0].token1, listed[0].fee),
            (Address::repeat_byte(1), Address::repeat_byte(2), 3000)
        );
        assert!(paper.list_positions(Address::zero()).await.unwrap().is_empty());

        let closed = paper.close(receipt.token_id).await.unwrap();
        assert!(closed.amount0 <= receipt.amount0_used);
        assert!(closed.amount0 + 1_000_000 >= receipt.amount0_used);
        assert_eq!(paper.position_count().unwrap(), 0);
        assert!(paper.close(receipt.token_id).await.is_err());
    }

    #[tokio::test]
    async fn test_mint_rejections() {
        let paper = paper();
        let lower = aligned(2250.0, false);
        let upper = aligned(2475.0, false);

        // Misaligned
        let misaligned = MintRequest {
            tick_lower: lower + 1,
            tick_upper: upper,
            amount0_desired: 0,
            amount1_desired: 100 * ONE_USDC,
            amount0_min: 0,
            amount1_min: 0,
        };
        assert!(paper.mint(misaligned).await.is_err());

        // Below-price range cannot use token0, so a token0 minimum fails
        let slippage = MintRequest {
            tick_lower: lower,
            tick_upper: upper,
            amount0_desired: ONE_WETH,
            amount1_desired: 100 * ONE_USDC,
            amount0_min: 1,
            amount1_min: 0,
        };
        let err = paper.mint(slippage).await.unwrap_err();
        assert!(err.to_string().contains("slippage"));

        // Injected failure on the next call only
        paper.fail_mint_call(1).unwrap();
        let ok = MintRequest {
            amount0_desired: 0,
            amount0_min: 0,
            ..slippage
        };
        assert!(paper.mint(ok).await.is_err());
        assert!(paper.mint(ok).await.is_ok());
    }

    #[tokio::test]
    async fn test_swap_at_pool_price_minus_fee() {
        let paper = paper();
        let out = paper
            .swap(
                Address::repeat_byte(1),
                Address::repeat_byte(2),
                ONE_WETH / 2,
                1.0,
            )
            .await
            .unwrap();
        // 0.5 WETH @ 2500 less 0.3%
        let expected = 1_250.0 * 0.997 * ONE_USDC as f64;
        assert!((out as f64 - expected).abs() < 2.0, "out {}", out);
        assert_eq!(
            paper.balances().unwrap(),
            WalletBalances::new(ONE_WETH / 2, 2_500 * ONE_USDC + out)
        );

        // Fee above the allowed slippage
        assert!(paper
            .swap(Address::repeat_byte(2), Address::repeat_byte(1), ONE_USDC, 0.1)
            .await
            .is_err());

        paper.fail_next_swap().unwrap();
        assert!(paper
            .swap(Address::repeat_byte(2), Address::repeat_byte(1), ONE_USDC, 1.0)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_fees_accrue_in_range_only() {
        let config = PaperConfig {
            advance_on_read: false,
            price_amplitude: 0.0,
            fee_accrual_per_step: 0.001,
            ..PaperConfig::default()
        };
        let paper = PaperExchange::new(
            config,
            Address::repeat_byte(1),
            Address::repeat_byte(2),
            Address::repeat_byte(9),
        )
        .unwrap();

        let in_range = paper
            .mint(MintRequest {
                tick_lower: aligned(2475.0, false),
                tick_upper: aligned(2750.0, true),
                amount0_desired: ONE_WETH / 2,
                amount1_desired: 1_000 * ONE_USDC,
                amount0_min: 0,
                amount1_min: 0,
            })
            .await
            .unwrap();
        let below = paper
            .mint(MintRequest {
                tick_lower: aligned(2250.0, false),
                tick_upper: aligned(2475.0, false),
                amount0_desired: 0,
                amount1_desired: 1_000 * ONE_USDC,
                amount0_min: 0,
                amount1_min: 0,
            })
            .await
            .unwrap();

        paper.advance().unwrap();
        let earning = paper.get_position(in_range.token_id).await.unwrap();
        let idle = paper.get_position(below.token_id).await.unwrap();
        assert!(earning.tokens_owed0 > 0);
        assert_eq!((idle.tokens_owed0, idle.tokens_owed1), (0, 0));
    }

    #[tokio::test]
    async fn test_pool_reader() {
        let paper = paper();
        let slot = paper.current_tick_and_price().await.unwrap();
        assert_eq!(slot.tick, tick_math::price_to_tick(2500.0, 18, 6).unwrap());
        assert!(!slot.sqrt_price_x96.is_zero());
        assert_eq!(paper.token_decimals(Address::repeat_byte(2)).await.unwrap(), 6);
        assert!(paper.token_decimals(Address::zero()).await.is_err());

        paper.fail_next_closes(1).unwrap();
        assert!(paper.close(U256::from(1u64)).await.is_err());
        assert!(paper.set_price(-1.0).is_err());
    }
}
