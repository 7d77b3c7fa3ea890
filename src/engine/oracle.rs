use crate::engine::common::{into_bot_error, parse_pair_symbols, with_timeout};
use crate::engine::context::PoolContext;
use crate::engine::traits::PoolReader;
use crate::error::BotError;
use crate::model::{PriceSample, TokenInfo};
use crate::strategy::tick_math;
use ethers::types::Address;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Reads the pool price. Static pool facts are fetched once by `initialize`.
///
/// Prices come from `sqrtPriceX96`, which is exact. A reader that reports a
/// zero sqrt price falls back to the integer tick, which floors to the tick
/// boundary.
pub struct PriceOracle {
    reader: Arc<dyn PoolReader>,
    context: Option<PoolContext>,
    timeout: Duration,
}

impl PriceOracle {
    pub fn new(reader: Arc<dyn PoolReader>, timeout: Duration) -> Self {
        Self {
            reader,
            context: None,
            timeout,
        }
    }

    /// Verifies token ordering against the pool and caches decimals, fee tier
    /// and tick spacing.
    pub async fn initialize(
        &mut self,
        token0: Address,
        token1: Address,
        pair: &str,
    ) -> Result<&PoolContext, BotError> {
        let oracle_err = |reason| BotError::Oracle { reason };

        let (pool_token0, pool_token1) =
            with_timeout(self.timeout, "token_order", self.reader.token_order())
                .await
                .map_err(|e| into_bot_error(e, oracle_err))?;
        if (pool_token0, pool_token1) != (token0, token1) {
            return Err(BotError::ValidationError(format!(
                "configured token order ({:?}, {:?}) does not match pool order ({:?}, {:?})",
                token0, token1, pool_token0, pool_token1
            )));
        }

        let decimals0 = with_timeout(
            self.timeout,
            "token_decimals",
            self.reader.token_decimals(token0),
        )
        .await
        .map_err(|e| into_bot_error(e, oracle_err))?;
        let decimals1 = with_timeout(
            self.timeout,
            "token_decimals",
            self.reader.token_decimals(token1),
        )
        .await
        .map_err(|e| into_bot_error(e, oracle_err))?;
        let fee_tier = with_timeout(self.timeout, "fee_tier", self.reader.fee_tier())
            .await
            .map_err(|e| into_bot_error(e, oracle_err))?;
        let tick_spacing = with_timeout(self.timeout, "tick_spacing", self.reader.tick_spacing())
            .await
            .map_err(|e| into_bot_error(e, oracle_err))?;
        if tick_spacing <= 0 {
            return Err(BotError::InvalidTickSpacing(tick_spacing));
        }

        let (symbol0, symbol1) = parse_pair_symbols(pair);
        let context = PoolContext::new(
            TokenInfo::new(token0, symbol0, decimals0),
            TokenInfo::new(token1, symbol1, decimals1),
            fee_tier,
            tick_spacing,
        );
        info!(
            "[ORACLE] Initialized {}: decimals {}/{}, fee tier {}, tick spacing {}",
            context.symbol(),
            decimals0,
            decimals1,
            fee_tier,
            tick_spacing
        );
        Ok(self.context.insert(context))
    }

    pub async fn get_current_price(&self) -> Result<PriceSample, BotError> {
        let context = self.context()?;
        let (decimals0, decimals1) = context.decimals();

        let slot = with_timeout(
            self.timeout,
            "current_tick_and_price",
            self.reader.current_tick_and_price(),
        )
        .await
        .map_err(|e| into_bot_error(e, |reason| BotError::Oracle { reason }))?;

        let price = if slot.sqrt_price_x96.is_zero() {
            debug!("[ORACLE] sqrt price unavailable, deriving price from tick {}", slot.tick);
            tick_math::tick_to_price(slot.tick, decimals0, decimals1)?
        } else {
            tick_math::sqrt_price_x96_to_price(slot.sqrt_price_x96, decimals0, decimals1)?
        };

        Ok(PriceSample {
            price,
            tick: slot.tick,
            sqrt_price_x96: slot.sqrt_price_x96,
            timestamp: chrono::Utc::now().timestamp_millis(),
        })
    }

    pub fn get_tick_spacing(&self) -> Result<i32, BotError> {
        Ok(self.context()?.tick_spacing)
    }

    pub fn context(&self) -> Result<&PoolContext, BotError> {
        self.context.as_ref().ok_or(BotError::NotInitialized)
    }
}
