//! Price <-> tick conversions.
//!
//! Prices are human scale: token1 per token0 after adjusting for the decimal
//! difference between the two tokens. Tick alignment is exact integer math;
//! floating point is only used on the price side of a conversion.

use crate::constants::{MAX_TICK, MIN_TICK, Q96, TICK_BASE, TICK_EXP_CHUNK};
use crate::error::BotError;
use ethers::types::U256;

/// Raw tick values this close to an integer snap to it before flooring.
const TICK_SNAP_EPSILON: f64 = 1e-6;

fn decimal_scale(decimals0: u8, decimals1: u8) -> f64 {
    10f64.powi(decimals0 as i32 - decimals1 as i32)
}

fn check_price(price: f64) -> Result<(), BotError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(BotError::InvalidPrice(price));
    }
    Ok(())
}

fn check_tick(tick: i64) -> Result<i32, BotError> {
    if tick < MIN_TICK as i64 || tick > MAX_TICK as i64 {
        return Err(BotError::TickOutOfRange(tick));
    }
    Ok(tick as i32)
}

/// `floor((ln(price) - (decimals0 - decimals1) * ln(10)) / ln(1.0001))`
pub fn price_to_tick(price: f64, decimals0: u8, decimals1: u8) -> Result<i32, BotError> {
    check_price(price)?;
    let decimal_shift = (decimals0 as f64 - decimals1 as f64) * std::f64::consts::LN_10;
    let raw = (price.ln() - decimal_shift) / TICK_BASE.ln();
    let nearest = raw.round();
    let tick = if (raw - nearest).abs() < TICK_SNAP_EPSILON {
        nearest
    } else {
        raw.floor()
    };
    check_tick(tick as i64)
}

/// `1.0001^tick * 10^(decimals0 - decimals1)`
pub fn tick_to_price(tick: i32, decimals0: u8, decimals1: u8) -> Result<f64, BotError> {
    check_tick(tick as i64)?;
    Ok(tick_ratio(tick) * decimal_scale(decimals0, decimals1))
}

/// `1.0001^tick`, accumulated in 50k-tick steps for large magnitudes.
fn tick_ratio(tick: i32) -> f64 {
    if tick.abs() <= TICK_EXP_CHUNK {
        return TICK_BASE.powi(tick);
    }
    let sign = tick.signum();
    let step = TICK_BASE.powi(sign * TICK_EXP_CHUNK);
    let mut remaining = tick.abs();
    let mut ratio = 1.0;
    while remaining > TICK_EXP_CHUNK {
        ratio *= step;
        remaining -= TICK_EXP_CHUNK;
    }
    ratio * TICK_BASE.powi(sign * remaining)
}

/// Nearest multiple of `spacing` at or beyond `tick` in the requested
/// direction. Exact multiples come back unchanged.
pub fn align_tick(tick: i32, spacing: i32, round_up: bool) -> Result<i32, BotError> {
    if spacing <= 0 {
        return Err(BotError::InvalidTickSpacing(spacing));
    }
    let remainder = tick.rem_euclid(spacing);
    if remainder == 0 {
        return Ok(tick);
    }
    let floor = tick - remainder;
    Ok(if round_up { floor + spacing } else { floor })
}

/// Exact price from the pool's `sqrtPriceX96`.
pub fn sqrt_price_x96_to_price(
    sqrt_price_x96: U256,
    decimals0: u8,
    decimals1: u8,
) -> Result<f64, BotError> {
    let sqrt_price = u256_to_f64(sqrt_price_x96) / Q96;
    let price = sqrt_price * sqrt_price * decimal_scale(decimals0, decimals1);
    check_price(price)?;
    Ok(price)
}

pub fn price_to_sqrt_price_x96(price: f64, decimals0: u8, decimals1: u8) -> Result<U256, BotError> {
    check_price(price)?;
    let raw = price / decimal_scale(decimals0, decimals1);
    Ok(f64_to_u256(raw.sqrt() * Q96))
}

pub fn u256_to_f64(value: U256) -> f64 {
    let word = 2f64.powi(64);
    value
        .0
        .iter()
        .rev()
        .fold(0.0, |acc, limb| acc * word + *limb as f64)
}

fn f64_to_u256(value: f64) -> U256 {
    if !value.is_finite() || value <= 0.0 {
        return U256::zero();
    }
    let mut limbs = [0u64; 4];
    let mut rest = value.floor();
    for i in (0..4).rev() {
        let base = 2f64.powi(64 * i as i32);
        let limb = (rest / base).floor().min(u64::MAX as f64);
        limbs[i] = limb as u64;
        rest -= limb * base;
        if rest < 0.0 {
            rest = 0.0;
        }
    }
    U256(limbs)
}
