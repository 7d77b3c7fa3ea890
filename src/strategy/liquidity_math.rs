//! Concentrated-liquidity amount math on raw sqrt prices.
//!
//! A raw sqrt price is `sqrt(token1 units per token0 unit)`, i.e. the pool's
//! `sqrtPriceX96 / 2^96`. Liquidity and amounts follow the usual range
//! formulas: below the range a position holds only token0, above it only
//! token1, inside it both.

use super::tick_math;
use super::types::TickRange;
use crate::error::BotError;
use crate::model::{Amount, WalletBalances};

/// `sqrt(1.0001^tick)` in raw token units.
pub fn sqrt_ratio_at_tick(tick: i32) -> Result<f64, BotError> {
    Ok(tick_math::tick_to_price(tick, 0, 0)?.sqrt())
}

/// Raw sqrt price for a human-scale price.
pub fn raw_sqrt_price(price: f64, decimals0: u8, decimals1: u8) -> f64 {
    (price / 10f64.powi(decimals0 as i32 - decimals1 as i32)).sqrt()
}

/// Largest liquidity the desired amounts can back at `sqrt_price`.
pub fn liquidity_for_amounts(
    sqrt_price: f64,
    sqrt_a: f64,
    sqrt_b: f64,
    amount0: Amount,
    amount1: Amount,
) -> u128 {
    let (a0, a1) = (amount0 as f64, amount1 as f64);
    let liquidity = if sqrt_price <= sqrt_a {
        a0 * sqrt_a * sqrt_b / (sqrt_b - sqrt_a)
    } else if sqrt_price >= sqrt_b {
        a1 / (sqrt_b - sqrt_a)
    } else {
        let from0 = a0 * sqrt_price * sqrt_b / (sqrt_b - sqrt_price);
        let from1 = a1 / (sqrt_price - sqrt_a);
        from0.min(from1)
    };
    if liquidity.is_finite() && liquidity > 0.0 {
        liquidity.floor() as u128
    } else {
        0
    }
}

/// Token amounts represented by `liquidity` at `sqrt_price`.
pub fn amounts_for_liquidity(
    sqrt_price: f64,
    sqrt_a: f64,
    sqrt_b: f64,
    liquidity: u128,
) -> (f64, f64) {
    let l = liquidity as f64;
    if sqrt_price <= sqrt_a {
        (l * (sqrt_b - sqrt_a) / (sqrt_a * sqrt_b), 0.0)
    } else if sqrt_price >= sqrt_b {
        (0.0, l * (sqrt_b - sqrt_a))
    } else {
        (
            l * (sqrt_b - sqrt_price) / (sqrt_price * sqrt_b),
            l * (sqrt_price - sqrt_a),
        )
    }
}

/// Amounts a mint of `desired` into `range` should take at `sqrt_price`.
///
/// The limiting token comes back (almost) whole; the other one only as much
/// as the range needs alongside it. Rounded down and capped at `desired`.
pub fn expected_deposit(
    sqrt_price: f64,
    range: TickRange,
    desired: WalletBalances,
) -> Result<(Amount, Amount), BotError> {
    let sqrt_a = sqrt_ratio_at_tick(range.lower)?;
    let sqrt_b = sqrt_ratio_at_tick(range.upper)?;
    let liquidity =
        liquidity_for_amounts(sqrt_price, sqrt_a, sqrt_b, desired.token0, desired.token1);
    let (a0, a1) = amounts_for_liquidity(sqrt_price, sqrt_a, sqrt_b, liquidity);
    Ok((
        (a0.floor() as Amount).min(desired.token0),
        (a1.floor() as Amount).min(desired.token1),
    ))
}

/// token1 an in-range mint needs to pair with all of `amount0`. Zero when
/// the price sits outside the range.
pub fn token1_to_pair(
    sqrt_price: f64,
    range: TickRange,
    amount0: Amount,
) -> Result<f64, BotError> {
    let sqrt_a = sqrt_ratio_at_tick(range.lower)?;
    let sqrt_b = sqrt_ratio_at_tick(range.upper)?;
    if sqrt_price <= sqrt_a || sqrt_price >= sqrt_b {
        return Ok(0.0);
    }
    let liquidity = amount0 as f64 * sqrt_price * sqrt_b / (sqrt_b - sqrt_price);
    Ok(liquidity * (sqrt_price - sqrt_a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::tick_math::{align_tick, price_to_tick};

    const ONE_WETH: Amount = 1_000_000_000_000_000_000;
    const ONE_USDC: Amount = 1_000_000;

    fn straddling() -> TickRange {
        let tick = |price: f64, up: bool| {
            align_tick(price_to_tick(price, 18, 6).unwrap(), 60, up).unwrap()
        };
        TickRange::new(tick(2475.0, false), tick(2750.0, true))
    }

    #[test]
    fn test_single_sided_ranges() {
        let (sa, sb) = (1.0, 1.1);
        // Price below the range: only token0
        let (a0, a1) = amounts_for_liquidity(0.9, sa, sb, 1_000_000);
        assert!(a0 > 0.0 && a1 == 0.0);
        // Price above the range: only token1
        let (a0, a1) = amounts_for_liquidity(1.2, sa, sb, 1_000_000);
        assert!(a0 == 0.0 && a1 > 0.0);
        // Below-range liquidity ignores token1 entirely
        assert_eq!(
            liquidity_for_amounts(0.9, sa, sb, 1_000, 0),
            liquidity_for_amounts(0.9, sa, sb, 1_000, 5_000)
        );
    }

    #[test]
    fn test_liquidity_amounts_inverse() {
        let (sp, sa, sb) = (1.05, 1.0, 1.1);
        let l = liquidity_for_amounts(sp, sa, sb, 10_000_000, 10_000_000);
        let (a0, a1) = amounts_for_liquidity(sp, sa, sb, l);
        // One side is the binding constraint and comes back (almost) whole
        assert!(a0 <= 10_000_000.0 + 1.0 && a1 <= 10_000_000.0 + 1.0);
        assert!(a0 > 9_999_990.0 || a1 > 9_999_990.0);
    }

    #[test]
    fn test_expected_deposit_finds_limiting_token() {
        let sqrt_price = raw_sqrt_price(2500.0, 18, 6);
        let range = straddling();

        // Plenty of USDC: token0 limits, USDC only partly used
        let (used0, used1) =
            expected_deposit(sqrt_price, range, WalletBalances::new(ONE_WETH, 2_500 * ONE_USDC))
                .unwrap();
        assert!(used0 > ONE_WETH / 1000 * 999);
        assert!(used1 > 0 && used1 < 2_500 * ONE_USDC / 2);

        // Little USDC: token1 limits, most WETH stays behind
        let (used0, used1) =
            expected_deposit(sqrt_price, range, WalletBalances::new(ONE_WETH, 150 * ONE_USDC))
                .unwrap();
        assert!(used1 > 149 * ONE_USDC && used1 <= 150 * ONE_USDC);
        assert!(used0 < ONE_WETH / 2);
    }

    #[test]
    fn test_token1_to_pair() {
        let sqrt_price = raw_sqrt_price(2500.0, 18, 6);
        let range = straddling();
        let needed = token1_to_pair(sqrt_price, range, ONE_WETH).unwrap();
        assert!(needed > 150.0 * ONE_USDC as f64);
        assert!(needed < 2_500.0 * ONE_USDC as f64);

        // Price above the range needs no token0 pairing at all
        let above = raw_sqrt_price(3000.0, 18, 6);
        assert_eq!(token1_to_pair(above, range, ONE_WETH).unwrap(), 0.0);
    }
}
