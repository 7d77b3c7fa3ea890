use super::ledger::LedgerSnapshot;
use super::liquidity_math::token1_to_pair;
use super::types::{Decision, FeeSplit, SwapPlan, Thresholds, TickRange};
use crate::error::BotError;
use crate::model::{CloseReceipt, Position, TokenInfo, WalletBalances};

/// Close thresholds: `buffer_spacings` tick spacings beyond the outer edges
/// of the pair.
pub fn thresholds(
    lower_tick_lower: i32,
    upper_tick_upper: i32,
    tick_spacing: i32,
    buffer_spacings: i32,
) -> Thresholds {
    let buffer = buffer_spacings * tick_spacing;
    Thresholds {
        lower: lower_tick_lower - buffer,
        upper: upper_tick_upper + buffer,
    }
}

/// Strict on both sides: a tick sitting exactly on a threshold holds.
pub fn breaches_thresholds(current_tick: i32, thresholds: &Thresholds) -> bool {
    current_tick < thresholds.lower || current_tick > thresholds.upper
}

/// Decides the next action from the ledger and the current tick alone.
pub fn decide(
    snapshot: &LedgerSnapshot,
    current_tick: i32,
    tick_spacing: i32,
    buffer_spacings: i32,
) -> Decision {
    match (&snapshot.upper, &snapshot.lower) {
        (None, None) => Decision::Open,
        (Some(upper), Some(lower)) => {
            let limits = thresholds(
                lower.tick_lower,
                upper.tick_upper,
                tick_spacing,
                buffer_spacings,
            );
            if breaches_thresholds(current_tick, &limits) {
                Decision::Close
            } else {
                Decision::Hold
            }
        }
        _ => Decision::ResumeClose,
    }
}

/// Splits what a close returned into principal and fees. Fees floor at
/// zero: a shortfall against principal is price movement, not a negative fee.
pub fn separate_principal_and_fees(position: &Position, receipt: &CloseReceipt) -> FeeSplit {
    FeeSplit {
        principal0: receipt.amount0.min(position.principal_amount0),
        principal1: receipt.amount1.min(position.principal_amount1),
        fees0: receipt.amount0.saturating_sub(position.principal_amount0),
        fees1: receipt.amount1.saturating_sub(position.principal_amount1),
    }
}

/// Swap that brings both balances to equal value at `price`, or `None` when
/// the deviation is within `tolerance_percent`.
///
/// token1 is the quote and valued at 1; token0 is valued at `price`.
/// Deviation is `|v0 - v1| / (v0 + v1) * 100`.
pub fn plan_balancing_swap(
    balances: WalletBalances,
    price: f64,
    token0: &TokenInfo,
    token1: &TokenInfo,
    tolerance_percent: f64,
) -> Option<SwapPlan> {
    if !price.is_finite() || price <= 0.0 {
        return None;
    }
    let value0 = token0.to_human(balances.token0) * price;
    let value1 = token1.to_human(balances.token1);
    let total = value0 + value1;
    if total <= 0.0 {
        return None;
    }

    let deviation_percent = (value0 - value1).abs() / total * 100.0;
    if deviation_percent <= tolerance_percent {
        return None;
    }

    let excess_value = (value0 - value1).abs() / 2.0;
    let (zero_for_one, amount_in) = if value0 > value1 {
        let amount = token0.to_raw(excess_value / price).min(balances.token0);
        (true, amount)
    } else {
        let amount = token1.to_raw(excess_value).min(balances.token1);
        (false, amount)
    };

    if amount_in == 0 {
        return None;
    }

    Some(SwapPlan {
        zero_for_one,
        amount_in,
        deviation_percent,
    })
}

/// True when pairing all token0 in the upper range would take every unit of
/// token1, leaving the lower range nothing to mint with.
pub fn upper_range_starves_lower(
    upper: TickRange,
    sqrt_price: f64,
    balances: WalletBalances,
) -> Result<bool, BotError> {
    if balances.token0 == 0 {
        return Ok(false);
    }
    let needed1 = token1_to_pair(sqrt_price, upper, balances.token0)?;
    Ok(needed1 >= balances.token1 as f64)
}

/// Tolerance the balancing step applies: zero when the upper range would
/// starve the lower one, so the wallet is brought to even value regardless.
pub fn effective_tolerance(
    upper: TickRange,
    sqrt_price: f64,
    balances: WalletBalances,
    tolerance_percent: f64,
) -> Result<f64, BotError> {
    if upper_range_starves_lower(upper, sqrt_price, balances)? {
        Ok(0.0)
    } else {
        Ok(tolerance_percent)
    }
}
