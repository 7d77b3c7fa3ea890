//! Central configuration constants for clmm-range-bot.
//!
//! This module contains the tunable defaults and protocol constants used
//! throughout the bot. Modify values here to adjust bot behavior without
//! changing business logic.

use crate::strategy::types::Spread;
use std::time::Duration;

// =============================================================================
// TICK MATH CONSTANTS
// =============================================================================

/// Price ratio between two adjacent ticks.
pub const TICK_BASE: f64 = 1.0001;

/// Tick bounds supported by the pool contracts.
pub const MIN_TICK: i32 = -887_272;
pub const MAX_TICK: i32 = 887_272;

/// Ticks beyond this magnitude are exponentiated in chunks of this size.
pub const TICK_EXP_CHUNK: i32 = 50_000;

/// 2^96, the fixed-point scale of `sqrtPriceX96`.
pub const Q96: f64 = 79_228_162_514_264_337_593_543_950_336.0;

// =============================================================================
// STRATEGY CONSTANTS
// =============================================================================

/// Share of the price range reserved as the transition buffer below the
/// current price (5%).
pub const RANGE_OVERLAP_FRACTION: f64 = 0.05;

/// Tick spacings beyond the outer range edges before a rebalance triggers.
pub const DEFAULT_THRESHOLD_BUFFER_SPACINGS: i32 = 2;

/// 2% slippage allowance on the token a mint is expected to deposit.
pub const DEFAULT_MINT_SLIPPAGE: Spread = Spread::new(2.0);

/// Max slippage handed to the swap executor when balancing.
pub const DEFAULT_SWAP_SLIPPAGE_PERCENT: f64 = 1.0;

/// Value deviation between the two tokens tolerated before swapping.
pub const DEFAULT_REBALANCE_TOLERANCE_PERCENT: f64 = 10.0;

// =============================================================================
// MONITOR TIMER INTERVALS
// =============================================================================

/// Interval between price checks (1 minute)
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Pause after a failed cycle before trying again (30 seconds)
pub const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_secs(30);

/// Upper bound on any single external call or transaction confirmation (2 minutes)
pub const DEFAULT_TX_TIMEOUT: Duration = Duration::from_secs(120);
