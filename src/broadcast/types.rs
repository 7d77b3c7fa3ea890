use serde::{Deserialize, Serialize};

// ============================================================
// WebSocket Event Types
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "data")]
pub enum WSEvent {
    /// Strategy configuration (sent on connect)
    #[serde(rename = "config")]
    Config(serde_json::Value),

    /// Range pair summary (high-level metrics)
    #[serde(rename = "summary")]
    Summary(StatusSummary),

    /// Position opened, closed or fees collected
    #[serde(rename = "position_update")]
    PositionUpdate(PositionEvent),

    /// Pool price update
    #[serde(rename = "market_update")]
    MarketUpdate(MarketEvent),

    /// Error notification
    #[serde(rename = "error")]
    Error(String),
}

// ============================================================
// Strategy Summary
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSummary {
    pub symbol: String,
    pub price: f64,
    pub tick: Option<i32>,
    pub phase: String, // "NoPositions", "Balancing", "Opening", "Holding", "Closing"
    pub uptime: String, // Human-readable uptime, e.g. "2d 14h 30m"

    // Positions
    pub upper: Option<RangeInfo>,
    pub lower: Option<RangeInfo>,
    pub thresholds: Option<(i32, i32)>, // (lower, upper) close thresholds in ticks

    // Undeployed wallet balances
    pub token0_balance: f64,
    pub token1_balance: f64,

    // Fees and counters
    pub total_fees0: f64,
    pub total_fees1: f64,
    pub rebalance_count: u64,
    pub cycle_count: u64,
    pub last_rebalance_price: Option<f64>,
}

/// One side of the pair for dashboard range visualization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeInfo {
    pub token_id: String,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub price_lower: f64,
    pub price_upper: f64,
    pub liquidity: String,
    pub in_range: bool,
}

// ============================================================
// Position and Market Events
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionEvent {
    pub slot: String,     // "upper" or "lower"
    pub action: String,   // "OPENED", "CLOSED", "FEES", "SWAP"
    pub token_id: Option<String>,
    // Raw token units
    pub amount0: String,
    pub amount1: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketEvent {
    pub price: f64,
    pub tick: i32,
}

/// "2d 14h 30m" style uptime.
pub fn format_uptime(total_secs: u64) -> String {
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}
