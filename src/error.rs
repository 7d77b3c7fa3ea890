use crate::model::Slot;
use ethers::types::U256;
use std::time::Duration;
use thiserror::Error;

/// Typed error hierarchy for the range bot.
///
/// Core components return specific variants; application wiring wraps them
/// with `anyhow::Context`.
#[derive(Error, Debug)]
pub enum BotError {
    // -- Configuration ------------------------------------------------------
    #[error("Config error: {0}")]
    ConfigError(#[from] std::io::Error),
    #[error("Parsing error: {0}")]
    ParsingError(#[from] toml::de::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("invalid tick spacing {0}: must be positive")]
    InvalidTickSpacing(i32),
    #[error("degenerate range: lower {lower}, transition {transition}, upper {upper} are not strictly ordered")]
    DegenerateRange {
        lower: i32,
        transition: i32,
        upper: i32,
    },

    // -- Tick math ----------------------------------------------------------
    #[error("invalid price {0}: must be finite and positive")]
    InvalidPrice(f64),
    #[error("tick {0} is outside the supported tick range")]
    TickOutOfRange(i64),

    // -- Oracle -------------------------------------------------------------
    #[error("price oracle used before initialize()")]
    NotInitialized,
    #[error("oracle read failed: {reason}")]
    Oracle { reason: String },

    // -- Ledger -------------------------------------------------------------
    #[error("{0} slot already holds a position")]
    SlotOccupied(Slot),
    #[error("{0} slot is empty")]
    SlotEmpty(Slot),
    #[error("position {0} is already tracked in another slot")]
    DuplicatePosition(U256),

    // -- Execution ----------------------------------------------------------
    #[error("swap failed: {reason}")]
    SwapFailed { reason: String },
    #[error("{slot} mint failed: {reason}")]
    MintFailed { slot: Slot, reason: String },
    #[error("{slot} close of position {token_id} failed: {reason}")]
    CloseFailed {
        slot: Slot,
        token_id: U256,
        reason: String,
    },
    #[error("CRITICAL: lower mint failed ({mint_reason}) and closing upper position {token_id} also failed ({close_reason}); operator intervention required")]
    UnwindFailed {
        token_id: U256,
        mint_reason: String,
        close_reason: String,
    },
    #[error("{operation} timed out after {limit:?}")]
    Timeout { operation: String, limit: Duration },

    // -- Reconciliation -----------------------------------------------------
    #[error("wallet reconciliation failed: {reason}")]
    Reconciliation { reason: String },
    #[error("owner holds {} positions in this pool that do not form an adjacent pair {token_ids:?}; close them or start from an empty pool", .token_ids.len())]
    AdoptionFailed { token_ids: Vec<U256> },
}

impl BotError {
    /// Errors that leave funds in an unknown state. The monitor halts on these.
    pub fn is_critical(&self) -> bool {
        matches!(self, BotError::UnwindFailed { .. })
    }

    /// Errors that retrying cannot fix.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BotError::ConfigError(_)
                | BotError::ParsingError(_)
                | BotError::ValidationError(_)
                | BotError::InvalidTickSpacing(_)
                | BotError::DegenerateRange { .. }
                | BotError::NotInitialized
                | BotError::AdoptionFailed { .. }
        )
    }

    pub fn is_fatal(&self) -> bool {
        self.is_critical() || self.is_configuration()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let unwind = BotError::UnwindFailed {
            token_id: U256::from(7u64),
            mint_reason: "reverted".to_string(),
            close_reason: "rpc timeout".to_string(),
        };
        assert!(unwind.is_critical());
        assert!(unwind.is_fatal());
        assert!(unwind.to_string().starts_with("CRITICAL"));

        let mint = BotError::MintFailed {
            slot: Slot::Lower,
            reason: "reverted".to_string(),
        };
        assert!(!mint.is_critical());
        assert!(!mint.is_fatal());
        assert_eq!(mint.to_string(), "lower mint failed: reverted");

        assert!(BotError::InvalidTickSpacing(0).is_fatal());
        let stray = BotError::AdoptionFailed {
            token_ids: vec![U256::from(3u64), U256::from(4u64), U256::from(5u64)],
        };
        assert!(stray.is_fatal() && !stray.is_critical());
        assert!(stray.to_string().starts_with("owner holds 3 positions"));
        assert!(!BotError::InvalidPrice(-1.0).is_fatal());
    }
}
